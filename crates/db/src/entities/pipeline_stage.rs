use sea_orm::entity::prelude::*;

use crate::types::{StageType, TriggerType};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pipeline_stage")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub ci_pipeline_id: Option<i64>,
    pub cd_pipeline_id: Option<i64>,
    pub stage_type: StageType,
    pub name: String,
    pub description: String,
    pub trigger_type: TriggerType,
    pub deleted: bool,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
