use sea_orm::entity::prelude::*;

use crate::types::{CmCsNames, StageType, TriggerType};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pre_post_cd_script_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub pipeline_id: i64,
    pub stage: StageType,
    pub script: String,
    pub cm_cs_names: CmCsNames,
    pub trigger_type: TriggerType,
    pub exec_in_env: bool,
    pub created_by: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
