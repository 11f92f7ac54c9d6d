use sea_orm::entity::prelude::*;

use crate::types::StageType;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ci_pipeline_script")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub ci_pipeline_id: i64,
    pub name: String,
    pub index: i32,
    pub stage: StageType,
    pub script: String,
    pub output_location: String,
    pub active: bool,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
