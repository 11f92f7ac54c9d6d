use sea_orm::entity::prelude::*;

use crate::types::SourceType;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ci_pipeline_material")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub ci_pipeline_id: i64,
    pub git_material_id: i64,
    pub source_type: SourceType,
    pub value: String,
    pub regex: String,
    pub is_regex: bool,
    pub active: bool,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
