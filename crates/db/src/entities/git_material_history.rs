use sea_orm::entity::prelude::*;

use crate::types::StringList;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "git_material_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub git_material_id: i64,
    pub app_id: i64,
    pub git_provider_id: i64,
    pub url: String,
    pub name: String,
    pub checkout_path: String,
    pub fetch_submodules: bool,
    pub filter_pattern: StringList,
    pub active: bool,
    pub created_by: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
