use sea_orm::entity::prelude::*;

use crate::types::BuildConfig;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ci_template_override")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub ci_pipeline_id: i64,
    pub docker_registry_id: String,
    pub docker_repository: String,
    pub git_material_id: i64,
    pub build_context_git_material_id: i64,
    pub build_config: BuildConfig,
    pub active: bool,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
