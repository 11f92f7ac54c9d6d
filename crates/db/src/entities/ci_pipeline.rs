use sea_orm::entity::prelude::*;

use crate::types::{CiPipelineType, DockerArgs};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ci_pipeline")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub app_id: i64,
    pub name: String,
    pub pipeline_type: CiPipelineType,
    pub is_manual: bool,
    pub is_external: bool,
    pub is_docker_config_overridden: bool,
    pub parent_ci_pipeline_id: i64,
    pub docker_args: DockerArgs,
    pub scan_enabled: bool,
    pub active: bool,
    pub deleted: bool,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
