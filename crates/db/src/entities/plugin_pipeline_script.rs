use sea_orm::entity::prelude::*;

use crate::types::ScriptType;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "plugin_pipeline_script")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub script: String,
    pub store_script_at: String,
    pub script_type: ScriptType,
    pub mount_path: String,
    pub mount_code_to_container: bool,
    pub mount_code_to_container_path: String,
    pub mount_directory_from_host: bool,
    pub container_image_path: String,
    pub deleted: bool,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
