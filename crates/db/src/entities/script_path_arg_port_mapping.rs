use sea_orm::entity::prelude::*;

use crate::types::{ScriptMappingType, StringList};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "script_path_arg_port_mapping")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub script_id: i64,
    pub type_of_mapping: ScriptMappingType,
    pub file_path_on_disk: String,
    pub file_path_on_container: String,
    pub command: String,
    pub args: StringList,
    pub port_on_local: i32,
    pub port_on_container: i32,
    pub deleted: bool,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
