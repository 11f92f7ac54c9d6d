use sea_orm::entity::prelude::*;

use crate::types::{StepType, StringList};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pipeline_stage_step")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub pipeline_stage_id: i64,
    pub step_type: StepType,
    pub name: String,
    pub description: String,
    pub index: i32,
    pub output_directory_path: StringList,
    pub dependent_on_step: String,
    pub script_id: Option<i64>,
    pub ref_plugin_id: Option<i64>,
    pub trigger_if_parent_stage_fail: bool,
    pub deleted: bool,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
