use sea_orm::entity::prelude::*;

use crate::types::{StageType, StepVariableType, ValueType, VariableFormat};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pipeline_stage_step_variable")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub pipeline_stage_step_id: i64,
    pub name: String,
    pub format: VariableFormat,
    pub description: String,
    pub is_exposed: bool,
    pub allow_empty_value: bool,
    pub default_value: String,
    pub value: String,
    pub variable_type: StepVariableType,
    pub value_type: ValueType,
    pub previous_step_index: Option<i32>,
    pub variable_step_index_in_plugin: Option<i32>,
    pub reference_variable_name: String,
    pub reference_variable_stage: Option<StageType>,
    pub deleted: bool,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
