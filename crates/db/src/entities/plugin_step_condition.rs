use sea_orm::entity::prelude::*;

use crate::types::ConditionType;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "plugin_step_condition")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub plugin_step_id: i64,
    pub condition_variable_id: i64,
    pub condition_type: ConditionType,
    pub conditional_operator: String,
    pub conditional_value: String,
    pub deleted: bool,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
