use sea_orm::entity::prelude::*;

use crate::types::WorkflowNodeType;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "app_workflow_mapping")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub app_workflow_id: i64,
    pub parent_id: i64,
    pub parent_type: Option<WorkflowNodeType>,
    pub component_id: i64,
    pub node_type: WorkflowNodeType,
    pub active: bool,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
