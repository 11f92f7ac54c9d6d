use sea_orm::JsonValue;
use sea_orm::entity::prelude::*;

use crate::types::HistoryTrigger;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ci_pipeline_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub ci_pipeline_id: i64,
    pub trigger: HistoryTrigger,
    pub template_snapshot: JsonValue,
    pub materials_snapshot: JsonValue,
    pub scan_enabled: bool,
    pub is_manual: bool,
    pub created_by: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
