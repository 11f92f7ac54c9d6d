use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde_json::Value;

use super::Audit;
use crate::{entities::ci_pipeline_history, types::HistoryTrigger};

#[derive(Debug, Clone)]
pub struct NewCiPipelineHistory {
    pub ci_pipeline_id: i64,
    pub trigger: HistoryTrigger,
    pub template_snapshot: Value,
    pub materials_snapshot: Value,
    pub scan_enabled: bool,
    pub is_manual: bool,
}

pub struct CiPipelineHistory;

impl CiPipelineHistory {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: NewCiPipelineHistory,
        audit: Audit,
    ) -> Result<ci_pipeline_history::Model, DbErr> {
        ci_pipeline_history::ActiveModel {
            ci_pipeline_id: Set(data.ci_pipeline_id),
            trigger: Set(data.trigger),
            template_snapshot: Set(data.template_snapshot),
            materials_snapshot: Set(data.materials_snapshot),
            scan_enabled: Set(data.scan_enabled),
            is_manual: Set(data.is_manual),
            created_by: Set(audit.user_id),
            created_at: Set(audit.at),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_pipeline<C: ConnectionTrait>(
        db: &C,
        ci_pipeline_id: i64,
    ) -> Result<Vec<ci_pipeline_history::Model>, DbErr> {
        ci_pipeline_history::Entity::find()
            .filter(ci_pipeline_history::Column::CiPipelineId.eq(ci_pipeline_id))
            .order_by_asc(ci_pipeline_history::Column::Id)
            .all(db)
            .await
    }
}
