use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use super::Audit;
use crate::entities::{deployment_group, deployment_group_app};

pub struct DeploymentGroup;

impl DeploymentGroup {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        name: &str,
        environment_id: i64,
        ci_pipeline_id: i64,
        app_ids: &[i64],
        audit: Audit,
    ) -> Result<deployment_group::Model, DbErr> {
        let group = deployment_group::ActiveModel {
            name: Set(name.to_string()),
            environment_id: Set(environment_id),
            ci_pipeline_id: Set(ci_pipeline_id),
            active: Set(true),
            created_by: Set(audit.user_id),
            updated_by: Set(audit.user_id),
            created_at: Set(audit.at),
            updated_at: Set(audit.at),
            ..Default::default()
        }
        .insert(db)
        .await?;
        for app_id in app_ids {
            deployment_group_app::ActiveModel {
                deployment_group_id: Set(group.id),
                app_id: Set(*app_id),
                active: Set(true),
                created_by: Set(audit.user_id),
                updated_by: Set(audit.user_id),
                created_at: Set(audit.at),
                updated_at: Set(audit.at),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
        Ok(group)
    }

    /// Active groups that deploy `app_id` into `environment_id`.
    pub async fn find_by_app_and_env<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
        environment_id: i64,
    ) -> Result<Vec<deployment_group::Model>, DbErr> {
        let group_ids: Vec<i64> = deployment_group_app::Entity::find()
            .filter(deployment_group_app::Column::AppId.eq(app_id))
            .filter(deployment_group_app::Column::Active.eq(true))
            .all(db)
            .await?
            .into_iter()
            .map(|row| row.deployment_group_id)
            .collect();
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        deployment_group::Entity::find()
            .filter(deployment_group::Column::Id.is_in(group_ids))
            .filter(deployment_group::Column::EnvironmentId.eq(environment_id))
            .filter(deployment_group::Column::Active.eq(true))
            .order_by_asc(deployment_group::Column::Id)
            .all(db)
            .await
    }
}
