use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};

use crate::entities::app_status;

pub const STATUS_PROGRESSING: &str = "Progressing";

/// Last reported health of an app in one environment.
pub struct AppStatus;

impl AppStatus {
    pub async fn find<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
        environment_id: i64,
    ) -> Result<Option<app_status::Model>, DbErr> {
        app_status::Entity::find()
            .filter(app_status::Column::AppId.eq(app_id))
            .filter(app_status::Column::EnvironmentId.eq(environment_id))
            .one(db)
            .await
    }

    pub async fn upsert<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
        environment_id: i64,
        status: &str,
    ) -> Result<app_status::Model, DbErr> {
        match Self::find(db, app_id, environment_id).await? {
            Some(existing) => {
                let mut active: app_status::ActiveModel = existing.into();
                active.status = Set(status.to_string());
                active.updated_at = Set(Utc::now());
                active.update(db).await
            }
            None => {
                app_status::ActiveModel {
                    app_id: Set(app_id),
                    environment_id: Set(environment_id),
                    status: Set(status.to_string()),
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(db)
                .await
            }
        }
    }

    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
        environment_id: i64,
    ) -> Result<u64, DbErr> {
        let result = app_status::Entity::delete_many()
            .filter(app_status::Column::AppId.eq(app_id))
            .filter(app_status::Column::EnvironmentId.eq(environment_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
