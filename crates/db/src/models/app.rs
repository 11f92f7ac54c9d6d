use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use sea_orm::sea_query::Expr;

use super::Audit;
use crate::{
    entities::{app, app_label, generic_note},
    types::AppType,
};

#[derive(Debug, Clone)]
pub struct NewApp {
    pub name: String,
    pub display_name: String,
    pub app_type: AppType,
    pub team_id: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLabel {
    pub key: String,
    pub value: String,
    pub propagate: bool,
}

pub struct App;

impl App {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: NewApp,
        audit: Audit,
    ) -> Result<app::Model, DbErr> {
        app::ActiveModel {
            name: Set(data.name),
            display_name: Set(data.display_name),
            app_type: Set(data.app_type),
            team_id: Set(data.team_id),
            description: Set(data.description),
            active: Set(true),
            created_by: Set(audit.user_id),
            updated_by: Set(audit.user_id),
            created_at: Set(audit.at),
            updated_at: Set(audit.at),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<app::Model>, DbErr> {
        app::Entity::find_by_id(id).one(db).await
    }

    pub async fn find_active_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<app::Model, DbErr> {
        app::Entity::find_by_id(id)
            .filter(app::Column::Active.eq(true))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("App not found".to_string()))
    }

    /// Active rows sharing `name`, oldest first. Jobs are matched on
    /// `display_name` because their `name` carries a generated suffix.
    pub async fn find_active_by_name<C: ConnectionTrait>(
        db: &C,
        name: &str,
        app_type: &AppType,
    ) -> Result<Vec<app::Model>, DbErr> {
        let name_filter = match app_type {
            AppType::Job => app::Column::DisplayName.eq(name),
            _ => app::Column::Name.eq(name),
        };
        app::Entity::find()
            .filter(name_filter)
            .filter(app::Column::AppType.eq(app_type.clone()))
            .filter(app::Column::Active.eq(true))
            .order_by_asc(app::Column::Id)
            .all(db)
            .await
    }

    pub async fn deactivate<C: ConnectionTrait>(
        db: &C,
        id: i64,
        audit: Audit,
    ) -> Result<(), DbErr> {
        app::Entity::update_many()
            .col_expr(app::Column::Active, Expr::value(false))
            .col_expr(app::Column::UpdatedBy, Expr::value(audit.user_id))
            .col_expr(app::Column::UpdatedAt, Expr::value(audit.at))
            .filter(app::Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn create_labels<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
        labels: &[NewLabel],
        audit: Audit,
    ) -> Result<Vec<app_label::Model>, DbErr> {
        let mut created = Vec::with_capacity(labels.len());
        for label in labels {
            let model = app_label::ActiveModel {
                app_id: Set(app_id),
                key: Set(label.key.clone()),
                value: Set(label.value.clone()),
                propagate: Set(label.propagate),
                created_by: Set(audit.user_id),
                updated_by: Set(audit.user_id),
                created_at: Set(audit.at),
                updated_at: Set(audit.at),
                ..Default::default()
            }
            .insert(db)
            .await?;
            created.push(model);
        }
        Ok(created)
    }

    pub async fn find_labels<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
    ) -> Result<Vec<app_label::Model>, DbErr> {
        app_label::Entity::find()
            .filter(app_label::Column::AppId.eq(app_id))
            .order_by_asc(app_label::Column::Id)
            .all(db)
            .await
    }

    pub async fn create_note<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
        description: &str,
        audit: Audit,
    ) -> Result<generic_note::Model, DbErr> {
        generic_note::ActiveModel {
            app_id: Set(app_id),
            description: Set(description.to_string()),
            created_by: Set(audit.user_id),
            updated_by: Set(audit.user_id),
            created_at: Set(audit.at),
            updated_at: Set(audit.at),
            ..Default::default()
        }
        .insert(db)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_app(name: &str, app_type: AppType) -> NewApp {
        NewApp {
            name: name.to_string(),
            display_name: name.to_string(),
            app_type,
            team_id: 1,
            description: None,
        }
    }

    #[tokio::test]
    async fn active_lookup_ignores_deactivated_rows() {
        let db = test_support::setup_db().await;
        let audit = Audit::now(1);

        let first = App::create(&db, new_app("web", AppType::DevtronApp), audit)
            .await
            .unwrap();
        App::create(&db, new_app("web", AppType::DevtronApp), audit)
            .await
            .unwrap();

        let rows = App::find_active_by_name(&db, "web", &AppType::DevtronApp)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, first.id);

        App::deactivate(&db, first.id, Audit::now(2)).await.unwrap();
        let rows = App::find_active_by_name(&db, "web", &AppType::DevtronApp)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_ne!(rows[0].id, first.id);

        let err = App::find_active_by_id(&db, first.id).await.unwrap_err();
        assert!(matches!(err, DbErr::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn jobs_are_matched_on_display_name() {
        let db = test_support::setup_db().await;
        let mut job = new_app("nightly-abcdefghJ", AppType::Job);
        job.display_name = "nightly".to_string();
        App::create(&db, job, Audit::now(1)).await.unwrap();

        let rows = App::find_active_by_name(&db, "nightly", &AppType::Job)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let rows = App::find_active_by_name(&db, "nightly", &AppType::DevtronApp)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
