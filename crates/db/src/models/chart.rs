use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use sea_orm::sea_query::Expr;

use super::Audit;
use crate::entities::chart;

pub struct Chart;

impl Chart {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
        chart_location: &str,
        audit: Audit,
    ) -> Result<chart::Model, DbErr> {
        chart::ActiveModel {
            app_id: Set(app_id),
            chart_location: Set(chart_location.to_string()),
            git_repo_url: Set(String::new()),
            latest: Set(true),
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

    pub async fn find_latest_by_app<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
    ) -> Result<Option<chart::Model>, DbErr> {
        chart::Entity::find()
            .filter(chart::Column::AppId.eq(app_id))
            .filter(chart::Column::Latest.eq(true))
            .filter(chart::Column::Active.eq(true))
            .one(db)
            .await
    }

    /// Points every active chart of the app at the GitOps repository.
    pub async fn update_git_repo_url<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
        git_repo_url: &str,
        audit: Audit,
    ) -> Result<(), DbErr> {
        chart::Entity::update_many()
            .col_expr(chart::Column::GitRepoUrl, Expr::value(git_repo_url.to_string()))
            .col_expr(chart::Column::UpdatedBy, Expr::value(audit.user_id))
            .col_expr(chart::Column::UpdatedAt, Expr::value(audit.at))
            .filter(chart::Column::AppId.eq(app_id))
            .filter(chart::Column::Active.eq(true))
            .exec(db)
            .await?;
        Ok(())
    }
}
