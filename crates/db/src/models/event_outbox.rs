use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, sea_query::Expr,
};
use serde_json::Value;
use uuid::Uuid;

use crate::entities::event_outbox;

/// Side effects recorded in the same transaction as the rows they describe
/// and delivered after commit.
pub struct EventOutbox;

impl EventOutbox {
    pub async fn enqueue<C: ConnectionTrait>(
        db: &C,
        event_type: &str,
        entity_type: &str,
        entity_id: i64,
        payload: Value,
    ) -> Result<event_outbox::Model, DbErr> {
        event_outbox::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            event_type: Set(event_type.to_string()),
            entity_type: Set(entity_type.to_string()),
            entity_id: Set(entity_id),
            payload: Set(payload),
            created_at: Set(Utc::now()),
            published_at: Set(None),
            attempts: Set(0),
            last_error: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Oldest first, so deliveries for one app keep their commit order.
    pub async fn fetch_unpublished<C: ConnectionTrait>(
        db: &C,
        limit: u64,
    ) -> Result<Vec<event_outbox::Model>, DbErr> {
        event_outbox::Entity::find()
            .filter(event_outbox::Column::PublishedAt.is_null())
            .order_by_asc(event_outbox::Column::Id)
            .limit(limit)
            .all(db)
            .await
    }

    pub async fn mark_published<C: ConnectionTrait>(db: &C, id: i64) -> Result<(), DbErr> {
        let result = event_outbox::Entity::update_many()
            .col_expr(event_outbox::Column::PublishedAt, Expr::value(Some(Utc::now())))
            .col_expr(event_outbox::Column::LastError, Expr::value(Option::<String>::None))
            .filter(event_outbox::Column::Id.eq(id))
            .exec(db)
            .await?;
        Self::expect_row(result.rows_affected, id)
    }

    pub async fn record_failure<C: ConnectionTrait>(
        db: &C,
        id: i64,
        error: &str,
    ) -> Result<(), DbErr> {
        let Some(entry) = event_outbox::Entity::find_by_id(id).one(db).await? else {
            return Self::expect_row(0, id);
        };
        let attempts = entry.attempts + 1;
        let mut active: event_outbox::ActiveModel = entry.into();
        active.attempts = Set(attempts);
        active.last_error = Set(Some(error.to_string()));
        active.update(db).await?;
        Ok(())
    }

    fn expect_row(rows_affected: u64, id: i64) -> Result<(), DbErr> {
        if rows_affected == 0 {
            return Err(DbErr::RecordNotFound(format!("outbox entry {id} not found")));
        }
        Ok(())
    }
}
