use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, Set};

use super::Audit;
use crate::entities::{cluster, environment};

#[derive(Debug, Clone)]
pub struct NewCluster {
    pub cluster_name: String,
    pub server_url: String,
    pub bearer_token: String,
}

pub struct Environment;

impl Environment {
    pub async fn create_cluster<C: ConnectionTrait>(
        db: &C,
        data: NewCluster,
        audit: Audit,
    ) -> Result<cluster::Model, DbErr> {
        cluster::ActiveModel {
            cluster_name: Set(data.cluster_name),
            server_url: Set(data.server_url),
            bearer_token: Set(data.bearer_token),
            error_in_connecting: Set(String::new()),
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

    /// Records the last connectivity error; an empty string marks the
    /// cluster reachable.
    pub async fn set_cluster_connection_error<C: ConnectionTrait>(
        db: &C,
        cluster_id: i64,
        error: &str,
    ) -> Result<(), DbErr> {
        let cluster = Self::find_cluster(db, cluster_id).await?;
        let mut active: cluster::ActiveModel = cluster.into();
        active.error_in_connecting = Set(error.to_string());
        active.update(db).await?;
        Ok(())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        name: &str,
        cluster_id: i64,
        namespace: &str,
        audit: Audit,
    ) -> Result<environment::Model, DbErr> {
        environment::ActiveModel {
            name: Set(name.to_string()),
            cluster_id: Set(cluster_id),
            namespace: Set(namespace.to_string()),
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
    ) -> Result<environment::Model, DbErr> {
        environment::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Environment not found".to_string()))
    }

    pub async fn find_cluster<C: ConnectionTrait>(
        db: &C,
        cluster_id: i64,
    ) -> Result<cluster::Model, DbErr> {
        cluster::Entity::find_by_id(cluster_id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Cluster not found".to_string()))
    }

    pub async fn find_with_cluster<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<(environment::Model, cluster::Model), DbErr> {
        let env = Self::find_by_id(db, id).await?;
        let cluster = Self::find_cluster(db, env.cluster_id).await?;
        Ok((env, cluster))
    }
}
