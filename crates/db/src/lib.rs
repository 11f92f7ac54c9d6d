use std::time::Duration;

use db_migration::Migrator;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;

pub use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait,
};

pub mod entities;
pub mod events;
pub mod models;
mod retry;
pub mod types;

pub use retry::retry_on_busy;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct DBService {
    pub pool: DatabaseConnection,
}

impl DBService {
    /// Connects and brings the schema up to date.
    pub async fn new(database_url: &str) -> Result<DBService, DbErr> {
        let mut options = ConnectOptions::new(database_url.to_string());
        options
            .connect_timeout(CONNECT_TIMEOUT)
            .sqlx_logging(false);
        let pool = Database::connect(options).await?;
        retry_on_busy(|| Migrator::up(&pool, None)).await?;
        tracing::info!("database migrations applied");
        Ok(DBService { pool })
    }

    pub fn from_connection(pool: DatabaseConnection) -> Self {
        DBService { pool }
    }
}
