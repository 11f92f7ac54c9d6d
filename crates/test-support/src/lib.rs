use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

/// Fresh in-memory sqlite database with every migration applied.
pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    db_migration::Migrator::up(&db, None)
        .await
        .expect("apply migrations");
    db
}
