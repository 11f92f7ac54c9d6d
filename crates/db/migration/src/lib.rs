use sea_orm_migration::prelude::*;

mod columns;
mod m20250101000000_baseline;
mod m20250110000000_ci_pipelines;
mod m20250120000000_cd_pipelines;
mod m20250201000000_pipeline_stages;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101000000_baseline::Migration),
            Box::new(m20250110000000_ci_pipelines::Migration),
            Box::new(m20250120000000_cd_pipelines::Migration),
            Box::new(m20250201000000_pipeline_stages::Migration),
        ]
    }
}
