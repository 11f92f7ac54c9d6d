use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use config::{CiCdConfig, load_config_from_file};
use db::DBService;
use server::sensor_client::HttpGitSensorClient;
use services::services::outbox::OutboxWorker;
use tracing_subscriber::{EnvFilter, prelude::*};

const CONFIG_PATH_ENV: &str = "CICD_CONFIG_PATH";

fn init_tracing() -> anyhow::Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},executors={level},config={level}",
        level = log_level
    );
    let env_filter =
        EnvFilter::try_new(filter_string).context("failed to create tracing filter")?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();
    Ok(())
}

fn load_config() -> CiCdConfig {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => load_config_from_file(&PathBuf::from(path)),
        None => CiCdConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let config = load_config();
    tracing::info!(
        mode = %config.mode,
        ci_executor = ?config.ci_workflow_executor_type,
        cd_executor = ?config.cd_workflow_executor_type,
        "configuration loaded"
    );

    let db = DBService::new(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    let sensor = HttpGitSensorClient::new(&config.git_sensor_url)
        .context("failed to build git sensor client")?;

    let outbox = OutboxWorker::new(db.clone(), Arc::new(sensor));
    match outbox.flush_pending().await {
        Ok(published) if published > 0 => {
            tracing::info!(published, "drained material outbox backlog");
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "initial outbox flush failed"),
    }
    let worker = outbox.spawn();
    tracing::info!(git_sensor = %config.git_sensor_url, "control plane started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl+C handler")?;
    tracing::info!("shutdown signal received");
    worker.abort();
    db.pool.close().await.context("failed to close database")?;
    Ok(())
}
