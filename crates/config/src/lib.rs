use std::path::Path;

use thiserror::Error;

mod schema;

pub use schema::{BlobStorageProvider, CiCdConfig, WorkflowExecutorType, parse_label_selector};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Will always return config, falling back to defaults on missing/invalid files.
pub fn load_config_from_file(config_path: &Path) -> CiCdConfig {
    match std::fs::read_to_string(config_path) {
        Ok(raw_config) => CiCdConfig::from_raw(&raw_config),
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                tracing::info!(path = %config_path.display(), "No config file found, using defaults");
            } else {
                tracing::warn!("Failed to read config file: {}", err);
            }
            CiCdConfig::default()
        }
    }
}

pub fn save_config_to_file(config: &CiCdConfig, config_path: &Path) -> Result<(), ConfigError> {
    let raw_config = serde_json::to_string_pretty(config)?;
    std::fs::write(config_path, raw_config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_file(&dir.path().join("absent.json"));
        assert_eq!(config.build_log_ttl_value_in_secs, 3600);
        assert_eq!(config.ci_workflow_executor_type, WorkflowExecutorType::Awf);
    }

    #[test]
    fn saved_config_is_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = CiCdConfig {
            default_namespace: "builds".to_string(),
            in_app_logging_enabled: true,
            ..CiCdConfig::default()
        };
        save_config_to_file(&config, &path).unwrap();

        let loaded = load_config_from_file(&path);
        assert_eq!(loaded.default_namespace, "builds");
        assert!(loaded.in_app_logging_enabled);
        assert_eq!(loaded.cd_node_taints_key, "dedicated");
    }

    #[test]
    fn unparsable_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = load_config_from_file(&path);
        assert_eq!(config.default_cd_namespace, "devtron-cd");
    }
}
