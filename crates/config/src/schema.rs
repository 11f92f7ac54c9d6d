use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

const DEFAULT_RUNNER_IMAGE: &str = "686244538589.dkr.ecr.us-east-2.amazonaws.com/cirunner:47";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum BlobStorageProvider {
    #[default]
    S3,
    Gcs,
    Azure,
    Minio,
}

/// Backend that runs a workflow: `AWF` submits a Workflow custom resource,
/// `SYSTEM` runs a plain Kubernetes Job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, Display, Default)]
pub enum WorkflowExecutorType {
    #[default]
    #[serde(rename = "AWF")]
    #[strum(serialize = "AWF")]
    Awf,
    #[serde(rename = "SYSTEM")]
    #[strum(serialize = "SYSTEM")]
    System,
}

fn default_mode() -> String {
    "DEV".to_string()
}

fn default_true() -> bool {
    true
}

fn default_build_log_ttl() -> i32 {
    3600
}

fn default_base_log_location() -> String {
    "/home/devtron/".to_string()
}

fn default_logs_key_prefix() -> String {
    "arsenal-v1".to_string()
}

fn default_cd_taints_key() -> String {
    "dedicated".to_string()
}

fn default_cd_taints_value() -> String {
    "ci".to_string()
}

fn default_cpu() -> String {
    "0.5".to_string()
}

fn default_ci_mem() -> String {
    "3G".to_string()
}

fn default_cd_req_mem() -> String {
    "1G".to_string()
}

fn default_ci_service_account() -> String {
    "ci-runner".to_string()
}

fn default_cd_service_account() -> String {
    "cd-runner".to_string()
}

fn default_ci_namespace() -> String {
    "devtron-ci".to_string()
}

fn default_cd_namespace() -> String {
    "devtron-cd".to_string()
}

fn default_timeout() -> i64 {
    3600
}

fn default_image_scanner_endpoint() -> String {
    "http://image-scanner-new-demo-devtroncd-service.devtroncd:80".to_string()
}

fn default_pre_ci_cache_path() -> String {
    "/devtroncd-cache".to_string()
}

fn default_docker_build_cache_path() -> String {
    "/var/lib/docker".to_string()
}

fn default_buildx_cache_path() -> String {
    "/var/lib/devtron/buildx".to_string()
}

fn default_wf_controller_instance_id() -> String {
    "devtron-runner".to_string()
}

fn default_termination_grace_period() -> i64 {
    180
}

fn default_external_blob_cm_name() -> String {
    "blob-storage-cm".to_string()
}

fn default_external_blob_secret_name() -> String {
    "blob-storage-secret".to_string()
}

fn default_runner_image() -> String {
    DEFAULT_RUNNER_IMAGE.to_string()
}

fn default_database_url() -> String {
    "sqlite://cicd.sqlite?mode=rwc".to_string()
}

fn default_git_sensor_url() -> String {
    "http://localhost:7070".to_string()
}

/// Immutable control-plane configuration, loaded once at start-up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct CiCdConfig {
    pub mode: String,
    pub orch_host: String,
    pub orch_token: String,

    pub blob_storage_enabled: bool,
    pub blob_storage_provider: BlobStorageProvider,
    pub blob_storage_s3_access_key: String,
    pub blob_storage_s3_secret_key: String,
    pub blob_storage_s3_endpoint: String,
    pub blob_storage_s3_endpoint_insecure: bool,
    pub blob_storage_s3_bucket_versioned: bool,
    pub default_build_logs_bucket: String,
    pub default_cd_logs_bucket_region: String,
    pub blob_storage_gcp_credentials_json: String,
    pub azure_account_name: String,
    pub azure_blob_container_ci_log: String,
    pub azure_account_key: String,
    pub build_log_ttl_value_in_secs: i32,
    pub base_log_location_path: String,
    pub default_build_logs_key_prefix: String,
    pub in_app_logging_enabled: bool,
    pub use_blob_storage_config_in_ci_workflow: bool,
    pub use_blob_storage_config_in_cd_workflow: bool,
    pub external_blob_storage_cm_name: String,
    pub external_blob_storage_secret_name: String,

    pub ci_node_label_selector: BTreeMap<String, String>,
    pub ci_node_taints_key: String,
    pub ci_node_taints_value: String,
    pub cd_node_taints_key: String,
    pub cd_node_taints_value: String,

    pub limit_ci_cpu: String,
    pub limit_ci_mem: String,
    pub req_ci_cpu: String,
    pub req_ci_mem: String,
    pub cd_limit_ci_cpu: String,
    pub cd_limit_ci_mem: String,
    pub cd_req_ci_cpu: String,
    pub cd_req_ci_mem: String,

    pub workflow_service_account: String,
    pub cd_workflow_service_account: String,
    pub default_namespace: String,
    pub default_cd_namespace: String,
    pub default_timeout: i64,
    pub default_cd_timeout: i64,
    pub ci_default_image: String,
    pub cd_default_image: String,
    pub image_scanner_endpoint: String,

    pub pre_ci_cache_path: String,
    pub docker_build_cache_path: String,
    pub buildx_cache_path: String,

    pub ci_workflow_executor_type: WorkflowExecutorType,
    pub cd_workflow_executor_type: WorkflowExecutorType,
    pub skip_creating_ecr_repo: bool,
    pub wf_controller_instance_id: String,
    pub termination_grace_period_secs: i64,

    pub database_url: String,
    pub git_sensor_url: String,
}

impl Default for CiCdConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            orch_host: String::new(),
            orch_token: String::new(),
            blob_storage_enabled: false,
            blob_storage_provider: BlobStorageProvider::default(),
            blob_storage_s3_access_key: String::new(),
            blob_storage_s3_secret_key: String::new(),
            blob_storage_s3_endpoint: String::new(),
            blob_storage_s3_endpoint_insecure: false,
            blob_storage_s3_bucket_versioned: default_true(),
            default_build_logs_bucket: String::new(),
            default_cd_logs_bucket_region: String::new(),
            blob_storage_gcp_credentials_json: String::new(),
            azure_account_name: String::new(),
            azure_blob_container_ci_log: String::new(),
            azure_account_key: String::new(),
            build_log_ttl_value_in_secs: default_build_log_ttl(),
            base_log_location_path: default_base_log_location(),
            default_build_logs_key_prefix: default_logs_key_prefix(),
            in_app_logging_enabled: false,
            use_blob_storage_config_in_ci_workflow: default_true(),
            use_blob_storage_config_in_cd_workflow: default_true(),
            external_blob_storage_cm_name: default_external_blob_cm_name(),
            external_blob_storage_secret_name: default_external_blob_secret_name(),
            ci_node_label_selector: BTreeMap::new(),
            ci_node_taints_key: String::new(),
            ci_node_taints_value: String::new(),
            cd_node_taints_key: default_cd_taints_key(),
            cd_node_taints_value: default_cd_taints_value(),
            limit_ci_cpu: default_cpu(),
            limit_ci_mem: default_ci_mem(),
            req_ci_cpu: default_cpu(),
            req_ci_mem: default_ci_mem(),
            cd_limit_ci_cpu: default_cpu(),
            cd_limit_ci_mem: default_ci_mem(),
            cd_req_ci_cpu: default_cpu(),
            cd_req_ci_mem: default_cd_req_mem(),
            workflow_service_account: default_ci_service_account(),
            cd_workflow_service_account: default_cd_service_account(),
            default_namespace: default_ci_namespace(),
            default_cd_namespace: default_cd_namespace(),
            default_timeout: default_timeout(),
            default_cd_timeout: default_timeout(),
            ci_default_image: default_runner_image(),
            cd_default_image: default_runner_image(),
            image_scanner_endpoint: default_image_scanner_endpoint(),
            pre_ci_cache_path: default_pre_ci_cache_path(),
            docker_build_cache_path: default_docker_build_cache_path(),
            buildx_cache_path: default_buildx_cache_path(),
            ci_workflow_executor_type: WorkflowExecutorType::default(),
            cd_workflow_executor_type: WorkflowExecutorType::default(),
            skip_creating_ecr_repo: false,
            wf_controller_instance_id: default_wf_controller_instance_id(),
            termination_grace_period_secs: default_termination_grace_period(),
            database_url: default_database_url(),
            git_sensor_url: default_git_sensor_url(),
        }
    }
}

/// Parses `k=v,k2=v2`; malformed pairs are dropped.
pub fn parse_label_selector(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str, default: String) -> String {
        (self.lookup)(name).unwrap_or(default)
    }

    fn lookup_raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|raw| !raw.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str, default: T) -> T {
        match self.lookup_raw(name) {
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(value) => value,
                Err(_) => {
                    tracing::warn!(env = name, value = %raw, "invalid config value, using default");
                    default
                }
            },
            None => default,
        }
    }
}

impl CiCdConfig {
    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<CiCdConfig>(raw_config) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source; unset names
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let d = Self::default();
        Self {
            mode: env.string("MODE", d.mode),
            orch_host: env.string("ORCH_HOST", d.orch_host),
            orch_token: env.string("ORCH_TOKEN", d.orch_token),
            blob_storage_enabled: env.parse("BLOB_STORAGE_ENABLED", d.blob_storage_enabled),
            blob_storage_provider: env.parse("BLOB_STORAGE_PROVIDER", d.blob_storage_provider),
            blob_storage_s3_access_key: env
                .string("BLOB_STORAGE_S3_ACCESS_KEY", d.blob_storage_s3_access_key),
            blob_storage_s3_secret_key: env
                .string("BLOB_STORAGE_S3_SECRET_KEY", d.blob_storage_s3_secret_key),
            blob_storage_s3_endpoint: env
                .string("BLOB_STORAGE_S3_ENDPOINT", d.blob_storage_s3_endpoint),
            blob_storage_s3_endpoint_insecure: env.parse(
                "BLOB_STORAGE_S3_ENDPOINT_INSECURE",
                d.blob_storage_s3_endpoint_insecure,
            ),
            blob_storage_s3_bucket_versioned: env.parse(
                "BLOB_STORAGE_S3_BUCKET_VERSIONED",
                d.blob_storage_s3_bucket_versioned,
            ),
            default_build_logs_bucket: env
                .string("DEFAULT_BUILD_LOGS_BUCKET", d.default_build_logs_bucket),
            default_cd_logs_bucket_region: env
                .string("DEFAULT_CD_LOGS_BUCKET_REGION", d.default_cd_logs_bucket_region),
            blob_storage_gcp_credentials_json: env.string(
                "BLOB_STORAGE_GCP_CREDENTIALS_JSON",
                d.blob_storage_gcp_credentials_json,
            ),
            azure_account_name: env.string("AZURE_ACCOUNT_NAME", d.azure_account_name),
            azure_blob_container_ci_log: env
                .string("AZURE_BLOB_CONTAINER_CI_LOG", d.azure_blob_container_ci_log),
            azure_account_key: env.string("AZURE_ACCOUNT_KEY", d.azure_account_key),
            build_log_ttl_value_in_secs: env
                .parse("BUILD_LOG_TTL_VALUE_IN_SECS", d.build_log_ttl_value_in_secs),
            base_log_location_path: env
                .string("BASE_LOG_LOCATION_PATH", d.base_log_location_path),
            default_build_logs_key_prefix: env
                .string("DEFAULT_BUILD_LOGS_KEY_PREFIX", d.default_build_logs_key_prefix),
            in_app_logging_enabled: env.parse("IN_APP_LOGGING_ENABLED", d.in_app_logging_enabled),
            use_blob_storage_config_in_ci_workflow: env.parse(
                "USE_BLOB_STORAGE_CONFIG_IN_CI_WORKFLOW",
                d.use_blob_storage_config_in_ci_workflow,
            ),
            use_blob_storage_config_in_cd_workflow: env.parse(
                "USE_BLOB_STORAGE_CONFIG_IN_CD_WORKFLOW",
                d.use_blob_storage_config_in_cd_workflow,
            ),
            external_blob_storage_cm_name: env
                .string("EXTERNAL_BLOB_STORAGE_CM_NAME", d.external_blob_storage_cm_name),
            external_blob_storage_secret_name: env.string(
                "EXTERNAL_BLOB_STORAGE_SECRET_NAME",
                d.external_blob_storage_secret_name,
            ),
            ci_node_label_selector: env
                .lookup_raw("CI_NODE_LABEL_SELECTOR")
                .map(|raw| parse_label_selector(&raw))
                .unwrap_or(d.ci_node_label_selector),
            ci_node_taints_key: env.string("CI_NODE_TAINTS_KEY", d.ci_node_taints_key),
            ci_node_taints_value: env.string("CI_NODE_TAINTS_VALUE", d.ci_node_taints_value),
            cd_node_taints_key: env.string("CD_NODE_TAINTS_KEY", d.cd_node_taints_key),
            cd_node_taints_value: env.string("CD_NODE_TAINTS_VALUE", d.cd_node_taints_value),
            limit_ci_cpu: env.string("LIMIT_CI_CPU", d.limit_ci_cpu),
            limit_ci_mem: env.string("LIMIT_CI_MEM", d.limit_ci_mem),
            req_ci_cpu: env.string("REQ_CI_CPU", d.req_ci_cpu),
            req_ci_mem: env.string("REQ_CI_MEM", d.req_ci_mem),
            cd_limit_ci_cpu: env.string("CD_LIMIT_CI_CPU", d.cd_limit_ci_cpu),
            cd_limit_ci_mem: env.string("CD_LIMIT_CI_MEM", d.cd_limit_ci_mem),
            cd_req_ci_cpu: env.string("CD_REQ_CI_CPU", d.cd_req_ci_cpu),
            cd_req_ci_mem: env.string("CD_REQ_CI_MEM", d.cd_req_ci_mem),
            workflow_service_account: env
                .string("WORKFLOW_SERVICE_ACCOUNT", d.workflow_service_account),
            cd_workflow_service_account: env
                .string("CD_WORKFLOW_SERVICE_ACCOUNT", d.cd_workflow_service_account),
            default_namespace: env.string("DEFAULT_NAMESPACE", d.default_namespace),
            default_cd_namespace: env.string("DEFAULT_CD_NAMESPACE", d.default_cd_namespace),
            default_timeout: env.parse("DEFAULT_TIMEOUT", d.default_timeout),
            default_cd_timeout: env.parse("DEFAULT_CD_TIMEOUT", d.default_cd_timeout),
            ci_default_image: env.string("DEFAULT_CI_IMAGE", d.ci_default_image),
            cd_default_image: env.string("DEFAULT_CD_IMAGE", d.cd_default_image),
            image_scanner_endpoint: env
                .string("IMAGE_SCANNER_ENDPOINT", d.image_scanner_endpoint),
            pre_ci_cache_path: env.string("PRE_CI_CACHE_PATH", d.pre_ci_cache_path),
            docker_build_cache_path: env
                .string("DOCKER_BUILD_CACHE_PATH", d.docker_build_cache_path),
            buildx_cache_path: env.string("BUILDX_CACHE_PATH", d.buildx_cache_path),
            ci_workflow_executor_type: env
                .parse("CI_WORKFLOW_EXECUTOR_TYPE", d.ci_workflow_executor_type),
            cd_workflow_executor_type: env
                .parse("CD_WORKFLOW_EXECUTOR_TYPE", d.cd_workflow_executor_type),
            skip_creating_ecr_repo: env.parse("SKIP_CREATING_ECR_REPO", d.skip_creating_ecr_repo),
            wf_controller_instance_id: env
                .string("WF_CONTROLLER_INSTANCE_ID", d.wf_controller_instance_id),
            termination_grace_period_secs: env
                .parse("TERMINATION_GRACE_PERIOD_SECS", d.termination_grace_period_secs),
            database_url: env.string("DATABASE_URL", d.database_url),
            git_sensor_url: env.string("GIT_SENSOR_URL", d.git_sensor_url),
        }
    }

    /// Blob storage is usable for archiving when enabled and a provider
    /// bucket/container is known.
    pub fn blob_storage_configured(&self) -> bool {
        if !self.blob_storage_enabled {
            return false;
        }
        match self.blob_storage_provider {
            BlobStorageProvider::S3 | BlobStorageProvider::Minio | BlobStorageProvider::Gcs => {
                !self.default_build_logs_bucket.is_empty()
            }
            BlobStorageProvider::Azure => !self.azure_blob_container_ci_log.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let config = CiCdConfig::from_lookup(lookup(&[]));
        assert_eq!(config, CiCdConfig::default());
        assert_eq!(config.cd_req_ci_mem, "1G");
        assert_eq!(config.termination_grace_period_secs, 180);
    }

    #[test]
    fn variables_override_defaults() {
        let config = CiCdConfig::from_lookup(lookup(&[
            ("BLOB_STORAGE_ENABLED", "true"),
            ("BLOB_STORAGE_PROVIDER", "minio"),
            ("CD_WORKFLOW_EXECUTOR_TYPE", "SYSTEM"),
            ("CI_NODE_LABEL_SELECTOR", "pool=ci, zone=a,broken"),
            ("DEFAULT_TIMEOUT", "120"),
        ]));
        assert!(config.blob_storage_enabled);
        assert_eq!(config.blob_storage_provider, BlobStorageProvider::Minio);
        assert_eq!(config.cd_workflow_executor_type, WorkflowExecutorType::System);
        assert_eq!(config.ci_workflow_executor_type, WorkflowExecutorType::Awf);
        assert_eq!(config.default_timeout, 120);
        assert_eq!(config.ci_node_label_selector.len(), 2);
        assert_eq!(config.ci_node_label_selector["zone"], "a");
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = CiCdConfig::from_lookup(lookup(&[
            ("BUILD_LOG_TTL_VALUE_IN_SECS", "soon"),
            ("IN_APP_LOGGING_ENABLED", "maybe"),
        ]));
        assert_eq!(config.build_log_ttl_value_in_secs, 3600);
        assert!(!config.in_app_logging_enabled);
    }

    #[test]
    fn blob_storage_requires_a_bucket() {
        let mut config = CiCdConfig {
            blob_storage_enabled: true,
            ..CiCdConfig::default()
        };
        assert!(!config.blob_storage_configured());
        config.default_build_logs_bucket = "logs".to_string();
        assert!(config.blob_storage_configured());
    }
}
