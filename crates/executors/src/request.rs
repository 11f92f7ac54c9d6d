use std::collections::{BTreeMap, BTreeSet};

use config::{BlobStorageProvider, CiCdConfig, WorkflowExecutorType};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use crate::steps::{RefPluginObject, StepObject};

pub const CI_WORKFLOW_NAME: &str = "ci";
pub const CD_WORKFLOW_NAME: &str = "cd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowPipelineType {
    #[default]
    Ci,
    Cd,
    Job,
}

impl WorkflowPipelineType {
    /// CI and Job runs share images, limits and node constraints.
    pub fn is_build(self) -> bool {
        matches!(self, WorkflowPipelineType::Ci | WorkflowPipelineType::Job)
    }

    /// Discriminator written as the `type` of the trigger event.
    pub fn event_type(self) -> &'static str {
        if self.is_build() { "CI" } else { "CD" }
    }

    pub fn workflow_name(self) -> &'static str {
        if self.is_build() {
            CI_WORKFLOW_NAME
        } else {
            CD_WORKFLOW_NAME
        }
    }
}

/// Which CD stage a run executes; empty for CI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CdStage {
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "lowercase")]
pub enum CmCsUsage {
    #[default]
    Environment,
    Volume,
}

/// A config map or secret injected into a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSecretMap {
    pub name: String,
    #[serde(rename = "type")]
    pub usage: CmCsUsage,
    pub external: bool,
    pub mount_path: String,
    pub sub_path: bool,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigKind {
    ConfigMap,
    Secret,
}

/// Cluster-wide config map or secret scoped to CI or CD runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct GlobalCmCs {
    pub name: String,
    pub kind: ConfigKind,
    pub usage: CmCsUsage,
    pub mount_path: String,
    pub data: BTreeMap<String, String>,
}

/// Names of the app/env config maps and secrets a CD stage opted into.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfiguredCmCs {
    pub config_maps: BTreeSet<String>,
    pub secrets: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterTarget {
    pub cluster_id: i64,
    pub cluster_name: String,
    pub server_url: String,
    pub bearer_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvironmentTarget {
    pub id: i64,
    pub name: String,
    pub namespace: String,
    pub cluster: ClusterTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
pub struct S3BlobConfig {
    pub access_key: String,
    pub secret_key: String,
    pub endpoint_url: String,
    pub is_in_secure: bool,
    pub ci_log_bucket_name: String,
    pub ci_log_region: String,
    pub ci_log_bucket_versioning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
pub struct GcpBlobConfig {
    pub credential_file_json_data: String,
    pub log_bucket_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
pub struct AzureBlobConfig {
    pub enabled: bool,
    pub account_name: String,
    pub account_key: String,
    pub blob_container_ci_log: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
pub struct CiProjectDetails {
    pub git_repository: String,
    pub material_name: String,
    pub checkout_path: String,
    pub fetch_submodules: bool,
    pub source_type: String,
    pub source_value: String,
}

/// Everything a runner needs for one CI, Job or CD stage run.
///
/// Serialized fields form the `CI_CD_EVENT` payload. Skipped fields carry the
/// routing context the submitter uses to build the workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    pub workflow_name_prefix: String,
    pub pipeline_name: String,
    pub pipeline_id: i64,
    pub app_id: i64,
    pub app_name: String,
    pub environment_id: i64,
    pub workflow_id: i64,
    pub workflow_runner_id: i64,
    pub cd_pipeline_id: i64,
    pub namespace: String,
    pub ci_image: String,
    pub cd_image: String,
    pub active_deadline_seconds: i64,
    pub docker_image_tag: String,
    pub docker_registry_id: String,
    pub docker_repository: String,
    pub checkout_path: String,
    pub ci_project_details: Vec<CiProjectDetails>,
    pub pre_ci_steps: Vec<StepObject>,
    pub post_ci_steps: Vec<StepObject>,
    pub pre_post_deploy_steps: Vec<StepObject>,
    pub ref_plugins: Vec<RefPluginObject>,
    pub stage_yaml: String,
    pub stage_type: Option<CdStage>,
    pub scan_enabled: bool,
    pub cloud_provider: BlobStorageProvider,
    pub blob_storage_configured: bool,
    pub blob_storage_s3_config: Option<S3BlobConfig>,
    pub azure_blob_config: Option<AzureBlobConfig>,
    pub gcp_blob_config: Option<GcpBlobConfig>,
    pub blob_storage_logs_key: String,
    pub in_app_logging_enabled: bool,
    pub ignore_docker_cache_push: bool,
    pub ignore_docker_cache_pull: bool,
    #[serde(rename = "IsPvcMounted")]
    pub is_pvc_mounted: bool,
    pub extra_environment_variables: BTreeMap<String, String>,
    pub orchestrator_host: String,
    pub orchestrator_token: String,
    pub is_ext_run: bool,
    pub workflow_prefix_for_log: String,
    pub triggered_by: i64,
    pub workflow_executor: Option<WorkflowExecutorType>,
    pub use_external_cluster_blob: bool,
    #[serde(skip)]
    #[ts(skip)]
    pub pipeline_type: WorkflowPipelineType,
    #[serde(skip)]
    #[ts(skip)]
    pub env: Option<EnvironmentTarget>,
    #[serde(skip)]
    #[ts(skip)]
    pub app_labels: BTreeMap<String, String>,
    #[serde(skip)]
    #[ts(skip)]
    pub configured_cm_cs: ConfiguredCmCs,
    #[serde(skip)]
    #[ts(skip)]
    pub run_stage_in_env: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CiCdTriggerEvent<'a> {
    #[serde(rename = "type")]
    event_type: &'static str,
    common_workflow_request: &'a WorkflowRequest,
}

impl WorkflowRequest {
    pub fn is_job(&self) -> bool {
        self.pipeline_type == WorkflowPipelineType::Job
    }

    /// Stamps the fields derived from config and routing before the request
    /// is serialized for the runner.
    pub fn prepare(&mut self, config: &CiCdConfig) {
        let logs_prefix = if self.pipeline_type.is_build() {
            &self.workflow_name_prefix
        } else {
            &self.workflow_prefix_for_log
        };
        self.blob_storage_logs_key =
            format!("{}/{}", config.default_build_logs_key_prefix, logs_prefix);
        self.in_app_logging_enabled = config.in_app_logging_enabled
            || self.workflow_executor == Some(WorkflowExecutorType::System);

        if self.stage_type.is_some() && self.run_stage_in_env {
            self.is_ext_run = true;
        }
        if self.is_job()
            && let Some(env) = self.env.as_ref().filter(|env| env.id != 0)
        {
            self.environment_id = env.id;
            self.is_ext_run = true;
        }
    }

    /// `CI_CD_EVENT` payload.
    pub fn to_event_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&CiCdTriggerEvent {
            event_type: self.pipeline_type.event_type(),
            common_workflow_request: self,
        })
    }

    pub fn image(&self) -> &str {
        if self.pipeline_type.is_build() {
            &self.ci_image
        } else {
            &self.cd_image
        }
    }

    /// Suffix isolating the app/env config maps and secrets of one run.
    pub fn existing_cm_cs_suffix(&self) -> String {
        if self.pipeline_type.is_build() {
            format!("{}-{}", self.workflow_id, CI_WORKFLOW_NAME)
        } else {
            format!("{}-{}", self.workflow_id, self.workflow_runner_id)
        }
    }

    /// Suffix isolating the global config maps and secrets of one run.
    pub fn global_cm_cs_suffix(&self) -> String {
        if self.pipeline_type.is_build() {
            format!("{}-{}", self.workflow_id, CI_WORKFLOW_NAME)
        } else {
            format!("{}-{}", self.workflow_runner_id, CD_WORKFLOW_NAME)
        }
    }

    pub fn blob_storage_allowed(&self, config: &CiCdConfig) -> bool {
        if self.pipeline_type.is_build() {
            config.use_blob_storage_config_in_ci_workflow
        } else {
            config.use_blob_storage_config_in_cd_workflow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cd_request() -> WorkflowRequest {
        WorkflowRequest {
            pipeline_type: WorkflowPipelineType::Cd,
            workflow_id: 12,
            workflow_runner_id: 34,
            workflow_prefix_for_log: "cd-12-34".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn event_json_carries_type_discriminator() {
        let request = cd_request();
        let json: serde_json::Value =
            serde_json::from_str(&request.to_event_json().unwrap()).unwrap();
        assert_eq!(json["type"], "CD");
        assert_eq!(json["commonWorkflowRequest"]["workflowRunnerId"], 34);
        assert!(json["commonWorkflowRequest"].get("appLabels").is_none());
    }

    #[test]
    fn prepare_enables_in_app_logging_for_system_executor() {
        let mut request = cd_request();
        request.workflow_executor = Some(WorkflowExecutorType::System);
        request.prepare(&CiCdConfig::default());
        assert!(request.in_app_logging_enabled);
        assert_eq!(request.blob_storage_logs_key, "arsenal-v1/cd-12-34");
    }

    #[test]
    fn prepare_marks_job_with_environment_as_external_run() {
        let mut request = WorkflowRequest {
            pipeline_type: WorkflowPipelineType::Job,
            env: Some(EnvironmentTarget {
                id: 9,
                ..Default::default()
            }),
            ..Default::default()
        };
        request.prepare(&CiCdConfig::default());
        assert!(request.is_ext_run);
        assert_eq!(request.environment_id, 9);
    }

    #[test]
    fn cm_cs_suffixes_follow_pipeline_type() {
        let request = cd_request();
        assert_eq!(request.existing_cm_cs_suffix(), "12-34");
        assert_eq!(request.global_cm_cs_suffix(), "34-cd");

        let job = WorkflowRequest {
            pipeline_type: WorkflowPipelineType::Job,
            workflow_id: 100,
            ..Default::default()
        };
        assert_eq!(job.existing_cm_cs_suffix(), "100-ci");
    }
}
