use db::types::{AppType, CmCsNames, DeploymentAppType, DockerArgs, SourceType, TriggerType, WorkflowNodeType};
use db::models::ci_template::TemplateSpec;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::services::pipeline_stage::StageRequest;

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct LabelRequest {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub propagate: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppRequest {
    pub app_name: String,
    #[serde(default)]
    pub app_type: AppType,
    pub team_id: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<LabelRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRequest {
    #[serde(default)]
    pub id: i64,
    pub url: String,
    pub git_provider_id: i64,
    #[serde(default)]
    pub checkout_path: String,
    #[serde(default)]
    pub fetch_submodules: bool,
    #[serde(default)]
    pub filter_pattern: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaterialsRequest {
    pub app_id: i64,
    pub materials: Vec<MaterialRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SourceRequest {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub regex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CiMaterialRequest {
    #[serde(default)]
    pub id: i64,
    pub git_material_id: i64,
    pub source: SourceRequest,
}

/// Legacy build script stored outside structured stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CiScriptRequest {
    pub name: String,
    pub index: i32,
    pub script: String,
    #[serde(default)]
    pub output_location: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CiPipelineRequest {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    /// Wire name of the pipeline type (`CI_BUILD`, `LINKED`, `EXTERNAL`, `LINKED_CD`).
    #[serde(default)]
    pub pipeline_type: String,
    #[serde(default)]
    pub is_manual: bool,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default)]
    pub is_docker_config_overridden: bool,
    #[serde(default)]
    pub docker_config_override: Option<TemplateSpec>,
    #[serde(default)]
    pub parent_ci_pipeline_id: i64,
    #[serde(default)]
    pub docker_args: DockerArgs,
    #[serde(default)]
    pub scan_enabled: bool,
    #[serde(default)]
    pub ci_materials: Vec<CiMaterialRequest>,
    #[serde(default)]
    pub before_docker_build_scripts: Vec<CiScriptRequest>,
    #[serde(default)]
    pub after_docker_build_scripts: Vec<CiScriptRequest>,
    #[serde(default)]
    pub pre_build_stage: StageRequest,
    #[serde(default)]
    pub post_build_stage: StageRequest,
    /// Job pipelines only.
    #[serde(default)]
    pub environment_id: i64,
    #[serde(default)]
    pub is_clone_job: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CiConfigRequest {
    pub app_id: i64,
    #[serde(default)]
    pub app_workflow_id: i64,
    pub ci_pipelines: Vec<CiPipelineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CdPipelineRequest {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub environment_id: i64,
    #[serde(default)]
    pub ci_pipeline_id: i64,
    #[serde(default)]
    pub app_workflow_id: i64,
    #[serde(default)]
    pub parent_pipeline_id: i64,
    #[serde(default)]
    pub parent_pipeline_type: Option<WorkflowNodeType>,
    #[serde(default)]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub deployment_app_type: Option<DeploymentAppType>,
    #[serde(default)]
    pub pre_stage_config: String,
    #[serde(default)]
    pub post_stage_config: String,
    #[serde(default)]
    pub pre_trigger_type: TriggerType,
    #[serde(default)]
    pub post_trigger_type: TriggerType,
    #[serde(default)]
    pub pre_stage_config_map_secret_names: CmCsNames,
    #[serde(default)]
    pub post_stage_config_map_secret_names: CmCsNames,
    #[serde(default)]
    pub run_pre_stage_in_env: bool,
    #[serde(default)]
    pub run_post_stage_in_env: bool,
    #[serde(default)]
    pub pre_deploy_stage: StageRequest,
    #[serde(default)]
    pub post_deploy_stage: StageRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateCdRequest {
    pub app_id: i64,
    pub pipelines: Vec<CdPipelineRequest>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeleteAction {
    #[default]
    Cascade,
    NonCascade,
    Force,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AppDeleteResponse {
    pub delete_initiated: bool,
    pub cluster_reachable: bool,
    pub cluster_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub enum PatchStatus {
    Success,
    Failed,
    NotAuthorized,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CiMaterialPatchResult {
    pub app_id: i64,
    pub status: PatchStatus,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct BulkPatchResponse {
    pub apps: Vec<CiMaterialPatchResult>,
}
