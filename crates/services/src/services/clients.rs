//! Outbound collaborators of the control plane. Each is a narrow async
//! trait so the orchestrator can be wired against HTTP clients in the
//! server and against recording fakes in tests.

use std::sync::Arc;

use async_trait::async_trait;
use db::entities::{ci_pipeline_material, git_material};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Rejected(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClientError::AlreadyExists(_))
    }
}

/// Material as the git sensor polls it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorMaterial {
    pub id: i64,
    pub git_provider_id: i64,
    pub url: String,
    pub name: String,
    pub checkout_location: String,
    pub deleted: bool,
    pub fetch_submodules: bool,
    pub filter_pattern: Vec<String>,
}

impl From<&git_material::Model> for SensorMaterial {
    fn from(model: &git_material::Model) -> Self {
        Self {
            id: model.id,
            git_provider_id: model.git_provider_id,
            url: model.url.clone(),
            name: model.name.clone(),
            checkout_location: model.checkout_path.clone(),
            deleted: !model.active,
            fetch_submodules: model.fetch_submodules,
            filter_pattern: model.filter_pattern.0.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorPipelineMaterial {
    pub id: i64,
    pub git_material_id: i64,
    pub r#type: String,
    pub value: String,
    pub regex: String,
    pub active: bool,
}

impl From<&ci_pipeline_material::Model> for SensorPipelineMaterial {
    fn from(model: &ci_pipeline_material::Model) -> Self {
        Self {
            id: model.id,
            git_material_id: model.git_material_id,
            r#type: model.source_type.to_string(),
            value: model.value.clone(),
            regex: model.regex.clone(),
            active: model.active,
        }
    }
}

#[async_trait]
pub trait GitSensorClient: Send + Sync {
    async fn add_repo(&self, materials: &[SensorMaterial]) -> Result<(), ClientError>;
    async fn update_repo(&self, material: &SensorMaterial) -> Result<(), ClientError>;
    async fn save_pipeline_material(
        &self,
        materials: &[SensorPipelineMaterial],
    ) -> Result<(), ClientError>;
}

/// The GitOps controller reconciling deployed applications.
#[async_trait]
pub trait GitOpsClient: Send + Sync {
    async fn get_application(&self, name: &str) -> Result<(), ClientError>;
    async fn delete_application(&self, name: &str, cascade: bool) -> Result<(), ClientError>;
    async fn register_repository(&self, repo_url: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOpsRepository {
    pub repo_url: String,
    pub chart_location: String,
}

/// Git hosting for GitOps chart repositories.
#[async_trait]
pub trait GitOpsRepoService: Send + Sync {
    async fn is_configured(&self) -> Result<bool, ClientError>;
    async fn create_repository(
        &self,
        app_name: &str,
        user_id: i64,
    ) -> Result<GitOpsRepository, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIdentifier {
    pub cluster_id: i64,
    pub release_name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmDeleteResponse {
    pub success: bool,
}

#[async_trait]
pub trait HelmClient: Send + Sync {
    async fn get_application_detail(&self, app: &AppIdentifier) -> Result<(), ClientError>;
    async fn delete_application(
        &self,
        app: &AppIdentifier,
    ) -> Result<Option<HelmDeleteResponse>, ClientError>;
}

#[async_trait]
pub trait ContainerRegistry: Send + Sync {
    /// Succeeds when the repository already exists.
    async fn ensure_repository(&self, registry_id: &str, repository: &str)
    -> Result<(), ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RbacAction {
    Update,
    Trigger,
}

#[async_trait]
pub trait RbacEnforcer: Send + Sync {
    async fn is_allowed(&self, user_id: i64, action: RbacAction, app_id: i64) -> bool;
    async fn delete_app_roles(&self, app_name: &str) -> Result<(), ClientError>;
}

/// Per-environment config map and secret scopes of an application.
#[async_trait]
pub trait ScopedConfigService: Send + Sync {
    async fn ensure_environment_scope(
        &self,
        app_id: i64,
        environment_id: i64,
        user_id: i64,
    ) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployArtifact {
    pub ci_artifact_id: i64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub pipeline_id: i64,
    pub ci_artifact_id: i64,
    pub user_id: i64,
}

#[async_trait]
pub trait DeploymentTrigger: Send + Sync {
    async fn latest_deploy_artifact(
        &self,
        pipeline_id: i64,
    ) -> Result<Option<DeployArtifact>, ClientError>;
    async fn trigger_bulk(&self, requests: Vec<TriggerRequest>) -> Result<(), ClientError>;
}

/// Everything the orchestrator and the migration controller call out to.
#[derive(Clone)]
pub struct Collaborators {
    pub git_sensor: Arc<dyn GitSensorClient>,
    pub gitops: Arc<dyn GitOpsClient>,
    pub gitops_repos: Arc<dyn GitOpsRepoService>,
    pub helm: Arc<dyn HelmClient>,
    pub registry: Arc<dyn ContainerRegistry>,
    pub rbac: Arc<dyn RbacEnforcer>,
    pub scoped_config: Arc<dyn ScopedConfigService>,
    pub deployments: Arc<dyn DeploymentTrigger>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::types::StringList;

    use super::*;

    #[test]
    fn sensor_material_marks_inactive_rows_deleted() {
        let now = Utc::now();
        let model = git_material::Model {
            id: 3,
            app_id: 1,
            git_provider_id: 7,
            url: "https://g/x/y.git".to_string(),
            name: "7-y".to_string(),
            checkout_path: "./".to_string(),
            fetch_submodules: true,
            filter_pattern: StringList(vec!["*.md".to_string()]),
            active: false,
            created_by: 1,
            updated_by: 1,
            created_at: now,
            updated_at: now,
        };
        let material = SensorMaterial::from(&model);
        assert!(material.deleted);
        assert_eq!(material.checkout_location, "./");
        let json = serde_json::to_value(&material).unwrap();
        assert_eq!(json["gitProviderId"], 7);
        assert_eq!(json["filterPattern"][0], "*.md");
    }
}
