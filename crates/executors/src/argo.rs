//! Workflow-CRD executor: one `argoproj.io/v1alpha1` Workflow per run.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{ConfigMap, Container, SecretKeySelector, Toleration, Volume},
    apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference},
};
use kube::{
    Api, Client, CustomResource,
    api::{Patch, PatchParams, PostParams},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::WorkflowError,
    manifests::{config_map_body, secret_body},
    request::ConfigSecretMap,
    template::{WorkflowTemplate, s3_endpoint},
};

const RESOURCE_CREATE_ACTION: &str = "create";
const RUN_WORKFLOW_STEP: &str = "run-wf";
pub const WORKFLOW_MINIO_CRED: &str = "workflow-minio-cred";
pub const CRED_ACCESS_KEY: &str = "accessKey";
pub const CRED_SECRET_KEY: &str = "secretKey";
const TERMINATE_STRATEGY: &str = "Terminate";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize)]
#[kube(
    group = "argoproj.io",
    version = "v1alpha1",
    kind = "Workflow",
    plural = "workflows",
    namespaced,
    status = "WorkflowStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    pub entrypoint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_strategy: Option<TtlStrategy>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtlStrategy {
    pub seconds_after_completion: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_deadline_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_location: Option<ArtifactLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Vec<WorkflowStep>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub name: String,
    pub template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub action: String,
    pub set_owner_reference: bool,
    pub manifest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLocation {
    pub archive_logs: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs: Option<GcsArtifact>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Artifact {
    pub key: String,
    pub endpoint: String,
    pub bucket: String,
    pub insecure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_secret: Option<SecretKeySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_secret: Option<SecretKeySelector>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcsArtifact {
    pub key: String,
    pub bucket: String,
    pub service_account_key_secret: Option<SecretKeySelector>,
}

fn minio_cred_selector(key: &str) -> SecretKeySelector {
    SecretKeySelector {
        key: key.to_string(),
        name: WORKFLOW_MINIO_CRED.to_string(),
        optional: None,
    }
}

/// Owner reference resolved by the workflow controller at run time.
fn workflow_owner_ref() -> OwnerReference {
    OwnerReference {
        api_version: "argoproj.io/v1alpha1".to_string(),
        kind: "Workflow".to_string(),
        name: "{{workflow.name}}".to_string(),
        uid: "{{workflow.uid}}".to_string(),
        block_owner_deletion: Some(true),
        controller: None,
    }
}

pub fn archive_location(template: &WorkflowTemplate) -> ArtifactLocation {
    let mut location = ArtifactLocation {
        archive_logs: template.archive_logs,
        ..Default::default()
    };
    if !template.blob_storage_configured {
        return location;
    }
    if let Some(s3) = &template.blob_storage_s3_config {
        let (access_key_secret, secret_key_secret) = if s3.access_key.is_empty() {
            (None, None)
        } else {
            (
                Some(minio_cred_selector(CRED_ACCESS_KEY)),
                Some(minio_cred_selector(CRED_SECRET_KEY)),
            )
        };
        location.s3 = Some(S3Artifact {
            key: template.cloud_storage_key.clone(),
            endpoint: s3_endpoint(&s3.endpoint_url),
            bucket: s3.ci_log_bucket_name.clone(),
            insecure: s3.is_in_secure,
            region: Some(s3.ci_log_region.clone()).filter(|region| !region.is_empty()),
            access_key_secret,
            secret_key_secret,
        });
    } else if let Some(gcp) = &template.gcp_blob_config {
        location.gcs = Some(GcsArtifact {
            key: template.cloud_storage_key.clone(),
            bucket: gcp.log_bucket_name.clone(),
            service_account_key_secret: Some(minio_cred_selector(CRED_SECRET_KEY)),
        });
    }
    location
}

fn resource_step(kind: &str, index: usize, manifest: String) -> (Vec<WorkflowStep>, Template) {
    let template_name = format!("{kind}-gb-{index}");
    let step = vec![WorkflowStep {
        name: format!("create-env-{kind}-gb-{index}"),
        template: template_name.clone(),
    }];
    let template = Template {
        name: template_name,
        resource: Some(ResourceTemplate {
            action: RESOURCE_CREATE_ACTION.to_string(),
            set_owner_reference: true,
            manifest,
        }),
        ..Default::default()
    };
    (step, template)
}

fn internal(entries: &[ConfigSecretMap]) -> impl Iterator<Item = &ConfigSecretMap> {
    entries.iter().filter(|entry| !entry.external)
}

/// Resource templates creating each internal config map and secret before
/// the main template runs. Empty when every entry is external.
pub fn cm_cs_templates(template: &WorkflowTemplate) -> Result<Vec<Template>, WorkflowError> {
    let mut steps = Vec::new();
    let mut templates = Vec::new();

    for (index, cm) in internal(&template.config_maps).enumerate() {
        let body: ConfigMap = config_map_body(cm, workflow_owner_ref());
        let (step, resource) = resource_step("cm", index, serde_json::to_string(&body)?);
        steps.push(step);
        templates.push(resource);
    }
    for (index, secret) in internal(&template.secrets).enumerate() {
        let body = secret_body(secret, workflow_owner_ref());
        let (step, resource) = resource_step("secret", index, serde_json::to_string(&body)?);
        steps.push(step);
        templates.push(resource);
    }
    if templates.is_empty() {
        return Ok(templates);
    }

    steps.push(vec![WorkflowStep {
        name: RUN_WORKFLOW_STEP.to_string(),
        template: template.main_template_name().to_string(),
    }]);
    templates.push(Template {
        name: template.stages_entrypoint().to_string(),
        steps,
        ..Default::default()
    });
    Ok(templates)
}

pub fn build_workflow(template: &WorkflowTemplate) -> Result<Workflow, WorkflowError> {
    let mut templates = cm_cs_templates(template)?;
    let entrypoint = if templates.is_empty() {
        template.main_template_name()
    } else {
        template.stages_entrypoint()
    };
    templates.push(Template {
        name: template.main_template_name().to_string(),
        container: template.main_container().cloned(),
        active_deadline_seconds: Some(template.active_deadline_seconds),
        archive_location: Some(archive_location(template)),
        ..Default::default()
    });

    let spec = WorkflowSpec {
        entrypoint: entrypoint.to_string(),
        service_account_name: template.service_account_name.clone(),
        node_selector: template.node_selector.clone(),
        tolerations: template.tolerations.clone(),
        ttl_strategy: Some(TtlStrategy {
            seconds_after_completion: Some(template.ttl_seconds),
        }),
        templates,
        volumes: template.volumes.clone(),
        shutdown: None,
    };
    let mut workflow = Workflow::new("", spec);
    workflow.metadata = ObjectMeta {
        generate_name: Some(template.generate_name()),
        namespace: Some(template.namespace.clone()),
        labels: Some(template.labels()),
        ..Default::default()
    };
    Ok(workflow)
}

#[derive(Debug, Clone, Default)]
pub struct ArgoWorkflowExecutor;

impl ArgoWorkflowExecutor {
    pub async fn execute(
        &self,
        client: Client,
        template: &WorkflowTemplate,
    ) -> Result<Workflow, WorkflowError> {
        let workflow = build_workflow(template)?;
        tracing::debug!(
            namespace = %template.namespace,
            workflow = %serde_json::to_string(&workflow)?,
            "workflow request to submit"
        );
        let api: Api<Workflow> = Api::namespaced(client, &template.namespace);
        let created = api.create(&PostParams::default(), &workflow).await?;
        tracing::info!(name = ?created.metadata.name, "workflow submitted");
        Ok(created)
    }

    pub async fn get(&self, client: Client, name: &str, namespace: &str) -> Result<Workflow, WorkflowError> {
        let api: Api<Workflow> = Api::namespaced(client, namespace);
        Ok(api.get(name).await?)
    }

    pub async fn terminate(&self, client: Client, name: &str, namespace: &str) -> Result<(), WorkflowError> {
        let api: Api<Workflow> = Api::namespaced(client, namespace);
        if let Err(err) = api.get(name).await {
            tracing::error!(name, error = %err, "cannot find workflow");
            return Err(WorkflowError::WorkflowNotFound(name.to_string()));
        }
        let patch = json!({ "spec": { "shutdown": TERMINATE_STRATEGY } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        tracing::info!(name, namespace, "workflow terminated");
        Ok(())
    }
}
