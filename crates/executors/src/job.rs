//! In-cluster Job executor. The Job is created suspended, its config maps
//! and secrets are created owned by it, then it is resumed.

use async_trait::async_trait;
use k8s_openapi::{
    api::{
        batch::v1::{Job, JobSpec},
        core::v1::{ConfigMap, PodSpec, PodTemplateSpec, Secret},
    },
    apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference},
};
use kube::{
    Api, Client,
    api::{DeleteParams, Patch, PatchParams, PostParams, PropagationPolicy},
};
use serde_json::json;

use crate::{
    error::WorkflowError,
    manifests::{config_map_body, secret_body},
    template::WorkflowTemplate,
};

const RESTART_POLICY_NEVER: &str = "Never";

/// Job spec for a run. Suspended until its config maps and secrets exist.
pub fn build_job(template: &WorkflowTemplate) -> Job {
    let pod_spec = PodSpec {
        containers: template.containers.clone(),
        volumes: Some(template.volumes.clone()).filter(|volumes| !volumes.is_empty()),
        restart_policy: Some(RESTART_POLICY_NEVER.to_string()),
        service_account_name: Some(template.service_account_name.clone())
            .filter(|account| !account.is_empty()),
        node_selector: Some(template.node_selector.clone()).filter(|selector| !selector.is_empty()),
        tolerations: Some(template.tolerations.clone()).filter(|tolerations| !tolerations.is_empty()),
        termination_grace_period_seconds: template.termination_grace_period_secs,
        ..Default::default()
    };
    Job {
        metadata: ObjectMeta {
            generate_name: Some(template.generate_name()),
            namespace: Some(template.namespace.clone()),
            labels: Some(template.labels()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(template.labels()),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            active_deadline_seconds: Some(template.active_deadline_seconds),
            ttl_seconds_after_finished: Some(template.ttl_seconds),
            backoff_limit: Some(0),
            suspend: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Owner reference binding a config map or secret to the created Job.
pub fn job_owner_ref(job: &Job) -> Result<OwnerReference, WorkflowError> {
    let name = job.metadata.name.clone().ok_or(WorkflowError::MissingName)?;
    Ok(OwnerReference {
        api_version: "batch/v1".to_string(),
        kind: "Job".to_string(),
        name,
        uid: job.metadata.uid.clone().unwrap_or_default(),
        block_owner_deletion: Some(true),
        controller: Some(true),
    })
}

/// Internal config maps and secrets of the run, owned by `job`.
pub fn owned_cm_cs(
    template: &WorkflowTemplate,
    job: &Job,
) -> Result<(Vec<ConfigMap>, Vec<Secret>), WorkflowError> {
    let owner = job_owner_ref(job)?;
    let config_maps = template
        .config_maps
        .iter()
        .filter(|cm| !cm.external)
        .map(|cm| config_map_body(cm, owner.clone()))
        .collect();
    let secrets = template
        .secrets
        .iter()
        .filter(|secret| !secret.external)
        .map(|secret| secret_body(secret, owner.clone()))
        .collect();
    Ok((config_maps, secrets))
}

/// Cluster calls made while launching a Job.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    async fn create_job(&self, job: &Job) -> Result<Job, WorkflowError>;
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<(), WorkflowError>;
    async fn create_secret(&self, secret: &Secret) -> Result<(), WorkflowError>;
    async fn resume_job(&self, name: &str) -> Result<Job, WorkflowError>;
    /// Foreground delete, so owned config maps and secrets go with the Job.
    async fn delete_job(&self, name: &str) -> Result<(), WorkflowError>;
}

pub struct KubeJobLauncher {
    jobs: Api<Job>,
    config_maps: Api<ConfigMap>,
    secrets: Api<Secret>,
}

impl KubeJobLauncher {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            jobs: Api::namespaced(client.clone(), namespace),
            config_maps: Api::namespaced(client.clone(), namespace),
            secrets: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl JobLauncher for KubeJobLauncher {
    async fn create_job(&self, job: &Job) -> Result<Job, WorkflowError> {
        Ok(self.jobs.create(&PostParams::default(), job).await?)
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<(), WorkflowError> {
        self.config_maps
            .create(&PostParams::default(), config_map)
            .await?;
        Ok(())
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), WorkflowError> {
        self.secrets.create(&PostParams::default(), secret).await?;
        Ok(())
    }

    async fn resume_job(&self, name: &str) -> Result<Job, WorkflowError> {
        let resume = json!({ "spec": { "suspend": false } });
        Ok(self
            .jobs
            .patch(name, &PatchParams::default(), &Patch::Merge(&resume))
            .await?)
    }

    async fn delete_job(&self, name: &str) -> Result<(), WorkflowError> {
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Foreground),
            ..Default::default()
        };
        self.jobs.delete(name, &params).await?;
        Ok(())
    }
}

async fn attach_and_resume<L: JobLauncher + ?Sized>(
    launcher: &L,
    template: &WorkflowTemplate,
    created: &Job,
    name: &str,
) -> Result<Job, WorkflowError> {
    let (config_maps, secrets) = owned_cm_cs(template, created)?;
    for cm in &config_maps {
        launcher.create_config_map(cm).await?;
    }
    for secret in &secrets {
        launcher.create_secret(secret).await?;
    }
    let resumed = launcher.resume_job(name).await?;
    tracing::info!(
        name,
        namespace = %template.namespace,
        config_maps = config_maps.len(),
        secrets = secrets.len(),
        "job submitted"
    );
    Ok(resumed)
}

/// Creates the suspended Job, its owned config maps and secrets, then
/// resumes it. A Job that cannot be resumed is deleted before the error
/// is returned.
pub async fn launch_job<L: JobLauncher + ?Sized>(
    launcher: &L,
    template: &WorkflowTemplate,
) -> Result<Job, WorkflowError> {
    let created = launcher.create_job(&build_job(template)).await?;
    let name = created.metadata.name.clone().ok_or(WorkflowError::MissingName)?;

    match attach_and_resume(launcher, template, &created, &name).await {
        Ok(resumed) => Ok(resumed),
        Err(err) => {
            if let Err(cleanup) = launcher.delete_job(&name).await {
                tracing::error!(
                    name = %name,
                    namespace = %template.namespace,
                    error = %cleanup,
                    "failed to delete suspended job"
                );
            }
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobWorkflowExecutor;

impl JobWorkflowExecutor {
    pub async fn execute(&self, client: Client, template: &WorkflowTemplate) -> Result<Job, WorkflowError> {
        launch_job(&KubeJobLauncher::new(client, &template.namespace), template).await
    }

    pub async fn get(&self, client: Client, name: &str, namespace: &str) -> Result<Job, WorkflowError> {
        let jobs: Api<Job> = Api::namespaced(client, namespace);
        Ok(jobs.get(name).await?)
    }

    pub async fn terminate(&self, client: Client, name: &str, namespace: &str) -> Result<(), WorkflowError> {
        let jobs: Api<Job> = Api::namespaced(client, namespace);
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Foreground),
            ..Default::default()
        };
        match jobs.delete(name, &params).await {
            Ok(_) => {
                tracing::info!(name, namespace, "job terminated");
                Ok(())
            }
            Err(kube::Error::Api(err)) if err.code == 404 => {
                Err(WorkflowError::WorkflowNotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
