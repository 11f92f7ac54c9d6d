use std::sync::Arc;

use async_trait::async_trait;
use config::{CiCdConfig, WorkflowExecutorType};
use k8s_openapi::api::batch::v1::Job;
use kube::Client;

use crate::{
    argo::{ArgoWorkflowExecutor, Workflow},
    cluster::client_for,
    error::WorkflowError,
    job::JobWorkflowExecutor,
    request::{ConfigSecretMap, GlobalCmCs, WorkflowRequest},
    template::{
        ClusterRouting, WorkflowTemplate, app_label_node_selector, apply_node_constraints,
        assemble_cm_cs, main_container, pvc_claim, pvc_volume, volumes_for_cm_cs,
    },
};

/// Config maps and secrets known to the control plane.
#[async_trait]
pub trait CmCsSource: Send + Sync {
    /// Global entries scoped to `CI` or `CD` runs.
    async fn global_cm_cs(&self, event_type: &str) -> Result<Vec<GlobalCmCs>, WorkflowError>;

    /// App and environment level config maps and secrets.
    async fn app_cm_cs(
        &self,
        app_id: i64,
        environment_id: i64,
        is_job: bool,
    ) -> Result<(Vec<ConfigSecretMap>, Vec<ConfigSecretMap>), WorkflowError>;
}

/// The two workflow backends.
#[derive(Debug, Clone)]
pub enum WorkflowExecutor {
    WorkflowCrd(ArgoWorkflowExecutor),
    InClusterJob(JobWorkflowExecutor),
}

impl WorkflowExecutor {
    pub fn for_type(executor_type: Option<WorkflowExecutorType>) -> Result<Self, WorkflowError> {
        match executor_type {
            Some(WorkflowExecutorType::Awf) => Ok(Self::WorkflowCrd(ArgoWorkflowExecutor)),
            Some(WorkflowExecutorType::System) => Ok(Self::InClusterJob(JobWorkflowExecutor)),
            None => {
                tracing::warn!("workflow executor not found");
                Err(WorkflowError::ExecutorNotFound)
            }
        }
    }

    pub async fn execute(
        &self,
        client: Client,
        template: &WorkflowTemplate,
    ) -> Result<SubmittedWorkflow, WorkflowError> {
        match self {
            Self::WorkflowCrd(executor) => {
                let created = executor.execute(client, template).await?;
                SubmittedWorkflow::from_workflow(created)
            }
            Self::InClusterJob(executor) => {
                let created = executor.execute(client, template).await?;
                SubmittedWorkflow::from_job(created)
            }
        }
    }

    pub async fn get(&self, client: Client, name: &str, namespace: &str) -> Result<WorkflowObject, WorkflowError> {
        match self {
            Self::WorkflowCrd(executor) => executor
                .get(client, name, namespace)
                .await
                .map(|wf| WorkflowObject::Crd(Box::new(wf))),
            Self::InClusterJob(executor) => executor
                .get(client, name, namespace)
                .await
                .map(|job| WorkflowObject::Job(Box::new(job))),
        }
    }

    pub async fn terminate(&self, client: Client, name: &str, namespace: &str) -> Result<(), WorkflowError> {
        match self {
            Self::WorkflowCrd(executor) => executor.terminate(client, name, namespace).await,
            Self::InClusterJob(executor) => executor.terminate(client, name, namespace).await,
        }
    }
}

/// Object created by an executor, kept as JSON so callers can read the
/// generated name without depending on the backend type.
#[derive(Debug, Clone)]
pub struct SubmittedWorkflow {
    pub name: String,
    pub namespace: String,
    pub manifest: serde_json::Value,
}

impl SubmittedWorkflow {
    fn from_workflow(workflow: Workflow) -> Result<Self, WorkflowError> {
        Ok(Self {
            name: workflow.metadata.name.clone().ok_or(WorkflowError::MissingName)?,
            namespace: workflow.metadata.namespace.clone().unwrap_or_default(),
            manifest: serde_json::to_value(&workflow)?,
        })
    }

    fn from_job(job: Job) -> Result<Self, WorkflowError> {
        Ok(Self {
            name: job.metadata.name.clone().ok_or(WorkflowError::MissingName)?,
            namespace: job.metadata.namespace.clone().unwrap_or_default(),
            manifest: serde_json::to_value(&job)?,
        })
    }
}

#[derive(Debug, Clone)]
pub enum WorkflowObject {
    Crd(Box<Workflow>),
    Job(Box<Job>),
}

impl WorkflowObject {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Crd(wf) => wf.metadata.name.as_deref(),
            Self::Job(job) => job.metadata.name.as_deref(),
        }
    }
}

/// Builds workflow templates from requests and hands them to an executor.
pub struct WorkflowSubmitter {
    config: Arc<CiCdConfig>,
    cm_cs: Arc<dyn CmCsSource>,
}

impl WorkflowSubmitter {
    pub fn new(config: Arc<CiCdConfig>, cm_cs: Arc<dyn CmCsSource>) -> Self {
        Self { config, cm_cs }
    }

    pub async fn submit(&self, request: &mut WorkflowRequest) -> Result<SubmittedWorkflow, WorkflowError> {
        let template = self.build_template(request).await?;
        let executor = WorkflowExecutor::for_type(request.workflow_executor)?;
        let client = client_for(&template.cluster).await?;
        executor.execute(client, &template).await
    }

    pub async fn build_template(&self, request: &mut WorkflowRequest) -> Result<WorkflowTemplate, WorkflowError> {
        let config = self.config.as_ref();
        request.prepare(config);
        if let Some(pvc) = pvc_claim(request) {
            request.is_pvc_mounted = true;
            request.ignore_docker_cache_push = true;
            request.ignore_docker_cache_pull = true;
            tracing::debug!(pipeline_id = request.pipeline_id, pvc = %pvc, "mounting pvc for build cache");
        }

        let globals = if request.is_ext_run {
            Vec::new()
        } else {
            self.cm_cs.global_cm_cs(request.pipeline_type.event_type()).await?
        };
        let (app_config_maps, app_secrets) = self
            .cm_cs
            .app_cm_cs(request.app_id, request.environment_id, request.is_job())
            .await?;

        compose_template(request, config, globals, app_config_maps, app_secrets)
    }

    pub async fn get_workflow(
        &self,
        executor_type: Option<WorkflowExecutorType>,
        name: &str,
        namespace: &str,
        routing: &ClusterRouting,
    ) -> Result<WorkflowObject, WorkflowError> {
        let executor = WorkflowExecutor::for_type(executor_type.or(Some(WorkflowExecutorType::Awf)))?;
        let client = client_for(routing).await?;
        executor.get(client, name, namespace).await
    }

    /// Terminates through the chosen executor; without one the run is
    /// treated as a Workflow resource.
    pub async fn terminate(
        &self,
        executor_type: Option<WorkflowExecutorType>,
        name: &str,
        namespace: &str,
        routing: &ClusterRouting,
    ) -> Result<(), WorkflowError> {
        tracing::debug!(name, namespace, "terminating workflow");
        let executor = WorkflowExecutor::for_type(executor_type.or(Some(WorkflowExecutorType::Awf)))?;
        let client = client_for(routing).await?;
        executor.terminate(client, name, namespace).await
    }
}

/// Pure composition of a prepared request into a template.
pub fn compose_template(
    request: &WorkflowRequest,
    config: &CiCdConfig,
    globals: Vec<GlobalCmCs>,
    app_config_maps: Vec<ConfigSecretMap>,
    app_secrets: Vec<ConfigSecretMap>,
) -> Result<WorkflowTemplate, WorkflowError> {
    let event_json = request.to_event_json()?;
    let (config_maps, secrets) = assemble_cm_cs(request, config, globals, app_config_maps, app_secrets);

    let mut template = WorkflowTemplate {
        workflow_id: request.workflow_id,
        workflow_name_prefix: request.workflow_name_prefix.clone(),
        workflow_type: request.pipeline_type,
        namespace: request.namespace.clone(),
        workflow_request_json: event_json.clone(),
        ttl_seconds: config.build_log_ttl_value_in_secs,
        active_deadline_seconds: request.active_deadline_seconds,
        ref_plugins: request.ref_plugins.clone(),
        volumes: volumes_for_cm_cs(&config_maps, &secrets),
        ..Default::default()
    };
    if !request.pipeline_type.is_build() {
        template.workflow_runner_id = request.workflow_runner_id;
        template.pre_post_deploy_steps = request.pre_post_deploy_steps.clone();
    }

    apply_node_constraints(&mut template, request, config);
    template.archive_logs = request.blob_storage_configured && !request.in_app_logging_enabled;

    if let Some(pvc) = pvc_claim(request) {
        template.volumes.push(pvc_volume(&pvc));
    }
    template.containers = vec![main_container(request, config, &event_json, &config_maps, &secrets)];
    template.config_maps = config_maps;
    template.secrets = secrets;

    template.blob_storage_configured = request.blob_storage_configured
        && (request.blob_storage_allowed(config) || !request.is_ext_run);
    template.blob_storage_s3_config = request.blob_storage_s3_config.clone();
    template.gcp_blob_config = request.gcp_blob_config.clone();
    template.azure_blob_config = request.azure_blob_config.clone();
    template.cloud_storage_key = request.blob_storage_logs_key.clone();

    if request.pipeline_type.is_build() {
        if let Some(selector) = app_label_node_selector(request) {
            template.node_selector = selector;
        }
    } else {
        template.wf_controller_instance_id = config.wf_controller_instance_id.clone();
        template.termination_grace_period_secs = Some(config.termination_grace_period_secs);
    }

    template.cluster = match (&request.env, request.is_ext_run) {
        (Some(env), true) => ClusterRouting::External(env.cluster.clone()),
        _ => ClusterRouting::InCluster,
    };
    Ok(template)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        job::{build_job, owned_cm_cs},
        request::{CmCsUsage, WorkflowPipelineType},
    };

    #[derive(Default)]
    struct StaticCmCs {
        config_maps: Vec<ConfigSecretMap>,
        calls: Mutex<Vec<(i64, i64, bool)>>,
    }

    #[async_trait]
    impl CmCsSource for StaticCmCs {
        async fn global_cm_cs(&self, _event_type: &str) -> Result<Vec<GlobalCmCs>, WorkflowError> {
            Ok(Vec::new())
        }

        async fn app_cm_cs(
            &self,
            app_id: i64,
            environment_id: i64,
            is_job: bool,
        ) -> Result<(Vec<ConfigSecretMap>, Vec<ConfigSecretMap>), WorkflowError> {
            self.calls.lock().unwrap().push((app_id, environment_id, is_job));
            Ok((self.config_maps.clone(), Vec::new()))
        }
    }

    fn env_cm(name: &str, external: bool) -> ConfigSecretMap {
        ConfigSecretMap {
            name: name.to_string(),
            usage: CmCsUsage::Environment,
            external,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn job_ci_submission_isolates_internal_config_maps() {
        let source = Arc::new(StaticCmCs {
            config_maps: vec![env_cm("cfgA", false), env_cm("cfgX", true)],
            ..Default::default()
        });
        let submitter = WorkflowSubmitter::new(Arc::new(CiCdConfig::default()), source.clone());
        let mut request = WorkflowRequest {
            pipeline_type: WorkflowPipelineType::Job,
            app_id: 4,
            workflow_id: 100,
            workflow_name_prefix: "100-job".to_string(),
            workflow_executor: Some(WorkflowExecutorType::System),
            ..Default::default()
        };

        let template = submitter.build_template(&mut request).await.unwrap();

        let names: Vec<_> = template.config_maps.iter().map(|cm| cm.name.as_str()).collect();
        assert_eq!(names, vec!["cfgA-100-ci", "cfgX"]);
        assert!(!template.archive_logs);
        assert_eq!(source.calls.lock().unwrap()[0], (4, 0, true));

        let container = template.main_container().unwrap();
        assert_eq!(container.name, "main");
        let env_from: Vec<_> = container
            .env_from
            .as_ref()
            .unwrap()
            .iter()
            .filter_map(|source| source.config_map_ref.as_ref().map(|r| r.name.as_str()))
            .collect();
        assert_eq!(env_from, vec!["cfgA-100-ci", "cfgX"]);

        let mut job = build_job(&template);
        job.metadata.name = Some("100-job-x1".to_string());
        let (owned, _) = owned_cm_cs(&template, &job).unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].metadata.name.as_deref(), Some("cfgA-100-ci"));
        assert_eq!(owned[0].metadata.owner_references.as_ref().unwrap()[0].kind, "Job");
    }

    #[tokio::test]
    async fn event_env_carries_serialized_request() {
        let submitter = WorkflowSubmitter::new(
            Arc::new(CiCdConfig::default()),
            Arc::new(StaticCmCs::default()),
        );
        let mut request = WorkflowRequest {
            pipeline_type: WorkflowPipelineType::Ci,
            pipeline_id: 11,
            ci_image: "runner:1".to_string(),
            ..Default::default()
        };
        let template = submitter.build_template(&mut request).await.unwrap();
        let container = template.main_container().unwrap();
        assert_eq!(container.image.as_deref(), Some("runner:1"));
        assert_eq!(container.security_context.as_ref().unwrap().privileged, Some(true));

        let env = container.env.as_ref().unwrap();
        let names: Vec<_> = env.iter().map(|var| var.name.as_str()).collect();
        assert_eq!(names, vec!["IMAGE_SCANNER_ENDPOINT", "CI_CD_EVENT", "IN_APP_LOGGING"]);
        let event: serde_json::Value =
            serde_json::from_str(env[1].value.as_deref().unwrap()).unwrap();
        assert_eq!(event["type"], "CI");
        assert_eq!(event["commonWorkflowRequest"]["pipelineId"], 11);
    }

    #[test]
    fn cd_template_carries_controller_instance_and_grace_period() {
        let request = WorkflowRequest {
            pipeline_type: WorkflowPipelineType::Cd,
            workflow_runner_id: 9,
            ..Default::default()
        };
        let template =
            compose_template(&request, &CiCdConfig::default(), vec![], vec![], vec![]).unwrap();
        assert_eq!(template.wf_controller_instance_id, "devtron-runner");
        assert_eq!(template.termination_grace_period_secs, Some(180));
        assert_eq!(template.workflow_runner_id, 9);
        assert!(template.main_container().unwrap().ports.is_none());
    }

    #[test]
    fn missing_executor_type_is_rejected() {
        assert!(matches!(
            WorkflowExecutor::for_type(None),
            Err(WorkflowError::ExecutorNotFound)
        ));
    }
}
