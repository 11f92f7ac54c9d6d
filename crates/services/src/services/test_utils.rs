//! Recording fakes of the outbound collaborators.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use db::{
    DBService, DatabaseConnection,
    entities::{cd_pipeline, ci_pipeline, environment},
    models::{
        Audit,
        app_workflow::{AppWorkflow, NewMapping},
        cd_pipeline::{CdPipeline, NewCdPipeline},
        environment::{Environment, NewCluster},
    },
    types::{AppType, CmCsNames, DeploymentAppType, SourceType, TriggerType, WorkflowNodeType},
};

use super::{
    clients::{
        AppIdentifier, ClientError, Collaborators, ContainerRegistry, DeployArtifact,
        DeploymentTrigger, GitOpsClient, GitOpsRepoService, GitOpsRepository, GitSensorClient,
        HelmClient, HelmDeleteResponse, RbacAction, RbacEnforcer, ScopedConfigService,
        SensorMaterial, SensorPipelineMaterial, TriggerRequest,
    },
    material::MaterialRegistrar,
    orchestrator::{
        CiConfigRequest, CiMaterialRequest, CiPipelineRequest, CreateAppRequest,
        CreateMaterialsRequest, MaterialRequest, PipelineOrchestrator, SourceRequest,
    },
    outbox::OutboxWorker,
};

#[derive(Default)]
pub struct RecordingSensor {
    failing: AtomicBool,
    added: Mutex<Vec<Vec<SensorMaterial>>>,
    updated: Mutex<Vec<SensorMaterial>>,
    saved: Mutex<Vec<Vec<SensorPipelineMaterial>>>,
}

impl RecordingSensor {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn added(&self) -> Vec<Vec<SensorMaterial>> {
        self.added.lock().unwrap().clone()
    }

    pub fn updated(&self) -> Vec<SensorMaterial> {
        self.updated.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<Vec<SensorPipelineMaterial>> {
        self.saved.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable("git sensor unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GitSensorClient for RecordingSensor {
    async fn add_repo(&self, materials: &[SensorMaterial]) -> Result<(), ClientError> {
        self.check()?;
        self.added.lock().unwrap().push(materials.to_vec());
        Ok(())
    }

    async fn update_repo(&self, material: &SensorMaterial) -> Result<(), ClientError> {
        self.check()?;
        self.updated.lock().unwrap().push(material.clone());
        Ok(())
    }

    async fn save_pipeline_material(
        &self,
        materials: &[SensorPipelineMaterial],
    ) -> Result<(), ClientError> {
        self.check()?;
        self.saved.lock().unwrap().push(materials.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeGitOps {
    missing: Mutex<HashSet<String>>,
    delete_error: Mutex<Option<ClientError>>,
    registration_error: Mutex<Option<String>>,
    deleted: Mutex<Vec<(String, bool)>>,
    registered: Mutex<Vec<String>>,
    watched_pipeline: Mutex<Option<(DatabaseConnection, i64)>>,
    watched_deleted: Mutex<Vec<bool>>,
}

impl FakeGitOps {
    /// Each delete call records whether pipeline `id` was already marked
    /// deleted at that moment.
    pub fn watch_pipeline(&self, db: &DatabaseConnection, id: i64) {
        *self.watched_pipeline.lock().unwrap() = Some((db.clone(), id));
    }

    pub fn watched_deleted(&self) -> Vec<bool> {
        self.watched_deleted.lock().unwrap().clone()
    }

    pub fn mark_missing(&self, name: &str) {
        self.missing.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_delete(&self, err: ClientError) {
        *self.delete_error.lock().unwrap() = Some(err);
    }

    pub fn fail_registration(&self, message: &str) {
        *self.registration_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn deleted(&self) -> Vec<(String, bool)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn registered(&self) -> Vec<String> {
        self.registered.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitOpsClient for FakeGitOps {
    async fn get_application(&self, name: &str) -> Result<(), ClientError> {
        if self.missing.lock().unwrap().contains(name) {
            return Err(ClientError::NotFound(format!("application {name} not found")));
        }
        Ok(())
    }

    async fn delete_application(&self, name: &str, cascade: bool) -> Result<(), ClientError> {
        let watched = self.watched_pipeline.lock().unwrap().clone();
        if let Some((db, id)) = watched {
            let pipeline = CdPipeline::find_by_id(&db, id)
                .await
                .map_err(|err| ClientError::Unavailable(err.to_string()))?;
            self.watched_deleted.lock().unwrap().push(pipeline.deleted);
        }
        if let Some(err) = self.delete_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.deleted.lock().unwrap().push((name.to_string(), cascade));
        self.missing.lock().unwrap().insert(name.to_string());
        Ok(())
    }

    async fn register_repository(&self, repo_url: &str) -> Result<(), ClientError> {
        if let Some(message) = self.registration_error.lock().unwrap().clone() {
            return Err(ClientError::Rejected(message));
        }
        self.registered.lock().unwrap().push(repo_url.to_string());
        Ok(())
    }
}

pub struct FakeGitOpsRepos {
    configured: AtomicBool,
    created: Mutex<Vec<String>>,
}

impl Default for FakeGitOpsRepos {
    fn default() -> Self {
        Self {
            configured: AtomicBool::new(true),
            created: Mutex::new(Vec::new()),
        }
    }
}

impl FakeGitOpsRepos {
    pub fn set_configured(&self, configured: bool) {
        self.configured.store(configured, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitOpsRepoService for FakeGitOpsRepos {
    async fn is_configured(&self) -> Result<bool, ClientError> {
        Ok(self.configured.load(Ordering::SeqCst))
    }

    async fn create_repository(
        &self,
        app_name: &str,
        _user_id: i64,
    ) -> Result<GitOpsRepository, ClientError> {
        self.created.lock().unwrap().push(app_name.to_string());
        Ok(GitOpsRepository {
            repo_url: format!("https://git.example.com/gitops/{app_name}.git"),
            chart_location: format!("{app_name}/chart"),
        })
    }
}

pub struct FakeHelm {
    missing: Mutex<HashSet<String>>,
    delete_result: Mutex<Result<Option<HelmDeleteResponse>, ClientError>>,
    deleted: Mutex<Vec<AppIdentifier>>,
}

impl Default for FakeHelm {
    fn default() -> Self {
        Self {
            missing: Mutex::new(HashSet::new()),
            delete_result: Mutex::new(Ok(Some(HelmDeleteResponse { success: true }))),
            deleted: Mutex::new(Vec::new()),
        }
    }
}

impl FakeHelm {
    pub fn mark_missing(&self, release_name: &str) {
        self.missing.lock().unwrap().insert(release_name.to_string());
    }

    pub fn respond_to_delete(&self, result: Result<Option<HelmDeleteResponse>, ClientError>) {
        *self.delete_result.lock().unwrap() = result;
    }

    pub fn deleted(&self) -> Vec<AppIdentifier> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl HelmClient for FakeHelm {
    async fn get_application_detail(&self, app: &AppIdentifier) -> Result<(), ClientError> {
        if self.missing.lock().unwrap().contains(&app.release_name) {
            return Err(ClientError::NotFound("release: not found".to_string()));
        }
        Ok(())
    }

    async fn delete_application(
        &self,
        app: &AppIdentifier,
    ) -> Result<Option<HelmDeleteResponse>, ClientError> {
        let result = self.delete_result.lock().unwrap().clone();
        if matches!(result, Ok(Some(HelmDeleteResponse { success: true }))) {
            self.deleted.lock().unwrap().push(app.clone());
            self.missing.lock().unwrap().insert(app.release_name.clone());
        }
        result
    }
}

#[derive(Default)]
pub struct RecordingRegistry {
    ensured: Mutex<Vec<(String, String)>>,
}

impl RecordingRegistry {
    pub fn ensured(&self) -> Vec<(String, String)> {
        self.ensured.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRegistry for RecordingRegistry {
    async fn ensure_repository(
        &self,
        registry_id: &str,
        repository: &str,
    ) -> Result<(), ClientError> {
        self.ensured
            .lock()
            .unwrap()
            .push((registry_id.to_string(), repository.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRbac {
    denied: Mutex<HashSet<(i64, &'static str)>>,
    revoked: Mutex<Vec<String>>,
}

impl FakeRbac {
    pub fn deny(&self, app_id: i64, action: RbacAction) {
        self.denied
            .lock()
            .unwrap()
            .insert((app_id, action_name(action)));
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

fn action_name(action: RbacAction) -> &'static str {
    match action {
        RbacAction::Update => "update",
        RbacAction::Trigger => "trigger",
    }
}

#[async_trait]
impl RbacEnforcer for FakeRbac {
    async fn is_allowed(&self, _user_id: i64, action: RbacAction, app_id: i64) -> bool {
        !self
            .denied
            .lock()
            .unwrap()
            .contains(&(app_id, action_name(action)))
    }

    async fn delete_app_roles(&self, app_name: &str) -> Result<(), ClientError> {
        self.revoked.lock().unwrap().push(app_name.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingScopedConfig {
    ensured: Mutex<Vec<(i64, i64)>>,
}

impl RecordingScopedConfig {
    pub fn ensured(&self) -> Vec<(i64, i64)> {
        self.ensured.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScopedConfigService for RecordingScopedConfig {
    async fn ensure_environment_scope(
        &self,
        app_id: i64,
        environment_id: i64,
        _user_id: i64,
    ) -> Result<(), ClientError> {
        let mut ensured = self.ensured.lock().unwrap();
        if ensured.contains(&(app_id, environment_id)) {
            return Err(ClientError::AlreadyExists("scope already exists".to_string()));
        }
        ensured.push((app_id, environment_id));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDeployments {
    artifacts: Mutex<HashMap<i64, DeployArtifact>>,
    triggered: Mutex<Vec<TriggerRequest>>,
}

impl FakeDeployments {
    pub fn set_artifact(&self, pipeline_id: i64, ci_artifact_id: i64, status: &str) {
        self.artifacts.lock().unwrap().insert(
            pipeline_id,
            DeployArtifact {
                ci_artifact_id,
                status: status.to_string(),
            },
        );
    }

    pub fn triggered(&self) -> Vec<TriggerRequest> {
        self.triggered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeploymentTrigger for FakeDeployments {
    async fn latest_deploy_artifact(
        &self,
        pipeline_id: i64,
    ) -> Result<Option<DeployArtifact>, ClientError> {
        Ok(self.artifacts.lock().unwrap().get(&pipeline_id).cloned())
    }

    async fn trigger_bulk(&self, requests: Vec<TriggerRequest>) -> Result<(), ClientError> {
        self.triggered.lock().unwrap().extend(requests);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct Fakes {
    pub sensor: Arc<RecordingSensor>,
    pub gitops: Arc<FakeGitOps>,
    pub gitops_repos: Arc<FakeGitOpsRepos>,
    pub helm: Arc<FakeHelm>,
    pub registry: Arc<RecordingRegistry>,
    pub rbac: Arc<FakeRbac>,
    pub scoped_config: Arc<RecordingScopedConfig>,
    pub deployments: Arc<FakeDeployments>,
}

impl Fakes {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            git_sensor: self.sensor.clone(),
            gitops: self.gitops.clone(),
            gitops_repos: self.gitops_repos.clone(),
            helm: self.helm.clone(),
            registry: self.registry.clone(),
            rbac: self.rbac.clone(),
            scoped_config: self.scoped_config.clone(),
            deployments: self.deployments.clone(),
        }
    }
}

/// In-memory database plus an orchestrator wired to fresh fakes.
pub async fn orchestrator() -> (PipelineOrchestrator, Fakes) {
    let db = DBService::from_connection(test_support::setup_db().await);
    let fakes = Fakes::default();
    let registrar = MaterialRegistrar::new(OutboxWorker::new(db.clone(), fakes.sensor.clone()));
    let orchestrator = PipelineOrchestrator::new(
        db,
        fakes.collaborators(),
        registrar,
        Arc::new(config::CiCdConfig::default()),
    );
    (orchestrator, fakes)
}

pub fn fixed_branch(value: &str) -> SourceRequest {
    SourceRequest {
        source_type: SourceType::BranchFixed,
        value: value.to_string(),
        regex: String::new(),
    }
}

pub fn ci_pipeline_request(
    name: &str,
    git_material_id: i64,
    source: SourceRequest,
) -> CiPipelineRequest {
    CiPipelineRequest {
        name: name.to_string(),
        is_manual: true,
        ci_materials: vec![CiMaterialRequest {
            id: 0,
            git_material_id,
            source,
        }],
        ..Default::default()
    }
}

/// Creates an app with a single material `https://g/x/y.git` from provider 7.
/// Returns the app id and the material id.
pub async fn seed_app(orchestrator: &PipelineOrchestrator, name: &str) -> (i64, i64) {
    let app = orchestrator
        .create_app(
            CreateAppRequest {
                app_name: name.to_string(),
                app_type: AppType::DevtronApp,
                team_id: 1,
                description: None,
                labels: Vec::new(),
            },
            1,
        )
        .await
        .unwrap();
    let materials = orchestrator
        .create_materials(
            CreateMaterialsRequest {
                app_id: app.id,
                materials: vec![MaterialRequest {
                    id: 0,
                    url: "https://g/x/y.git".to_string(),
                    git_provider_id: 7,
                    checkout_path: String::new(),
                    fetch_submodules: false,
                    filter_pattern: Vec::new(),
                }],
            },
            1,
        )
        .await
        .unwrap();
    (app.id, materials[0].id)
}

pub async fn seed_ci_pipeline(
    orchestrator: &PipelineOrchestrator,
    app_id: i64,
    git_material_id: i64,
    source: SourceRequest,
) -> ci_pipeline::Model {
    orchestrator
        .create_ci_pipelines(
            CiConfigRequest {
                app_id,
                app_workflow_id: 0,
                ci_pipelines: vec![ci_pipeline_request("build", git_material_id, source)],
            },
            1,
        )
        .await
        .unwrap()
        .remove(0)
}

/// Environment `{name}` in namespace `{name}-ns` on a fresh reachable cluster.
pub async fn seed_environment(db: &DatabaseConnection, name: &str) -> environment::Model {
    let audit = Audit::now(1);
    let cluster = Environment::create_cluster(
        db,
        NewCluster {
            cluster_name: format!("{name}-cluster"),
            server_url: "https://kubernetes.default.svc".to_string(),
            bearer_token: String::new(),
        },
        audit,
    )
    .await
    .unwrap();
    Environment::create(db, name, cluster.id, &format!("{name}-ns"), audit)
        .await
        .unwrap()
}

/// CD pipeline row plus its workflow mapping under `parent`.
pub async fn seed_cd_pipeline(
    db: &DatabaseConnection,
    app_id: i64,
    environment_id: i64,
    ci_pipeline_id: i64,
    parent: (WorkflowNodeType, i64),
    deployment_app_type: DeploymentAppType,
) -> cd_pipeline::Model {
    let audit = Audit::now(1);
    let pipeline = CdPipeline::create(
        db,
        NewCdPipeline {
            app_id,
            environment_id,
            name: format!("cd-{app_id}-{environment_id}"),
            ci_pipeline_id,
            trigger_type: TriggerType::Automatic,
            pre_stage_config: String::new(),
            post_stage_config: String::new(),
            pre_trigger_type: TriggerType::Manual,
            post_trigger_type: TriggerType::Manual,
            pre_stage_cm_cs_names: CmCsNames::default(),
            post_stage_cm_cs_names: CmCsNames::default(),
            run_pre_stage_in_env: false,
            run_post_stage_in_env: false,
            deployment_app_type,
            deployment_app_name: format!("app{app_id}-env{environment_id}"),
        },
        audit,
    )
    .await
    .unwrap();
    let workflow = AppWorkflow::create(db, app_id, &format!("wf-{}", pipeline.id), audit)
        .await
        .unwrap();
    AppWorkflow::create_mapping(
        db,
        NewMapping {
            app_workflow_id: workflow.id,
            parent_id: parent.1,
            parent_type: Some(parent.0),
            component_id: pipeline.id,
            node_type: WorkflowNodeType::CdPipeline,
        },
        audit,
    )
    .await
    .unwrap();
    pipeline
}
