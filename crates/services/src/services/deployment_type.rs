//! Moves the CD pipelines of an environment between the GitOps and Helm
//! backends.
//!
//! A migration removes the object on the old backend first and only then
//! points the pipeline at the new one with `deployment_app_created = false`,
//! so the next deployment recreates it. Pipelines whose teardown fails stay
//! on the old backend. Each batch is processed sequentially and reported as
//! two lists.

use std::collections::HashMap;

use db::{
    DBService, TransactionTrait,
    entities::{cd_pipeline, cluster, environment},
    models::{
        Audit,
        app::App,
        app_status::{AppStatus, STATUS_PROGRESSING},
        cd_pipeline::{AppScope, CdPipeline},
        environment::Environment,
    },
    types::DeploymentAppType,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{
    clients::{AppIdentifier, ClientError, Collaborators, TriggerRequest},
    error::Result,
    gitops::{self, GITOPS_NOT_CONFIGURED},
    orchestrator::{DeleteAction, HELM_DELETE_UNSUCCESSFUL},
};

const MISSING_NAMES: &str = "could not fetch app name or environment name";
const UNHEALTHY: &str = "unable to fetch app status or app status is progressing";
const NOT_YET_DELETED: &str = "App Not Yet Deleted.";

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTypeChangeRequest {
    pub environment_id: i64,
    pub desired_deployment_type: DeploymentAppType,
    #[serde(default)]
    pub exclude_apps: Vec<i64>,
    #[serde(default)]
    pub include_apps: Vec<i64>,
    #[serde(default)]
    pub auto_trigger_deployment: bool,
    /// How the old backend's object is removed. An unreachable cluster
    /// only stops a `Cascade` change.
    #[serde(default)]
    pub delete_action: DeleteAction,
}

impl DeploymentTypeChangeRequest {
    fn scope(&self) -> AppScope {
        AppScope {
            exclude_app_ids: self.exclude_apps.clone(),
            include_app_ids: self.include_apps.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDeploymentTypeChangeRequest {
    pub pipeline_ids: Vec<i64>,
    pub desired_deployment_type: DeploymentAppType,
    #[serde(default)]
    pub delete_action: DeleteAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub enum DeploymentChangeState {
    Success,
    Failed,
    Initiated,
    NotYetDeleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentChangeStatus {
    pub pipeline_id: i64,
    pub app_id: i64,
    pub app_name: String,
    pub env_id: i64,
    pub env_name: String,
    pub error: String,
    pub status: DeploymentChangeState,
}

impl DeploymentChangeStatus {
    fn fail(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self.status = DeploymentChangeState::Failed;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentAppTypeChangeResponse {
    /// Zero when the batch spans several environments.
    pub environment_id: i64,
    pub desired_deployment_type: DeploymentAppType,
    pub successful_pipelines: Vec<DeploymentChangeStatus>,
    pub failed_pipelines: Vec<DeploymentChangeStatus>,
}

impl DeploymentAppTypeChangeResponse {
    fn empty(environment_id: i64, desired_deployment_type: DeploymentAppType) -> Self {
        Self {
            environment_id,
            desired_deployment_type,
            successful_pipelines: Vec::new(),
            failed_pipelines: Vec::new(),
        }
    }
}

fn release_identifier(
    pipeline: &cd_pipeline::Model,
    env: &environment::Model,
) -> AppIdentifier {
    AppIdentifier {
        cluster_id: env.cluster_id,
        release_name: pipeline.deployment_app_name.clone(),
        namespace: env.namespace.clone(),
    }
}

/// Only a cascading change needs the cluster to be reachable.
fn blocked_by_cluster(cluster: &cluster::Model, action: DeleteAction) -> bool {
    !cluster.error_in_connecting.is_empty() && action == DeleteAction::Cascade
}

fn ids(statuses: &[DeploymentChangeStatus]) -> Vec<i64> {
    statuses.iter().map(|s| s.pipeline_id).collect()
}

#[derive(Clone)]
pub struct DeploymentTypeMigrator {
    db: DBService,
    clients: Collaborators,
}

impl DeploymentTypeMigrator {
    pub fn new(db: DBService, clients: Collaborators) -> Self {
        Self { db, clients }
    }

    async fn status_for(
        &self,
        pipeline: &cd_pipeline::Model,
        env: &environment::Model,
    ) -> Result<DeploymentChangeStatus> {
        let app_name = App::find_by_id(&self.db.pool, pipeline.app_id)
            .await?
            .map(|app| app.name)
            .unwrap_or_default();
        Ok(DeploymentChangeStatus {
            pipeline_id: pipeline.id,
            app_id: pipeline.app_id,
            app_name,
            env_id: env.id,
            env_name: env.name.clone(),
            error: String::new(),
            status: DeploymentChangeState::Success,
        })
    }

    /// Rejects GitOps apps that are mid-rollout. A missing status row counts
    /// as healthy.
    async fn is_healthy(&self, pipeline: &cd_pipeline::Model) -> bool {
        match AppStatus::find(&self.db.pool, pipeline.app_id, pipeline.environment_id).await {
            Ok(None) => true,
            Ok(Some(row)) => row.status != STATUS_PROGRESSING,
            Err(err) => {
                tracing::warn!(cd_pipeline_id = pipeline.id, error = %err, "app status lookup failed");
                false
            }
        }
    }

    /// Removes the object the pipeline currently owns on its backend. Under
    /// `Force` a failed removal call is logged and treated as done; the
    /// health and GitOps repository checks still apply.
    async fn delete_external(
        &self,
        pipeline: &cd_pipeline::Model,
        env: &environment::Model,
        app_name: &str,
        action: DeleteAction,
        audit: Audit,
    ) -> std::result::Result<(), String> {
        let removed = match pipeline.deployment_app_type {
            DeploymentAppType::GitOpsManaged => {
                if !self.is_healthy(pipeline).await {
                    return Err(UNHEALTHY.to_string());
                }
                match self
                    .clients
                    .gitops
                    .delete_application(
                        &pipeline.deployment_app_name,
                        action != DeleteAction::NonCascade,
                    )
                    .await
                {
                    Ok(()) => Ok(()),
                    Err(err) if err.is_not_found() => Ok(()),
                    Err(err) => Err(format!("error deleting app with error: {err}")),
                }
            }
            DeploymentAppType::HelmManaged => {
                if !gitops::is_configured(&self.clients).await {
                    return Err(GITOPS_NOT_CONFIGURED.to_string());
                }
                gitops::provision_repository(
                    &self.db.pool,
                    &self.clients,
                    pipeline.app_id,
                    app_name,
                    audit,
                )
                .await
                .map_err(|err| format!("failed to register app on ACD with error: {err}"))?;
                match self
                    .clients
                    .helm
                    .delete_application(&release_identifier(pipeline, env))
                    .await
                {
                    Ok(Some(response)) if response.success => Ok(()),
                    Ok(_) => Err(HELM_DELETE_UNSUCCESSFUL.to_string()),
                    Err(err) => Err(format!("error deleting app with error: {err}")),
                }
            }
        };
        match removed {
            Err(message) if action == DeleteAction::Force => {
                tracing::warn!(
                    cd_pipeline_id = pipeline.id,
                    error = %message,
                    "ignoring deployment app teardown error on force change"
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Tears down each pipeline's external object and splits the batch into
    /// successes and failures.
    async fn delete_deployment_apps(
        &self,
        pipelines: &[cd_pipeline::Model],
        env: &environment::Model,
        cluster: &cluster::Model,
        action: DeleteAction,
        audit: Audit,
    ) -> Result<(Vec<DeploymentChangeStatus>, Vec<DeploymentChangeStatus>)> {
        let mut successful = Vec::new();
        let mut failed = Vec::new();
        for pipeline in pipelines {
            let status = self.status_for(pipeline, env).await?;
            if blocked_by_cluster(cluster, action) {
                failed.push(status.fail(format!(
                    "cluster {} is not reachable: {}",
                    cluster.cluster_name, cluster.error_in_connecting
                )));
                continue;
            }
            if status.app_name.is_empty() || status.env_name.is_empty() {
                failed.push(status.fail(MISSING_NAMES));
                continue;
            }
            let app_name = status.app_name.clone();
            match self
                .delete_external(pipeline, env, &app_name, action, audit)
                .await
            {
                Ok(()) => successful.push(status),
                Err(message) => {
                    tracing::warn!(
                        cd_pipeline_id = pipeline.id,
                        error = %message,
                        "deployment app teardown failed"
                    );
                    failed.push(status.fail(message));
                }
            }
        }
        Ok((successful, failed))
    }

    /// Resolves the latest deployed artifact of every status and fires one
    /// bulk trigger in the background. Triggered entries become `Initiated`.
    async fn redeploy(&self, statuses: &mut [DeploymentChangeStatus], user_id: i64) {
        let mut requests = Vec::new();
        for status in statuses.iter_mut() {
            match self
                .clients
                .deployments
                .latest_deploy_artifact(status.pipeline_id)
                .await
            {
                Ok(Some(artifact)) if artifact.ci_artifact_id != 0 && !artifact.status.is_empty() => {
                    requests.push(TriggerRequest {
                        pipeline_id: status.pipeline_id,
                        ci_artifact_id: artifact.ci_artifact_id,
                        user_id,
                    });
                    status.status = DeploymentChangeState::Initiated;
                }
                Ok(_) => {
                    tracing::debug!(cd_pipeline_id = status.pipeline_id, "no deployed artifact");
                }
                Err(err) => {
                    tracing::warn!(
                        cd_pipeline_id = status.pipeline_id,
                        error = %err,
                        "failed to fetch latest deployed artifact"
                    );
                }
            }
        }
        if requests.is_empty() {
            return;
        }
        let deployments = self.clients.deployments.clone();
        tokio::spawn(async move {
            let count = requests.len();
            if let Err(err) = deployments.trigger_bulk(requests).await {
                tracing::warn!(count, error = %err, "bulk redeploy failed");
            }
        });
    }

    pub async fn change_deployment_type(
        &self,
        request: DeploymentTypeChangeRequest,
        user_id: i64,
    ) -> Result<DeploymentAppTypeChangeResponse> {
        let audit = Audit::now(user_id);
        let desired = request.desired_deployment_type.clone();
        let delete_type = desired.opposite();
        let mut response = DeploymentAppTypeChangeResponse::empty(request.environment_id, desired.clone());

        let pipelines = CdPipeline::find_active_by_env_and_deployment_type(
            &self.db.pool,
            request.environment_id,
            delete_type.clone(),
            &request.scope(),
        )
        .await?;
        if pipelines.is_empty() {
            return Ok(response);
        }

        let (env, cluster) =
            Environment::find_with_cluster(&self.db.pool, request.environment_id).await?;
        let (mut successful, failed) = self
            .delete_deployment_apps(&pipelines, &env, &cluster, request.delete_action, audit)
            .await?;
        if blocked_by_cluster(&cluster, request.delete_action) {
            response.failed_pipelines = failed;
            return Ok(response);
        }

        let tx = self.db.pool.begin().await?;
        CdPipeline::update_deployment_app_type(&tx, &ids(&successful), desired.clone(), false, audit)
            .await?;
        CdPipeline::update_deployment_app_type(&tx, &ids(&failed), delete_type, true, audit).await?;
        tx.commit().await?;

        if request.auto_trigger_deployment {
            self.redeploy(&mut successful, user_id).await;
        }
        tracing::info!(
            environment_id = request.environment_id,
            %desired,
            successful = successful.len(),
            failed = failed.len(),
            "deployment type change finished"
        );
        response.successful_pipelines = successful;
        response.failed_pipelines = failed;
        Ok(response)
    }

    /// Per-pipeline migration: flips the listed pipelines first, tears down
    /// their old objects, then reverts the ones whose teardown failed.
    pub async fn change_pipeline_deployment_type(
        &self,
        request: PipelineDeploymentTypeChangeRequest,
        user_id: i64,
    ) -> Result<DeploymentAppTypeChangeResponse> {
        let audit = Audit::now(user_id);
        let desired = request.desired_deployment_type.clone();
        let delete_type = desired.opposite();

        let pipelines: Vec<cd_pipeline::Model> =
            CdPipeline::find_active_by_ids(&self.db.pool, &request.pipeline_ids)
                .await?
                .into_iter()
                .filter(|p| p.deployment_app_type == delete_type)
                .collect();
        let environment_id = match pipelines.first() {
            Some(first) if pipelines.iter().all(|p| p.environment_id == first.environment_id) => {
                first.environment_id
            }
            _ => 0,
        };
        let mut response = DeploymentAppTypeChangeResponse::empty(environment_id, desired.clone());
        if pipelines.is_empty() {
            return Ok(response);
        }

        let flipped: Vec<i64> = pipelines.iter().map(|p| p.id).collect();
        CdPipeline::update_deployment_app_type(&self.db.pool, &flipped, desired, false, audit)
            .await?;

        let mut by_env: HashMap<i64, Vec<cd_pipeline::Model>> = HashMap::new();
        for pipeline in pipelines {
            by_env.entry(pipeline.environment_id).or_default().push(pipeline);
        }
        let mut env_ids: Vec<i64> = by_env.keys().copied().collect();
        env_ids.sort_unstable();
        for env_id in env_ids {
            let batch = by_env.remove(&env_id).unwrap_or_default();
            let (env, cluster) = Environment::find_with_cluster(&self.db.pool, env_id).await?;
            let (successful, failed) = self
                .delete_deployment_apps(&batch, &env, &cluster, request.delete_action, audit)
                .await?;
            response.successful_pipelines.extend(successful);
            response.failed_pipelines.extend(failed);
        }

        CdPipeline::update_deployment_app_type(
            &self.db.pool,
            &ids(&response.failed_pipelines),
            delete_type,
            true,
            audit,
        )
        .await?;
        Ok(response)
    }

    /// Confirms the old backend no longer has the object, then redeploys the
    /// confirmed pipelines on the new one.
    pub async fn trigger_deployment_after_type_change(
        &self,
        request: DeploymentTypeChangeRequest,
        user_id: i64,
    ) -> Result<DeploymentAppTypeChangeResponse> {
        let audit = Audit::now(user_id);
        let desired = request.desired_deployment_type.clone();
        let old_backend = desired.opposite();
        let mut response = DeploymentAppTypeChangeResponse::empty(request.environment_id, desired.clone());

        let pipelines = CdPipeline::find_active_by_env_and_deployment_type(
            &self.db.pool,
            request.environment_id,
            desired,
            &request.scope(),
        )
        .await?;
        if pipelines.is_empty() {
            return Ok(response);
        }
        let (env, cluster) =
            Environment::find_with_cluster(&self.db.pool, request.environment_id).await?;

        let mut successful = Vec::new();
        for pipeline in &pipelines {
            let status = self.status_for(pipeline, &env).await?;
            if status.app_name.is_empty() || status.env_name.is_empty() {
                response.failed_pipelines.push(status.fail(MISSING_NAMES));
                continue;
            }
            let lookup = match old_backend {
                DeploymentAppType::GitOpsManaged => {
                    self.clients
                        .gitops
                        .get_application(&pipeline.deployment_app_name)
                        .await
                }
                DeploymentAppType::HelmManaged => {
                    self.clients
                        .helm
                        .get_application_detail(&release_identifier(pipeline, &env))
                        .await
                }
            };
            match lookup {
                Err(ClientError::NotFound(_)) => successful.push(status),
                Ok(()) => {
                    let mut status = status.fail(NOT_YET_DELETED);
                    status.status = DeploymentChangeState::NotYetDeleted;
                    response.failed_pipelines.push(status);
                }
                Err(err) => {
                    response
                        .failed_pipelines
                        .push(status.fail(format!("error fetching app with error: {err}")));
                }
            }
        }
        if !cluster.error_in_connecting.is_empty() {
            tracing::warn!(
                cluster = %cluster.cluster_name,
                "verifying deployment type change on an unreachable cluster"
            );
        }

        CdPipeline::set_deployment_app_created(&self.db.pool, &ids(&successful), false, audit)
            .await?;
        self.redeploy(&mut successful, user_id).await;
        response.successful_pipelines = successful;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use db::models::chart::Chart;

    use super::*;
    use crate::services::{
        clients::HelmDeleteResponse,
        orchestrator::PipelineOrchestrator,
        test_utils::{
            Fakes, fixed_branch, orchestrator, seed_app, seed_cd_pipeline, seed_ci_pipeline,
            seed_environment,
        },
    };
    use db::types::WorkflowNodeType;

    async fn app_on(
        orchestrator: &PipelineOrchestrator,
        env: &environment::Model,
        name: &str,
        deployment_type: DeploymentAppType,
    ) -> cd_pipeline::Model {
        let db = &orchestrator.db().pool;
        let (app_id, material_id) = seed_app(orchestrator, name).await;
        Chart::create(db, app_id, "reference-chart_4-18-0", Audit::now(1))
            .await
            .unwrap();
        let ci = seed_ci_pipeline(orchestrator, app_id, material_id, fixed_branch("main")).await;
        let cd = seed_cd_pipeline(
            db,
            app_id,
            env.id,
            ci.id,
            (WorkflowNodeType::CiPipeline, ci.id),
            deployment_type,
        )
        .await;
        CdPipeline::set_deployment_app_created(db, &[cd.id], true, Audit::now(1))
            .await
            .unwrap();
        cd
    }

    fn migrator(orchestrator: &PipelineOrchestrator, fakes: &Fakes) -> DeploymentTypeMigrator {
        DeploymentTypeMigrator::new(orchestrator.db().clone(), fakes.collaborators())
    }

    fn to_gitops(environment_id: i64, include_apps: Vec<i64>) -> DeploymentTypeChangeRequest {
        DeploymentTypeChangeRequest {
            environment_id,
            desired_deployment_type: DeploymentAppType::GitOpsManaged,
            exclude_apps: Vec::new(),
            include_apps,
            auto_trigger_deployment: true,
            delete_action: DeleteAction::Cascade,
        }
    }

    async fn wait_for_trigger(fakes: &Fakes) -> Vec<TriggerRequest> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let triggered = fakes.deployments.triggered();
                if !triggered.is_empty() {
                    return triggered;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn helm_to_gitops_migrates_only_helm_pipelines() {
        let (orchestrator, fakes) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let a = app_on(&orchestrator, &env, "a", DeploymentAppType::GitOpsManaged).await;
        let b = app_on(&orchestrator, &env, "b", DeploymentAppType::HelmManaged).await;
        fakes.deployments.set_artifact(b.id, 11, "Succeeded");

        let response = migrator(&orchestrator, &fakes)
            .change_deployment_type(to_gitops(env.id, vec![a.app_id, b.app_id]), 1)
            .await
            .unwrap();

        assert_eq!(response.successful_pipelines.len(), 1);
        assert!(response.failed_pipelines.is_empty());
        let status = &response.successful_pipelines[0];
        assert_eq!(status.pipeline_id, b.id);
        assert_eq!(status.status, DeploymentChangeState::Initiated);

        assert_eq!(fakes.helm.deleted()[0].release_name, b.deployment_app_name);
        assert_eq!(fakes.gitops_repos.created(), vec!["b".to_string()]);
        let stored = CdPipeline::find_by_id(db, b.id).await.unwrap();
        assert_eq!(stored.deployment_app_type, DeploymentAppType::GitOpsManaged);
        assert!(!stored.deployment_app_created);
        let untouched = CdPipeline::find_by_id(db, a.id).await.unwrap();
        assert!(untouched.deployment_app_created);

        let triggered = wait_for_trigger(&fakes).await;
        assert_eq!(
            triggered,
            vec![TriggerRequest {
                pipeline_id: b.id,
                ci_artifact_id: 11,
                user_id: 1,
            }]
        );
    }

    #[tokio::test]
    async fn failed_teardown_keeps_old_backend() {
        let (orchestrator, fakes) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let b = app_on(&orchestrator, &env, "b", DeploymentAppType::HelmManaged).await;
        fakes
            .helm
            .respond_to_delete(Ok(Some(HelmDeleteResponse { success: false })));

        let response = migrator(&orchestrator, &fakes)
            .change_deployment_type(to_gitops(env.id, Vec::new()), 1)
            .await
            .unwrap();
        assert!(response.successful_pipelines.is_empty());
        assert_eq!(response.failed_pipelines[0].error, HELM_DELETE_UNSUCCESSFUL);

        let stored = CdPipeline::find_by_id(db, b.id).await.unwrap();
        assert_eq!(stored.deployment_app_type, DeploymentAppType::HelmManaged);
        assert!(stored.deployment_app_created);
    }

    #[tokio::test]
    async fn gitops_backend_requires_configuration() {
        let (orchestrator, fakes) = orchestrator().await;
        fakes.gitops_repos.set_configured(false);
        let env = seed_environment(&orchestrator.db().pool, "prod").await;
        app_on(&orchestrator, &env, "b", DeploymentAppType::HelmManaged).await;

        let response = migrator(&orchestrator, &fakes)
            .change_deployment_type(to_gitops(env.id, Vec::new()), 1)
            .await
            .unwrap();
        assert_eq!(response.failed_pipelines[0].error, GITOPS_NOT_CONFIGURED);
        assert!(fakes.helm.deleted().is_empty());
    }

    #[tokio::test]
    async fn progressing_gitops_app_is_not_migrated() {
        let (orchestrator, fakes) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let healthy = app_on(&orchestrator, &env, "a", DeploymentAppType::GitOpsManaged).await;
        let busy = app_on(&orchestrator, &env, "b", DeploymentAppType::GitOpsManaged).await;
        AppStatus::upsert(db, busy.app_id, env.id, STATUS_PROGRESSING)
            .await
            .unwrap();

        let response = migrator(&orchestrator, &fakes)
            .change_deployment_type(
                DeploymentTypeChangeRequest {
                    environment_id: env.id,
                    desired_deployment_type: DeploymentAppType::HelmManaged,
                    exclude_apps: Vec::new(),
                    include_apps: Vec::new(),
                    auto_trigger_deployment: false,
                    delete_action: DeleteAction::Cascade,
                },
                1,
            )
            .await
            .unwrap();

        assert_eq!(response.successful_pipelines[0].pipeline_id, healthy.id);
        assert_eq!(response.failed_pipelines[0].pipeline_id, busy.id);
        assert_eq!(response.failed_pipelines[0].error, UNHEALTHY);
        assert_eq!(
            fakes.gitops.deleted(),
            vec![(healthy.deployment_app_name.clone(), true)]
        );
        assert_eq!(
            CdPipeline::find_by_id(db, healthy.id).await.unwrap().deployment_app_type,
            DeploymentAppType::HelmManaged
        );
    }

    #[tokio::test]
    async fn unreachable_cluster_fails_whole_batch() {
        let (orchestrator, fakes) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let b = app_on(&orchestrator, &env, "b", DeploymentAppType::HelmManaged).await;
        Environment::set_cluster_connection_error(db, env.cluster_id, "connection refused")
            .await
            .unwrap();

        let response = migrator(&orchestrator, &fakes)
            .change_deployment_type(to_gitops(env.id, Vec::new()), 1)
            .await
            .unwrap();
        assert_eq!(response.failed_pipelines.len(), 1);
        assert!(fakes.helm.deleted().is_empty());
        let stored = CdPipeline::find_by_id(db, b.id).await.unwrap();
        assert_eq!(stored.deployment_app_type, DeploymentAppType::HelmManaged);
    }

    #[tokio::test]
    async fn force_change_proceeds_on_unreachable_cluster() {
        let (orchestrator, fakes) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let b = app_on(&orchestrator, &env, "b", DeploymentAppType::HelmManaged).await;
        Environment::set_cluster_connection_error(db, env.cluster_id, "connection refused")
            .await
            .unwrap();
        fakes.helm.respond_to_delete(Err(ClientError::Unavailable(
            "dial tcp: connection refused".to_string(),
        )));

        let request = DeploymentTypeChangeRequest {
            auto_trigger_deployment: false,
            delete_action: DeleteAction::Force,
            ..to_gitops(env.id, Vec::new())
        };
        let response = migrator(&orchestrator, &fakes)
            .change_deployment_type(request, 1)
            .await
            .unwrap();
        assert!(response.failed_pipelines.is_empty());
        assert_eq!(ids(&response.successful_pipelines), vec![b.id]);

        let stored = CdPipeline::find_by_id(db, b.id).await.unwrap();
        assert_eq!(stored.deployment_app_type, DeploymentAppType::GitOpsManaged);
        assert!(!stored.deployment_app_created);
    }

    #[tokio::test]
    async fn non_cascade_change_proceeds_on_unreachable_cluster() {
        let (orchestrator, fakes) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let a = app_on(&orchestrator, &env, "a", DeploymentAppType::GitOpsManaged).await;
        Environment::set_cluster_connection_error(db, env.cluster_id, "connection refused")
            .await
            .unwrap();

        let response = migrator(&orchestrator, &fakes)
            .change_pipeline_deployment_type(
                PipelineDeploymentTypeChangeRequest {
                    pipeline_ids: vec![a.id],
                    desired_deployment_type: DeploymentAppType::HelmManaged,
                    delete_action: DeleteAction::NonCascade,
                },
                1,
            )
            .await
            .unwrap();
        assert_eq!(ids(&response.successful_pipelines), vec![a.id]);
        assert!(response.failed_pipelines.is_empty());
        assert_eq!(
            fakes.gitops.deleted(),
            vec![(a.deployment_app_name.clone(), false)]
        );
    }

    #[tokio::test]
    async fn per_pipeline_change_reverts_failures() {
        let (orchestrator, fakes) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let a = app_on(&orchestrator, &env, "a", DeploymentAppType::GitOpsManaged).await;
        let b = app_on(&orchestrator, &env, "b", DeploymentAppType::GitOpsManaged).await;
        AppStatus::upsert(db, b.app_id, env.id, STATUS_PROGRESSING)
            .await
            .unwrap();

        let response = migrator(&orchestrator, &fakes)
            .change_pipeline_deployment_type(
                PipelineDeploymentTypeChangeRequest {
                    pipeline_ids: vec![a.id, b.id],
                    desired_deployment_type: DeploymentAppType::HelmManaged,
                    delete_action: DeleteAction::Cascade,
                },
                1,
            )
            .await
            .unwrap();
        assert_eq!(response.environment_id, env.id);
        assert_eq!(ids(&response.successful_pipelines), vec![a.id]);
        assert_eq!(ids(&response.failed_pipelines), vec![b.id]);

        let a = CdPipeline::find_by_id(db, a.id).await.unwrap();
        assert_eq!(a.deployment_app_type, DeploymentAppType::HelmManaged);
        assert!(!a.deployment_app_created);
        let b = CdPipeline::find_by_id(db, b.id).await.unwrap();
        assert_eq!(b.deployment_app_type, DeploymentAppType::GitOpsManaged);
        assert!(b.deployment_app_created);
    }

    #[tokio::test]
    async fn trigger_after_change_waits_for_old_release() {
        let (orchestrator, fakes) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let gone = app_on(&orchestrator, &env, "a", DeploymentAppType::GitOpsManaged).await;
        let lingering = app_on(&orchestrator, &env, "b", DeploymentAppType::GitOpsManaged).await;
        fakes.helm.mark_missing(&gone.deployment_app_name);
        fakes.deployments.set_artifact(gone.id, 21, "Succeeded");

        let response = migrator(&orchestrator, &fakes)
            .trigger_deployment_after_type_change(to_gitops(env.id, Vec::new()), 4)
            .await
            .unwrap();

        assert_eq!(ids(&response.successful_pipelines), vec![gone.id]);
        let failed = &response.failed_pipelines[0];
        assert_eq!(failed.pipeline_id, lingering.id);
        assert_eq!(failed.error, NOT_YET_DELETED);
        assert_eq!(failed.status, DeploymentChangeState::NotYetDeleted);
        assert!(!CdPipeline::find_by_id(db, gone.id).await.unwrap().deployment_app_created);
        assert_eq!(wait_for_trigger(&fakes).await[0].pipeline_id, gone.id);
    }

    #[tokio::test]
    async fn empty_scope_returns_empty_response() {
        let (orchestrator, fakes) = orchestrator().await;
        let env = seed_environment(&orchestrator.db().pool, "prod").await;
        let response = migrator(&orchestrator, &fakes)
            .change_deployment_type(to_gitops(env.id, Vec::new()), 1)
            .await
            .unwrap();
        assert_eq!(
            response,
            DeploymentAppTypeChangeResponse::empty(env.id, DeploymentAppType::GitOpsManaged)
        );
    }
}
