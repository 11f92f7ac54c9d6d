use db::{
    ConnectionTrait, DbErr, TransactionTrait,
    entities::{cd_pipeline, environment},
    models::{
        Audit,
        app::App,
        app_status::AppStatus,
        app_workflow::{AppWorkflow, NewMapping},
        cd_pipeline::{CdPipeline, NewCdPipeline},
        ci_pipeline::ExternalCiPipeline,
        deployment_group::DeploymentGroup,
        environment::Environment,
        pipeline_stage::StageOwner,
    },
    types::{DeploymentAppType, StageType, WorkflowNodeType},
};
use uuid::Uuid;

use super::{
    PipelineOrchestrator,
    types::{AppDeleteResponse, CdPipelineRequest, CreateCdRequest, DeleteAction},
    workflow_name,
};
use crate::services::{
    clients::AppIdentifier,
    error::{PipelineError, Result},
    gitops::{self, GITOPS_NOT_CONFIGURED},
    pipeline_stage::{StageRequest, StageStore, legacy, validation::validate_stage},
};

pub const DELETE_CHILDREN_FIRST: &str =
    "Please delete children CD pipelines before deleting this pipeline.";
pub const HELM_DELETE_UNSUCCESSFUL: &str = "helm delete application response unsuccessful";

pub fn deployment_app_name(app_name: &str, env_name: &str) -> String {
    format!("{app_name}-{env_name}")
}

fn validate_cd_stages(request: &CdPipelineRequest) -> Result<()> {
    legacy::parse(&request.pre_stage_config)?;
    legacy::parse(&request.post_stage_config)?;
    if !request.pre_deploy_stage.is_empty() {
        validate_stage(StageType::PreCd, &request.pre_deploy_stage)?;
    }
    if !request.post_deploy_stage.is_empty() {
        validate_stage(StageType::PostCd, &request.post_deploy_stage)?;
    }
    Ok(())
}

async fn save_script_histories<C: ConnectionTrait>(
    db: &C,
    pipeline: &cd_pipeline::Model,
    audit: Audit,
) -> Result<()> {
    if !pipeline.pre_stage_config.is_empty() {
        CdPipeline::save_script_history(
            db,
            pipeline.id,
            StageType::PreCd,
            &pipeline.pre_stage_config,
            pipeline.pre_stage_cm_cs_names.clone(),
            pipeline.pre_trigger_type.clone(),
            pipeline.run_pre_stage_in_env,
            audit,
        )
        .await?;
    }
    if !pipeline.post_stage_config.is_empty() {
        CdPipeline::save_script_history(
            db,
            pipeline.id,
            StageType::PostCd,
            &pipeline.post_stage_config,
            pipeline.post_stage_cm_cs_names.clone(),
            pipeline.post_trigger_type.clone(),
            pipeline.run_post_stage_in_env,
            audit,
        )
        .await?;
    }
    Ok(())
}

async fn active_or_new_workflow<C: ConnectionTrait>(
    db: &C,
    app_id: i64,
    app_workflow_id: i64,
    audit: Audit,
) -> Result<i64> {
    match AppWorkflow::find_active_by_id(db, app_workflow_id).await? {
        Some(workflow) if workflow.app_id == app_id => Ok(workflow.id),
        _ => Ok(AppWorkflow::create(db, app_id, &workflow_name(app_id), audit)
            .await?
            .id),
    }
}

/// Hangs the CD pipeline under its parent node, creating the webhook root
/// and its workflow when the parent is a new webhook.
async fn attach_to_workflow<C: ConnectionTrait>(
    db: &C,
    app_id: i64,
    request: &CdPipelineRequest,
    pipeline_id: i64,
    audit: Audit,
) -> Result<()> {
    let (workflow_id, parent_type, parent_id) = match request.parent_pipeline_type {
        Some(WorkflowNodeType::Webhook) if request.parent_pipeline_id == 0 => {
            let external =
                ExternalCiPipeline::create(db, app_id, &Uuid::new_v4().to_string(), audit).await?;
            let workflow_id =
                active_or_new_workflow(db, app_id, request.app_workflow_id, audit).await?;
            AppWorkflow::create_mapping(
                db,
                NewMapping {
                    app_workflow_id: workflow_id,
                    parent_id: 0,
                    parent_type: None,
                    component_id: external.id,
                    node_type: WorkflowNodeType::Webhook,
                },
                audit,
            )
            .await?;
            (workflow_id, WorkflowNodeType::Webhook, external.id)
        }
        parent_type => {
            let parent_type = parent_type.unwrap_or(WorkflowNodeType::CiPipeline);
            let parent_id = if request.parent_pipeline_id != 0 {
                request.parent_pipeline_id
            } else {
                request.ci_pipeline_id
            };
            let workflow_id = if request.app_workflow_id != 0 {
                request.app_workflow_id
            } else {
                AppWorkflow::find_mapping_by_component(db, parent_type, parent_id)
                    .await?
                    .map(|mapping| mapping.app_workflow_id)
                    .ok_or_else(|| {
                        PipelineError::NotFound(format!(
                            "parent {parent_type} {parent_id} is not part of a workflow"
                        ))
                    })?
            };
            (workflow_id, parent_type, parent_id)
        }
    };

    AppWorkflow::create_mapping(
        db,
        NewMapping {
            app_workflow_id: workflow_id,
            parent_id,
            parent_type: Some(parent_type),
            component_id: pipeline_id,
            node_type: WorkflowNodeType::CdPipeline,
        },
        audit,
    )
    .await?;
    Ok(())
}

impl PipelineOrchestrator {
    pub async fn create_cd_pipelines(
        &self,
        request: CreateCdRequest,
        user_id: i64,
    ) -> Result<Vec<cd_pipeline::Model>> {
        let audit = Audit::now(user_id);
        let app = App::find_active_by_id(&self.db.pool, request.app_id).await?;
        if request.pipelines.is_empty() {
            return Ok(Vec::new());
        }

        let gitops_configured = gitops::is_configured(&self.clients).await;
        let mut planned: Vec<(DeploymentAppType, environment::Model)> =
            Vec::with_capacity(request.pipelines.len());
        for pipeline in &request.pipelines {
            let deployment_type = match &pipeline.deployment_app_type {
                Some(DeploymentAppType::GitOpsManaged) if !gitops_configured => {
                    return Err(PipelineError::invalid(GITOPS_NOT_CONFIGURED));
                }
                Some(requested) => requested.clone(),
                None if gitops_configured => DeploymentAppType::GitOpsManaged,
                None => DeploymentAppType::HelmManaged,
            };
            validate_cd_stages(pipeline)?;
            let env = Environment::find_by_id(&self.db.pool, pipeline.environment_id).await?;
            planned.push((deployment_type, env));
        }

        if planned
            .iter()
            .any(|(deployment_type, _)| *deployment_type == DeploymentAppType::GitOpsManaged)
        {
            gitops::provision_repository(&self.db.pool, &self.clients, app.id, &app.name, audit)
                .await?;
        }

        let tx = self.db.pool.begin().await?;
        let mut created = Vec::with_capacity(planned.len());
        for (pipeline, (deployment_type, env)) in request.pipelines.iter().zip(planned) {
            let app_name = deployment_app_name(&app.name, &env.name);
            let name = if pipeline.name.trim().is_empty() {
                app_name.clone()
            } else {
                pipeline.name.clone()
            };
            let model = CdPipeline::create(
                &tx,
                NewCdPipeline {
                    app_id: app.id,
                    environment_id: env.id,
                    name,
                    ci_pipeline_id: pipeline.ci_pipeline_id,
                    trigger_type: pipeline.trigger_type.clone(),
                    pre_stage_config: pipeline.pre_stage_config.clone(),
                    post_stage_config: pipeline.post_stage_config.clone(),
                    pre_trigger_type: pipeline.pre_trigger_type.clone(),
                    post_trigger_type: pipeline.post_trigger_type.clone(),
                    pre_stage_cm_cs_names: pipeline.pre_stage_config_map_secret_names.clone(),
                    post_stage_cm_cs_names: pipeline.post_stage_config_map_secret_names.clone(),
                    run_pre_stage_in_env: pipeline.run_pre_stage_in_env,
                    run_post_stage_in_env: pipeline.run_post_stage_in_env,
                    deployment_app_type: deployment_type,
                    deployment_app_name: app_name,
                },
                audit,
            )
            .await?;
            save_script_histories(&tx, &model, audit).await?;
            attach_to_workflow(&tx, app.id, pipeline, model.id, audit).await?;
            created.push(model);
        }
        tx.commit().await?;

        let environment_ids: Vec<i64> = created.iter().map(|p| p.environment_id).collect();
        self.ensure_env_scopes(app.id, &environment_ids, user_id).await;
        for (pipeline, model) in request.pipelines.iter().zip(&created) {
            let owner = StageOwner::Cd(model.id);
            for (stage_type, stage) in [
                (StageType::PreCd, &pipeline.pre_deploy_stage),
                (StageType::PostCd, &pipeline.post_deploy_stage),
            ] {
                if stage.is_empty() {
                    continue;
                }
                if let Err(err) = self.create_deploy_stage(owner, stage_type, stage, audit).await {
                    tracing::error!(
                        cd_pipeline_id = model.id,
                        %stage_type,
                        error = %err,
                        "failed to create deploy stage"
                    );
                }
            }
        }
        tracing::info!(app_id = app.id, count = created.len(), "cd pipelines created");
        Ok(created)
    }

    /// Stage and steps are written in one transaction so a failure leaves no
    /// partial stage behind.
    async fn create_deploy_stage(
        &self,
        owner: StageOwner,
        stage_type: StageType,
        stage: &StageRequest,
        audit: Audit,
    ) -> Result<()> {
        let tx = self.db.pool.begin().await?;
        StageStore::create(&tx, owner, stage_type, stage, audit).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn update_cd_pipeline(
        &self,
        request: CdPipelineRequest,
        user_id: i64,
    ) -> Result<cd_pipeline::Model> {
        let audit = Audit::now(user_id);
        let mut pipeline = match CdPipeline::find_by_id(&self.db.pool, request.id).await {
            Ok(pipeline) => pipeline,
            Err(DbErr::RecordNotFound(_)) => {
                return Err(PipelineError::NotFound("no cd pipeline found".to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        validate_cd_stages(&request)?;

        pipeline.trigger_type = request.trigger_type.clone();
        pipeline.pre_stage_config = request.pre_stage_config.clone();
        pipeline.post_stage_config = request.post_stage_config.clone();
        pipeline.pre_trigger_type = request.pre_trigger_type.clone();
        pipeline.post_trigger_type = request.post_trigger_type.clone();
        pipeline.pre_stage_cm_cs_names = request.pre_stage_config_map_secret_names.clone();
        pipeline.post_stage_cm_cs_names = request.post_stage_config_map_secret_names.clone();
        pipeline.run_pre_stage_in_env = request.run_pre_stage_in_env;
        pipeline.run_post_stage_in_env = request.run_post_stage_in_env;

        let tx = self.db.pool.begin().await?;
        let pipeline = CdPipeline::update(&tx, pipeline, audit).await?;
        save_script_histories(&tx, &pipeline, audit).await?;
        let owner = StageOwner::Cd(pipeline.id);
        StageStore::update(&tx, owner, StageType::PreCd, &request.pre_deploy_stage, audit).await?;
        StageStore::update(&tx, owner, StageType::PostCd, &request.post_deploy_stage, audit)
            .await?;
        tx.commit().await?;

        tracing::info!(cd_pipeline_id = pipeline.id, "cd pipeline updated");
        Ok(pipeline)
    }

    /// Removes the deployed object for `pipeline`. Not-found replies count
    /// as removed; `Force` also swallows every other failure.
    async fn teardown_deployment(
        &self,
        pipeline: &cd_pipeline::Model,
        env: &environment::Model,
        action: DeleteAction,
    ) -> Result<()> {
        let force = action == DeleteAction::Force;
        let outcome = match pipeline.deployment_app_type {
            DeploymentAppType::GitOpsManaged => self
                .clients
                .gitops
                .delete_application(
                    &pipeline.deployment_app_name,
                    action != DeleteAction::NonCascade,
                )
                .await
                .map_err(PipelineError::from),
            DeploymentAppType::HelmManaged => {
                let release = AppIdentifier {
                    cluster_id: env.cluster_id,
                    release_name: pipeline.deployment_app_name.clone(),
                    namespace: env.namespace.clone(),
                };
                match self.clients.helm.delete_application(&release).await {
                    Ok(Some(response)) if response.success => Ok(()),
                    Ok(_) => Err(PipelineError::Unavailable(
                        HELM_DELETE_UNSUCCESSFUL.to_string(),
                    )),
                    Err(err) => Err(err.into()),
                }
            }
        };
        match outcome {
            Ok(()) => Ok(()),
            Err(PipelineError::Client(err)) if err.is_not_found() => Ok(()),
            Err(err) if force => {
                tracing::warn!(
                    cd_pipeline_id = pipeline.id,
                    error = %err,
                    "teardown failed, continuing with forced delete"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn delete_cd_pipeline(
        &self,
        pipeline_id: i64,
        action: DeleteAction,
        user_id: i64,
    ) -> Result<AppDeleteResponse> {
        let audit = Audit::now(user_id);
        let pipeline = CdPipeline::find_by_id(&self.db.pool, pipeline_id).await?;

        let children =
            AppWorkflow::find_children(&self.db.pool, WorkflowNodeType::CdPipeline, pipeline.id)
                .await?;
        if !children.is_empty() {
            return Err(PipelineError::invalid(DELETE_CHILDREN_FIRST));
        }
        let groups =
            DeploymentGroup::find_by_app_and_env(&self.db.pool, pipeline.app_id, pipeline.environment_id)
                .await?;
        if !groups.is_empty() {
            let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
            return Err(PipelineError::invalid(format!(
                "Please remove this CD pipeline from deployment groups : {}",
                serde_json::to_string(&names)?
            )));
        }

        let (env, cluster) =
            Environment::find_with_cluster(&self.db.pool, pipeline.environment_id).await?;
        let cluster_reachable = cluster.error_in_connecting.is_empty();
        if !cluster_reachable && action == DeleteAction::Cascade {
            tracing::warn!(
                cd_pipeline_id = pipeline.id,
                cluster = %cluster.cluster_name,
                "cluster unreachable, cascade delete deferred"
            );
            return Ok(AppDeleteResponse {
                delete_initiated: false,
                cluster_reachable,
                cluster_name: cluster.cluster_name,
            });
        }

        // External teardown happens before the transaction opens; a failure
        // other than under `Force` leaves every row untouched.
        if pipeline.deployment_app_created {
            self.teardown_deployment(&pipeline, &env, action).await?;
        }

        let tx = self.db.pool.begin().await?;
        CdPipeline::mark_deleted(&tx, pipeline.id, audit).await?;
        AppStatus::delete(&tx, pipeline.app_id, pipeline.environment_id).await?;
        if let Some(mapping) =
            AppWorkflow::find_mapping_by_component(&tx, WorkflowNodeType::CdPipeline, pipeline.id)
                .await?
        {
            if mapping.parent_type == Some(WorkflowNodeType::Webhook) {
                let siblings =
                    AppWorkflow::find_children(&tx, WorkflowNodeType::Webhook, mapping.parent_id)
                        .await?;
                if siblings.len() <= 1 {
                    ExternalCiPipeline::deactivate(&tx, mapping.parent_id, audit).await?;
                    if let Some(webhook) = AppWorkflow::find_mapping_by_component(
                        &tx,
                        WorkflowNodeType::Webhook,
                        mapping.parent_id,
                    )
                    .await?
                    {
                        AppWorkflow::deactivate_mapping(&tx, webhook.id, audit).await?;
                    }
                    AppWorkflow::deactivate(&tx, mapping.app_workflow_id, audit).await?;
                }
            }
            AppWorkflow::deactivate_mapping(&tx, mapping.id, audit).await?;
        }
        StageStore::delete_all(&tx, StageOwner::Cd(pipeline.id), audit).await?;

        if pipeline.deployment_app_created {
            CdPipeline::set_deployment_app_created(&tx, &[pipeline.id], false, audit).await?;
        }
        tx.commit().await?;

        tracing::info!(cd_pipeline_id = pipeline.id, ?action, "cd pipeline deleted");
        Ok(AppDeleteResponse {
            delete_initiated: true,
            cluster_reachable,
            cluster_name: cluster.cluster_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use db::models::{chart::Chart, pipeline_stage::PipelineStage};

    use super::*;
    use crate::services::{
        clients::{ClientError, HelmDeleteResponse},
        error::ErrorKind,
        test_utils::{
            fixed_branch, orchestrator, seed_app, seed_cd_pipeline, seed_ci_pipeline,
            seed_environment,
        },
    };

    fn cd_request(environment_id: i64, ci_pipeline_id: i64) -> CdPipelineRequest {
        CdPipelineRequest {
            id: 0,
            name: String::new(),
            environment_id,
            ci_pipeline_id,
            app_workflow_id: 0,
            parent_pipeline_id: 0,
            parent_pipeline_type: None,
            trigger_type: Default::default(),
            deployment_app_type: None,
            pre_stage_config: String::new(),
            post_stage_config: String::new(),
            pre_trigger_type: Default::default(),
            post_trigger_type: Default::default(),
            pre_stage_config_map_secret_names: Default::default(),
            post_stage_config_map_secret_names: Default::default(),
            run_pre_stage_in_env: false,
            run_post_stage_in_env: false,
            pre_deploy_stage: Default::default(),
            post_deploy_stage: Default::default(),
        }
    }

    async fn deployed_in(
        orchestrator: &PipelineOrchestrator,
        env: &environment::Model,
        app_name: &str,
        deployment_type: DeploymentAppType,
    ) -> cd_pipeline::Model {
        let db = &orchestrator.db().pool;
        let (app_id, material_id) = seed_app(orchestrator, app_name).await;
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

    async fn deployed(
        orchestrator: &PipelineOrchestrator,
        deployment_type: DeploymentAppType,
    ) -> (cd_pipeline::Model, environment::Model) {
        let env = seed_environment(&orchestrator.db().pool, "prod").await;
        let cd = deployed_in(orchestrator, &env, "web", deployment_type).await;
        (cd, env)
    }

    #[tokio::test]
    async fn create_defaults_to_gitops_and_provisions_repository() {
        let (orchestrator, fakes) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let (app_id, material_id) = seed_app(&orchestrator, "web").await;
        Chart::create(db, app_id, "reference-chart_4-18-0", Audit::now(1))
            .await
            .unwrap();
        let ci = seed_ci_pipeline(&orchestrator, app_id, material_id, fixed_branch("main")).await;

        let created = orchestrator
            .create_cd_pipelines(
                CreateCdRequest {
                    app_id,
                    pipelines: vec![cd_request(env.id, ci.id)],
                },
                1,
            )
            .await
            .unwrap();

        let cd = &created[0];
        assert_eq!(cd.deployment_app_type, DeploymentAppType::GitOpsManaged);
        assert_eq!(cd.deployment_app_name, "web-prod");
        assert_eq!(cd.name, "web-prod");
        assert!(!cd.deployment_app_created);
        assert_eq!(fakes.gitops_repos.created(), vec!["web".to_string()]);
        let chart = Chart::find_latest_by_app(db, app_id).await.unwrap().unwrap();
        assert_eq!(chart.git_repo_url, "https://git.example.com/gitops/web.git");

        let mapping = AppWorkflow::find_mapping_by_component(db, WorkflowNodeType::CdPipeline, cd.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.parent_type, Some(WorkflowNodeType::CiPipeline));
        assert_eq!(mapping.parent_id, ci.id);
        assert_eq!(fakes.scoped_config.ensured(), vec![(app_id, env.id)]);
    }

    #[tokio::test]
    async fn gitops_requires_configuration() {
        let (orchestrator, fakes) = orchestrator().await;
        fakes.gitops_repos.set_configured(false);
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let (app_id, material_id) = seed_app(&orchestrator, "web").await;
        let ci = seed_ci_pipeline(&orchestrator, app_id, material_id, fixed_branch("main")).await;

        let mut request = cd_request(env.id, ci.id);
        request.deployment_app_type = Some(DeploymentAppType::GitOpsManaged);
        let err = orchestrator
            .create_cd_pipelines(
                CreateCdRequest {
                    app_id,
                    pipelines: vec![request.clone()],
                },
                1,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), GITOPS_NOT_CONFIGURED);
        assert!(
            CdPipeline::find_active_by_app_and_env(db, app_id, env.id)
                .await
                .unwrap()
                .is_empty()
        );

        request.deployment_app_type = None;
        let created = orchestrator
            .create_cd_pipelines(CreateCdRequest { app_id, pipelines: vec![request] }, 1)
            .await
            .unwrap();
        assert_eq!(created[0].deployment_app_type, DeploymentAppType::HelmManaged);
        assert!(fakes.gitops_repos.created().is_empty());
    }

    #[tokio::test]
    async fn legacy_stage_yaml_is_validated_and_recorded() {
        let (orchestrator, _) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let (app_id, material_id) = seed_app(&orchestrator, "web").await;
        let ci = seed_ci_pipeline(&orchestrator, app_id, material_id, fixed_branch("main")).await;

        let mut broken = cd_request(env.id, ci.id);
        broken.pre_stage_config = "cdPipelineConf: [".to_string();
        let err = orchestrator
            .create_cd_pipelines(CreateCdRequest { app_id, pipelines: vec![broken] }, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        let mut request = cd_request(env.id, ci.id);
        request.pre_stage_config = "version: \"0.0.1\"\ncdPipelineConf:\n  - beforeStages:\n      - name: migrate\n        script: ./migrate.sh\n".to_string();
        let created = orchestrator
            .create_cd_pipelines(CreateCdRequest { app_id, pipelines: vec![request.clone()] }, 1)
            .await
            .unwrap();
        let history = CdPipeline::find_script_history(db, created[0].id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].stage, StageType::PreCd);

        request.id = created[0].id;
        request.trigger_type = db::types::TriggerType::Automatic;
        let updated = orchestrator.update_cd_pipeline(request.clone(), 2).await.unwrap();
        assert_eq!(updated.trigger_type, db::types::TriggerType::Automatic);
        assert_eq!(CdPipeline::find_script_history(db, updated.id).await.unwrap().len(), 2);

        request.id = 9999;
        let err = orchestrator.update_cd_pipeline(request, 2).await.unwrap_err();
        assert_eq!(err.to_string(), "no cd pipeline found");
    }

    #[tokio::test]
    async fn delete_with_child_mutates_nothing() {
        let (orchestrator, _) = orchestrator().await;
        let (parent, env) = deployed(&orchestrator, DeploymentAppType::HelmManaged).await;
        let db = &orchestrator.db().pool;
        seed_cd_pipeline(
            db,
            parent.app_id,
            env.id,
            0,
            (WorkflowNodeType::CdPipeline, parent.id),
            DeploymentAppType::HelmManaged,
        )
        .await;

        let err = orchestrator
            .delete_cd_pipeline(parent.id, DeleteAction::Cascade, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(err.to_string(), DELETE_CHILDREN_FIRST);
        let stored = CdPipeline::find_by_id(db, parent.id).await.unwrap();
        assert!(!stored.deleted);
        assert!(
            AppWorkflow::find_mapping_by_component(db, WorkflowNodeType::CdPipeline, parent.id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn delete_refuses_pipelines_in_deployment_groups() {
        let (orchestrator, _) = orchestrator().await;
        let (cd, env) = deployed(&orchestrator, DeploymentAppType::HelmManaged).await;
        DeploymentGroup::create(
            &orchestrator.db().pool,
            "wave-1",
            env.id,
            cd.ci_pipeline_id,
            &[cd.app_id],
            Audit::now(1),
        )
        .await
        .unwrap();

        let err = orchestrator
            .delete_cd_pipeline(cd.id, DeleteAction::Force, 1)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please remove this CD pipeline from deployment groups : [\"wave-1\"]"
        );
    }

    #[tokio::test]
    async fn unreachable_cluster_defers_cascade_delete() {
        let (orchestrator, fakes) = orchestrator().await;
        let (cd, env) = deployed(&orchestrator, DeploymentAppType::HelmManaged).await;
        let db = &orchestrator.db().pool;
        Environment::set_cluster_connection_error(db, env.cluster_id, "dial tcp: i/o timeout")
            .await
            .unwrap();

        let response = orchestrator
            .delete_cd_pipeline(cd.id, DeleteAction::Cascade, 1)
            .await
            .unwrap();
        assert_eq!(
            response,
            AppDeleteResponse {
                delete_initiated: false,
                cluster_reachable: false,
                cluster_name: "prod-cluster".to_string(),
            }
        );
        assert!(!CdPipeline::find_by_id(db, cd.id).await.unwrap().deleted);
        assert!(fakes.helm.deleted().is_empty());

        let response = orchestrator
            .delete_cd_pipeline(cd.id, DeleteAction::Force, 1)
            .await
            .unwrap();
        assert!(response.delete_initiated);
        assert!(!response.cluster_reachable);
    }

    #[tokio::test]
    async fn gitops_teardown_failure_rolls_back_unless_forced() {
        let (orchestrator, fakes) = orchestrator().await;
        let (cd, _) = deployed(&orchestrator, DeploymentAppType::GitOpsManaged).await;
        let db = &orchestrator.db().pool;
        fakes
            .gitops
            .fail_delete(ClientError::Unavailable("controller down".to_string()));

        let err = orchestrator
            .delete_cd_pipeline(cd.id, DeleteAction::Cascade, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        let stored = CdPipeline::find_by_id(db, cd.id).await.unwrap();
        assert!(!stored.deleted);
        assert!(stored.deployment_app_created);

        orchestrator
            .delete_cd_pipeline(cd.id, DeleteAction::Force, 1)
            .await
            .unwrap();
        assert!(CdPipeline::find_active_by_app_and_env(db, cd.app_id, cd.environment_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn helm_teardown_treats_missing_release_as_deleted() {
        let (orchestrator, fakes) = orchestrator().await;
        let (cd, env) = deployed(&orchestrator, DeploymentAppType::HelmManaged).await;
        fakes
            .helm
            .respond_to_delete(Err(ClientError::NotFound("release: not found".to_string())));
        orchestrator
            .delete_cd_pipeline(cd.id, DeleteAction::Cascade, 1)
            .await
            .unwrap();

        let cd = deployed_in(&orchestrator, &env, "api", DeploymentAppType::HelmManaged).await;
        fakes
            .helm
            .respond_to_delete(Ok(Some(HelmDeleteResponse { success: false })));
        let err = orchestrator
            .delete_cd_pipeline(cd.id, DeleteAction::Cascade, 1)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), HELM_DELETE_UNSUCCESSFUL);
    }

    #[tokio::test]
    async fn failed_stage_write_leaves_no_partial_stage() {
        let (orchestrator, _) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let (app_id, material_id) = seed_app(&orchestrator, "web").await;
        let ci = seed_ci_pipeline(&orchestrator, app_id, material_id, fixed_branch("main")).await;
        db.execute_unprepared("DROP TABLE pipeline_stage_step_condition")
            .await
            .unwrap();

        let mut request = cd_request(env.id, ci.id);
        request.deployment_app_type = Some(DeploymentAppType::HelmManaged);
        request.pre_deploy_stage = serde_json::from_value(serde_json::json!({
            "steps": [{
                "name": "smoke",
                "index": 1,
                "stepType": "INLINE",
                "inlineStepDetail": {
                    "scriptType": "SHELL",
                    "script": "echo ok",
                    "inputVariables": [{"name": "RETRIES", "format": "NUMBER", "value": "3"}],
                    "conditionDetails": [{
                        "conditionOnVariable": "RETRIES",
                        "conditionType": "TRIGGER",
                        "conditionalOperator": ">",
                        "conditionalValue": "0"
                    }]
                }
            }]
        }))
        .unwrap();
        let created = orchestrator
            .create_cd_pipelines(CreateCdRequest { app_id, pipelines: vec![request] }, 1)
            .await
            .unwrap();

        assert!(
            PipelineStage::find_by_owner(db, StageOwner::Cd(created[0].id))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn teardown_runs_before_delete_writes() {
        let (orchestrator, fakes) = orchestrator().await;
        let (cd, _) = deployed(&orchestrator, DeploymentAppType::GitOpsManaged).await;
        let db = &orchestrator.db().pool;
        fakes.gitops.watch_pipeline(db, cd.id);

        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            orchestrator.delete_cd_pipeline(cd.id, DeleteAction::Cascade, 1),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(fakes.gitops.watched_deleted(), vec![false]);
        let stored = CdPipeline::find_by_id(db, cd.id).await.unwrap();
        assert!(stored.deleted);
        assert!(!stored.deployment_app_created);
    }

    #[tokio::test]
    async fn last_webhook_child_removes_webhook_workflow() {
        let (orchestrator, _) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let env = seed_environment(db, "prod").await;
        let (app_id, _) = seed_app(&orchestrator, "web").await;
        let mut request = cd_request(env.id, 0);
        request.parent_pipeline_type = Some(WorkflowNodeType::Webhook);
        request.deployment_app_type = Some(DeploymentAppType::HelmManaged);
        request.pre_deploy_stage = serde_json::from_value(serde_json::json!({
            "steps": [{
                "name": "smoke",
                "index": 1,
                "stepType": "INLINE",
                "inlineStepDetail": {"scriptType": "SHELL", "script": "echo ok"}
            }]
        }))
        .unwrap();
        let created = orchestrator
            .create_cd_pipelines(CreateCdRequest { app_id, pipelines: vec![request] }, 1)
            .await
            .unwrap();
        let cd = &created[0];
        assert_eq!(
            PipelineStage::find_by_owner(db, StageOwner::Cd(cd.id)).await.unwrap().len(),
            1
        );

        let mapping = AppWorkflow::find_mapping_by_component(db, WorkflowNodeType::CdPipeline, cd.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.parent_type, Some(WorkflowNodeType::Webhook));
        let external = ExternalCiPipeline::find_by_id(db, mapping.parent_id)
            .await
            .unwrap()
            .unwrap();
        assert!(external.active);

        orchestrator
            .delete_cd_pipeline(cd.id, DeleteAction::Cascade, 1)
            .await
            .unwrap();
        let external = ExternalCiPipeline::find_by_id(db, external.id).await.unwrap().unwrap();
        assert!(!external.active);
        assert!(
            AppWorkflow::find_active_by_id(db, mapping.app_workflow_id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            PipelineStage::find_by_owner(db, StageOwner::Cd(cd.id))
                .await
                .unwrap()
                .is_empty()
        );
    }
}
