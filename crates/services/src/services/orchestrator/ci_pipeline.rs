use std::collections::HashMap;

use db::{
    ConnectionTrait, TransactionTrait,
    entities::{ci_pipeline, ci_pipeline_material},
    models::{
        Audit,
        app::App,
        app_workflow::{AppWorkflow, NewMapping},
        ci_pipeline::{
            CiEnvMapping, CiPipeline, CiPipelineMaterial, CiPipelineScript, NewCiPipeline,
            NewCiPipelineMaterial, NewCiScript,
        },
        ci_pipeline_history::{CiPipelineHistory, NewCiPipelineHistory},
        ci_template::{CiTemplate, CiTemplateOverride, TemplateSpec},
        pipeline_stage::StageOwner,
    },
    types::{AppType, CiPipelineType, HistoryTrigger, SourceType, StageType, WorkflowNodeType},
};
use serde_json::Value;

use super::{
    PipelineOrchestrator,
    types::{CiConfigRequest, CiPipelineRequest, CiScriptRequest, SourceRequest},
    workflow_name,
};
use crate::services::{
    clients::SensorPipelineMaterial,
    error::{PipelineError, Result},
    pipeline_stage::StageStore,
};

/// Source rule after normalization: regex sources always carry a regex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NormalizedSource {
    pub source_type: SourceType,
    pub value: String,
    pub regex: String,
    pub is_regex: bool,
}

pub(crate) fn normalize_source(source: &SourceRequest) -> Result<NormalizedSource> {
    let is_regex = source.source_type == SourceType::BranchRegex;
    if is_regex && source.value.is_empty() && source.regex.is_empty() {
        return Err(PipelineError::invalid(
            "regex source requires a value or a regex",
        ));
    }
    let regex = if is_regex && source.regex.is_empty() {
        source.value.clone()
    } else {
        source.regex.clone()
    };
    Ok(NormalizedSource {
        source_type: source.source_type.clone(),
        value: source.value.clone(),
        regex,
        is_regex,
    })
}

fn parse_pipeline_type(raw: &str) -> Result<CiPipelineType> {
    if raw.is_empty() {
        return Ok(CiPipelineType::Normal);
    }
    raw.parse()
        .map_err(|_| PipelineError::invalid(format!("invalid ci pipeline type '{raw}'")))
}

fn legacy_scripts(request: &CiPipelineRequest) -> Vec<NewCiScript> {
    let to_script = |stage: StageType| {
        move |script: &CiScriptRequest| NewCiScript {
            name: script.name.clone(),
            index: script.index,
            stage,
            script: script.script.clone(),
            output_location: script.output_location.clone(),
        }
    };
    request
        .before_docker_build_scripts
        .iter()
        .map(to_script(StageType::PreCi))
        .chain(
            request
                .after_docker_build_scripts
                .iter()
                .map(to_script(StageType::PostCi)),
        )
        .collect()
}

fn override_spec(request: &CiPipelineRequest) -> Result<Option<&TemplateSpec>> {
    if !request.is_docker_config_overridden || request.is_external {
        return Ok(None);
    }
    request
        .docker_config_override
        .as_ref()
        .map(Some)
        .ok_or_else(|| {
            PipelineError::invalid(format!(
                "pipeline '{}' overrides docker config without a template",
                request.name
            ))
        })
}

async fn template_snapshot<C: ConnectionTrait>(
    db: &C,
    app_id: i64,
    override_spec: Option<TemplateSpec>,
) -> Result<Value> {
    let spec = match override_spec {
        Some(spec) => Some(spec),
        None => CiTemplate::find_by_app(db, app_id)
            .await?
            .as_ref()
            .map(TemplateSpec::from),
    };
    Ok(serde_json::to_value(spec)?)
}

fn materials_snapshot(materials: &[ci_pipeline_material::Model]) -> Result<Value> {
    let snapshot: Vec<SensorPipelineMaterial> =
        materials.iter().map(SensorPipelineMaterial::from).collect();
    Ok(serde_json::to_value(snapshot)?)
}

async fn write_history<C: ConnectionTrait>(
    db: &C,
    pipeline: &ci_pipeline::Model,
    trigger: HistoryTrigger,
    override_spec: Option<TemplateSpec>,
    materials: &[ci_pipeline_material::Model],
    audit: Audit,
) -> Result<()> {
    CiPipelineHistory::create(
        db,
        NewCiPipelineHistory {
            ci_pipeline_id: pipeline.id,
            trigger,
            template_snapshot: template_snapshot(db, pipeline.app_id, override_spec).await?,
            materials_snapshot: materials_snapshot(materials)?,
            scan_enabled: pipeline.scan_enabled,
            is_manual: pipeline.is_manual,
        },
        audit,
    )
    .await?;
    Ok(())
}

/// Copies the parent's build settings and material rules onto a linked child.
async fn mirror_into_child<C: ConnectionTrait>(
    db: &C,
    parent: &ci_pipeline::Model,
    parent_materials: &[ci_pipeline_material::Model],
    mut child: ci_pipeline::Model,
    audit: Audit,
) -> Result<()> {
    child.is_external = true;
    child.docker_args = parent.docker_args.clone();
    child.scan_enabled = parent.scan_enabled;
    let child = CiPipeline::update(db, child, audit).await?;

    let by_git_material: HashMap<i64, ci_pipeline_material::Model> =
        CiPipelineMaterial::find_by_pipeline(db, child.id)
            .await?
            .into_iter()
            .map(|m| (m.git_material_id, m))
            .collect();
    for source in parent_materials {
        let Some(existing) = by_git_material.get(&source.git_material_id) else {
            tracing::error!(
                parent_id = parent.id,
                child_id = child.id,
                git_material_id = source.git_material_id,
                "linked pipeline has no material for parent source"
            );
            return Err(PipelineError::Fatal(
                "error while updating linked pipeline".to_string(),
            ));
        };
        let mut mirrored = existing.clone();
        mirrored.source_type = source.source_type.clone();
        mirrored.value = source.value.clone();
        mirrored.regex = source.regex.clone();
        mirrored.is_regex = source.is_regex;
        mirrored.active = source.active;
        mirrored.updated_by = audit.user_id;
        mirrored.updated_at = audit.at;
        CiPipelineMaterial::update(db, mirrored).await?;
    }
    Ok(())
}

impl PipelineOrchestrator {
    /// Idempotent; repositories that already exist are fine.
    async fn ensure_image_repository(&self, spec: &TemplateSpec) -> Result<()> {
        if self.config.skip_creating_ecr_repo {
            return Ok(());
        }
        match self
            .clients
            .registry
            .ensure_repository(&spec.docker_registry_id, &spec.docker_repository)
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if err.is_already_exists() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub(super) async fn ensure_env_scopes(
        &self,
        app_id: i64,
        environment_ids: &[i64],
        user_id: i64,
    ) {
        for &environment_id in environment_ids {
            match self
                .clients
                .scoped_config
                .ensure_environment_scope(app_id, environment_id, user_id)
                .await
            {
                Ok(()) => {}
                Err(err) if err.is_already_exists() => {}
                Err(err) => tracing::error!(
                    app_id,
                    environment_id,
                    error = %err,
                    "failed to create environment config scope"
                ),
            }
        }
    }

    pub async fn create_ci_pipelines(
        &self,
        request: CiConfigRequest,
        user_id: i64,
    ) -> Result<Vec<ci_pipeline::Model>> {
        let audit = Audit::now(user_id);
        let app_id = request.app_id;
        let app = App::find_active_by_id(&self.db.pool, app_id).await?;
        let is_job = app.app_type == AppType::Job;
        if request.ci_pipelines.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipeline_types = Vec::with_capacity(request.ci_pipelines.len());
        for pipeline in &request.ci_pipelines {
            pipeline_types.push(parse_pipeline_type(&pipeline.pipeline_type)?);
            for material in &pipeline.ci_materials {
                normalize_source(&material.source)?;
            }
            if let Some(spec) = override_spec(pipeline)? {
                self.ensure_image_repository(spec).await?;
            }
        }

        let tx = self.db.pool.begin().await?;
        let workflow_id = match AppWorkflow::find_active_by_id(&tx, request.app_workflow_id).await? {
            Some(workflow) if workflow.app_id == app_id => workflow.id,
            _ => {
                AppWorkflow::create(&tx, app_id, &workflow_name(app_id), audit)
                    .await?
                    .id
            }
        };

        let mut created = Vec::with_capacity(request.ci_pipelines.len());
        let mut scopes = Vec::new();
        for (pipeline, pipeline_type) in request.ci_pipelines.iter().zip(pipeline_types) {
            let model = CiPipeline::create(
                &tx,
                NewCiPipeline {
                    app_id,
                    name: pipeline.name.clone(),
                    pipeline_type,
                    is_manual: pipeline.is_manual,
                    is_external: pipeline.is_external,
                    is_docker_config_overridden: pipeline.is_docker_config_overridden,
                    parent_ci_pipeline_id: pipeline.parent_ci_pipeline_id,
                    docker_args: pipeline.docker_args.clone(),
                    scan_enabled: pipeline.scan_enabled,
                },
                audit,
            )
            .await?;

            if is_job && pipeline.environment_id != 0 {
                CiEnvMapping::upsert(&tx, model.id, pipeline.environment_id, audit).await?;
                if !pipeline.is_clone_job {
                    scopes.push(pipeline.environment_id);
                }
            }

            let mut materials = Vec::with_capacity(pipeline.ci_materials.len());
            for material in &pipeline.ci_materials {
                let source = normalize_source(&material.source)?;
                materials.push(
                    CiPipelineMaterial::create(
                        &tx,
                        NewCiPipelineMaterial {
                            ci_pipeline_id: model.id,
                            git_material_id: material.git_material_id,
                            source_type: source.source_type,
                            value: source.value,
                            regex: source.regex,
                            is_regex: source.is_regex,
                            active: true,
                        },
                        audit,
                    )
                    .await?,
                );
            }

            AppWorkflow::create_mapping(
                &tx,
                NewMapping {
                    app_workflow_id: workflow_id,
                    parent_id: 0,
                    parent_type: None,
                    component_id: model.id,
                    node_type: WorkflowNodeType::CiPipeline,
                },
                audit,
            )
            .await?;

            let spec = override_spec(pipeline)?.cloned();
            if let Some(spec) = spec.clone() {
                CiTemplateOverride::upsert(&tx, model.id, spec, audit).await?;
            }

            CiPipelineScript::create_all(&tx, model.id, &legacy_scripts(pipeline), audit).await?;
            if !pipeline.pre_build_stage.is_empty() {
                StageStore::create(
                    &tx,
                    StageOwner::Ci(model.id),
                    StageType::PreCi,
                    &pipeline.pre_build_stage,
                    audit,
                )
                .await?;
            }
            if !pipeline.post_build_stage.is_empty() {
                StageStore::create(
                    &tx,
                    StageOwner::Ci(model.id),
                    StageType::PostCi,
                    &pipeline.post_build_stage,
                    audit,
                )
                .await?;
            }

            if !model.is_external {
                self.registrar
                    .save_pipeline_materials(&tx, model.id, materials.iter().map(|m| m.id).collect())
                    .await?;
            }
            write_history(&tx, &model, HistoryTrigger::TriggerAdd, spec, &materials, audit)
                .await?;
            created.push(model);
        }
        tx.commit().await?;

        self.registrar.flush().await;
        self.ensure_env_scopes(app_id, &scopes, user_id).await;
        tracing::info!(app_id, workflow_id, count = created.len(), "ci pipelines created");
        Ok(created)
    }

    /// Rewrites a CI pipeline from `request` (whose `id` names the pipeline)
    /// and mirrors the result into every linked child.
    pub async fn patch_ci_pipeline(
        &self,
        app_id: i64,
        request: CiPipelineRequest,
        user_id: i64,
    ) -> Result<ci_pipeline::Model> {
        let audit = Audit::now(user_id);
        let existing = CiPipeline::find_by_id(&self.db.pool, request.id).await?;
        if existing.app_id != app_id {
            return Err(PipelineError::NotFound(format!(
                "ci pipeline {} not found in app {app_id}",
                request.id
            )));
        }
        let app = App::find_active_by_id(&self.db.pool, app_id).await?;
        let pipeline_type = if request.pipeline_type.is_empty() {
            existing.pipeline_type.clone()
        } else {
            parse_pipeline_type(&request.pipeline_type)?
        };
        for material in &request.ci_materials {
            normalize_source(&material.source)?;
        }
        let spec = override_spec(&request)?.cloned();
        if let Some(spec) = &spec {
            self.ensure_image_repository(spec).await?;
        }

        let originals: HashMap<i64, ci_pipeline_material::Model> =
            CiPipelineMaterial::find_by_pipeline(&self.db.pool, existing.id)
                .await?
                .into_iter()
                .map(|m| (m.id, m))
                .collect();
        let previous_env = CiEnvMapping::find_by_pipeline(&self.db.pool, existing.id)
            .await?
            .map(|mapping| mapping.environment_id);

        let tx = self.db.pool.begin().await?;
        let mut pipeline = existing.clone();
        if !request.name.is_empty() {
            pipeline.name = request.name.clone();
        }
        pipeline.pipeline_type = pipeline_type;
        pipeline.is_manual = request.is_manual;
        pipeline.is_external = request.is_external;
        pipeline.is_docker_config_overridden = request.is_docker_config_overridden;
        pipeline.docker_args = request.docker_args.clone();
        pipeline.scan_enabled = request.scan_enabled;
        let pipeline = CiPipeline::update(&tx, pipeline, audit).await?;

        let mut scopes = Vec::new();
        if app.app_type == AppType::Job
            && request.environment_id != 0
            && previous_env != Some(request.environment_id)
        {
            CiEnvMapping::upsert(&tx, pipeline.id, request.environment_id, audit).await?;
            if !request.is_clone_job {
                scopes.push(request.environment_id);
            }
        }

        CiPipelineScript::deactivate_by_pipeline(&tx, pipeline.id, audit).await?;
        CiPipelineScript::create_all(&tx, pipeline.id, &legacy_scripts(&request), audit).await?;
        let owner = StageOwner::Ci(pipeline.id);
        StageStore::update(&tx, owner, StageType::PreCi, &request.pre_build_stage, audit).await?;
        StageStore::update(&tx, owner, StageType::PostCi, &request.post_build_stage, audit).await?;

        for material in &request.ci_materials {
            let source = normalize_source(&material.source)?;
            if material.id > 0 {
                let Some(original) = originals.get(&material.id) else {
                    return Err(PipelineError::invalid(format!(
                        "ci material {} does not belong to pipeline {}",
                        material.id, pipeline.id
                    )));
                };
                let mut row = original.clone();
                row.git_material_id = material.git_material_id;
                row.source_type = source.source_type;
                row.value = source.value;
                row.regex = source.regex;
                row.is_regex = source.is_regex;
                row.active = true;
                row.updated_by = audit.user_id;
                row.updated_at = audit.at;
                CiPipelineMaterial::update(&tx, row).await?;
            } else {
                CiPipelineMaterial::create(
                    &tx,
                    NewCiPipelineMaterial {
                        ci_pipeline_id: pipeline.id,
                        git_material_id: material.git_material_id,
                        source_type: source.source_type,
                        value: source.value,
                        regex: source.regex,
                        is_regex: source.is_regex,
                        active: true,
                    },
                    audit,
                )
                .await?;
            }
        }
        let active = CiPipelineMaterial::find_active_by_pipeline(&tx, pipeline.id).await?;
        if !pipeline.is_external {
            self.registrar
                .save_pipeline_materials(&tx, pipeline.id, active.iter().map(|m| m.id).collect())
                .await?;
        }

        for child in CiPipeline::find_by_parent_ci_pipeline_id(&tx, pipeline.id).await? {
            mirror_into_child(&tx, &pipeline, &active, child, audit).await?;
        }

        if let Some(spec) = spec.clone() {
            CiTemplateOverride::upsert(&tx, pipeline.id, spec, audit).await?;
        }
        write_history(&tx, &pipeline, HistoryTrigger::TriggerUpdate, spec, &active, audit).await?;
        tx.commit().await?;

        self.registrar.flush().await;
        self.ensure_env_scopes(app_id, &scopes, user_id).await;
        tracing::info!(app_id, ci_pipeline_id = pipeline.id, "ci pipeline patched");
        Ok(pipeline)
    }

    pub async fn delete_ci_pipeline(
        &self,
        app_id: i64,
        ci_pipeline_id: i64,
        user_id: i64,
    ) -> Result<()> {
        let audit = Audit::now(user_id);
        let pipeline = CiPipeline::find_by_id(&self.db.pool, ci_pipeline_id).await?;
        if pipeline.app_id != app_id {
            return Err(PipelineError::NotFound(format!(
                "ci pipeline {ci_pipeline_id} not found in app {app_id}"
            )));
        }

        let tx = self.db.pool.begin().await?;
        CiPipeline::mark_deleted(&tx, pipeline.id, audit).await?;
        CiEnvMapping::mark_deleted(&tx, pipeline.id, audit).await?;
        let materials = CiPipelineMaterial::deactivate_by_pipeline(&tx, pipeline.id, audit).await?;
        if materials
            .iter()
            .any(|m| m.source_type == SourceType::Webhook)
        {
            self.registrar
                .save_pipeline_materials(&tx, pipeline.id, materials.iter().map(|m| m.id).collect())
                .await?;
        }
        if let Some(mapping) =
            AppWorkflow::find_mapping_by_component(&tx, WorkflowNodeType::CiPipeline, pipeline.id)
                .await?
        {
            AppWorkflow::deactivate_mapping(&tx, mapping.id, audit).await?;
        }
        CiPipelineScript::deactivate_by_pipeline(&tx, pipeline.id, audit).await?;
        StageStore::delete_all(&tx, StageOwner::Ci(pipeline.id), audit).await?;

        let spec = if pipeline.is_docker_config_overridden {
            CiTemplateOverride::find_by_pipeline(&tx, pipeline.id)
                .await?
                .as_ref()
                .map(TemplateSpec::from)
        } else {
            None
        };
        write_history(&tx, &pipeline, HistoryTrigger::TriggerDelete, spec, &materials, audit)
            .await?;
        tx.commit().await?;

        self.registrar.flush().await;
        tracing::info!(app_id, ci_pipeline_id, "ci pipeline deleted");
        Ok(())
    }
}
