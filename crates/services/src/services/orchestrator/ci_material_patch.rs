use db::{
    ConnectionTrait, TransactionTrait,
    entities::{ci_pipeline, ci_pipeline_material},
    models::{
        Audit,
        app_workflow::AppWorkflow,
        cd_pipeline::CdPipeline,
        ci_pipeline::{CiPipeline, CiPipelineMaterial},
    },
    types::{CiPipelineType, SourceType, WorkflowNodeType},
};
use regex::Regex;

use super::{
    PipelineOrchestrator,
    ci_pipeline::normalize_source,
    types::{BulkPatchResponse, CiMaterialPatchResult, PatchStatus, SourceRequest},
};
use crate::services::{
    clients::RbacAction,
    error::{ErrorKind, NOT_AUTHORIZED_MESSAGE, PipelineError, Result},
};

const UNIQUE_PIPELINE_MESSAGE: &str =
    "unique pipeline was not found, for the given appId and environmentId";
const UNIQUE_MATERIAL_MESSAGE: &str =
    "unique ciPipelineMaterial was not found, for the given appId and environmentId";

/// The single CI material that feeds the only CD pipeline of `(app_id, env_id)`.
async fn find_unique_material<C: ConnectionTrait>(
    db: &C,
    app_id: i64,
    env_id: i64,
) -> Result<(ci_pipeline::Model, ci_pipeline_material::Model)> {
    let mut cd_pipelines = CdPipeline::find_active_by_app_and_env(db, app_id, env_id).await?;
    if cd_pipelines.len() != 1 {
        return Err(PipelineError::invalid(UNIQUE_PIPELINE_MESSAGE));
    }
    let cd_pipeline = cd_pipelines.remove(0);

    let mapping =
        AppWorkflow::find_mapping_by_component(db, WorkflowNodeType::CdPipeline, cd_pipeline.id)
            .await?;
    if mapping.and_then(|m| m.parent_type) == Some(WorkflowNodeType::Webhook) {
        return Err(PipelineError::Skip("Webhook".to_string()));
    }

    let pipeline = CiPipeline::find_by_id(db, cd_pipeline.ci_pipeline_id)
        .await
        .map_err(|_| PipelineError::invalid(UNIQUE_PIPELINE_MESSAGE))?;
    let mut materials = CiPipelineMaterial::find_active_by_pipeline(db, pipeline.id).await?;
    if materials.len() != 1 {
        return Err(PipelineError::invalid(UNIQUE_MATERIAL_MESSAGE));
    }
    Ok((pipeline, materials.remove(0)))
}

fn patch_status(kind: ErrorKind) -> PatchStatus {
    match kind {
        ErrorKind::Permission => PatchStatus::NotAuthorized,
        ErrorKind::Skip => PatchStatus::Skipped,
        _ => PatchStatus::Failed,
    }
}

impl PipelineOrchestrator {
    /// Validates a branch change for the CI material behind `(app_id, env_id)`
    /// and returns the material with the new value. Nothing is written.
    pub async fn patch_ci_material_source_value(
        &self,
        app_id: i64,
        env_id: i64,
        value: &str,
        user_id: i64,
    ) -> Result<ci_pipeline_material::Model> {
        let audit = Audit::now(user_id);
        let (pipeline, mut material) = find_unique_material(&self.db.pool, app_id, env_id).await?;

        if !matches!(
            material.source_type,
            SourceType::BranchFixed | SourceType::BranchRegex
        ) {
            return Err(PipelineError::invalid(format!(
                "source type {} cannot be patched",
                material.source_type
            )));
        }
        if pipeline.parent_ci_pipeline_id != 0 {
            return Err(PipelineError::Skip(CiPipelineType::Linked.to_string()));
        }
        if pipeline.pipeline_type == CiPipelineType::LinkedCd {
            return Err(PipelineError::Skip(CiPipelineType::LinkedCd.to_string()));
        }

        let action = if material.source_type == SourceType::BranchRegex {
            RbacAction::Trigger
        } else {
            RbacAction::Update
        };
        if !self.clients.rbac.is_allowed(user_id, action, app_id).await {
            return Err(PipelineError::Permission(NOT_AUTHORIZED_MESSAGE.to_string()));
        }

        if !material.regex.is_empty() {
            let regex = Regex::new(&material.regex).map_err(|err| {
                PipelineError::invalid(format!("invalid regex {}: {err}", material.regex))
            })?;
            if !regex.is_match(value) {
                return Err(PipelineError::invalid(format!(
                    "regex mismatch, value {value} does not match regex {}",
                    material.regex
                )));
            }
        }

        material.value = value.to_string();
        material.updated_by = audit.user_id;
        material.updated_at = audit.at;
        Ok(material)
    }

    /// Runs the single-app patch for every app and writes the accepted
    /// materials together.
    pub async fn bulk_patch_ci_material_source(
        &self,
        env_id: i64,
        app_ids: &[i64],
        value: &str,
        user_id: i64,
    ) -> Result<BulkPatchResponse> {
        let mut response = BulkPatchResponse::default();
        let mut accepted = Vec::new();
        for &app_id in app_ids {
            match self
                .patch_ci_material_source_value(app_id, env_id, value, user_id)
                .await
            {
                Ok(material) => {
                    accepted.push(material);
                    response.apps.push(CiMaterialPatchResult {
                        app_id,
                        status: PatchStatus::Success,
                        message: String::new(),
                    });
                }
                Err(err) => {
                    tracing::debug!(app_id, env_id, error = %err, "ci material patch rejected");
                    response.apps.push(CiMaterialPatchResult {
                        app_id,
                        status: patch_status(err.kind()),
                        message: err.to_string(),
                    });
                }
            }
        }
        if accepted.is_empty() {
            return Ok(response);
        }

        let tx = self.db.pool.begin().await?;
        let mut ids = Vec::with_capacity(accepted.len());
        for material in accepted {
            ids.push(CiPipelineMaterial::update(&tx, material).await?.id);
        }
        self.registrar.save_pipeline_materials(&tx, 0, ids).await?;
        tx.commit().await?;

        self.registrar.flush().await;
        Ok(response)
    }

    /// Replaces the source rule of the CI material behind `(app_id, env_id)`.
    pub async fn patch_ci_material_source(
        &self,
        app_id: i64,
        env_id: i64,
        source: SourceRequest,
        user_id: i64,
    ) -> Result<ci_pipeline_material::Model> {
        let audit = Audit::now(user_id);
        let (pipeline, mut material) = find_unique_material(&self.db.pool, app_id, env_id).await?;
        let source = normalize_source(&source)?;
        material.source_type = source.source_type;
        material.value = source.value;
        material.regex = source.regex;
        material.is_regex = source.is_regex;
        material.updated_by = audit.user_id;
        material.updated_at = audit.at;

        let tx = self.db.pool.begin().await?;
        let material = CiPipelineMaterial::update(&tx, material).await?;
        self.registrar
            .save_pipeline_materials(&tx, pipeline.id, vec![material.id])
            .await?;
        tx.commit().await?;

        self.registrar.flush().await;
        Ok(material)
    }
}
