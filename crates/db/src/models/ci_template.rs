use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};

use super::Audit;
use crate::{
    entities::{ci_template, ci_template_override},
    types::BuildConfig,
};

/// Build template columns shared by the app default and per-pipeline overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    pub docker_registry_id: String,
    pub docker_repository: String,
    pub git_material_id: i64,
    pub build_context_git_material_id: i64,
    pub build_config: BuildConfig,
}

impl From<&ci_template::Model> for TemplateSpec {
    fn from(model: &ci_template::Model) -> Self {
        Self {
            docker_registry_id: model.docker_registry_id.clone(),
            docker_repository: model.docker_repository.clone(),
            git_material_id: model.git_material_id,
            build_context_git_material_id: model.build_context_git_material_id,
            build_config: model.build_config.clone(),
        }
    }
}

impl From<&ci_template_override::Model> for TemplateSpec {
    fn from(model: &ci_template_override::Model) -> Self {
        Self {
            docker_registry_id: model.docker_registry_id.clone(),
            docker_repository: model.docker_repository.clone(),
            git_material_id: model.git_material_id,
            build_context_git_material_id: model.build_context_git_material_id,
            build_config: model.build_config.clone(),
        }
    }
}

pub struct CiTemplate;

impl CiTemplate {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
        spec: TemplateSpec,
        audit: Audit,
    ) -> Result<ci_template::Model, DbErr> {
        ci_template::ActiveModel {
            app_id: Set(app_id),
            docker_registry_id: Set(spec.docker_registry_id),
            docker_repository: Set(spec.docker_repository),
            git_material_id: Set(spec.git_material_id),
            build_context_git_material_id: Set(spec.build_context_git_material_id),
            build_config: Set(spec.build_config),
            active: Set(true),
            created_by: Set(audit.user_id),
            updated_by: Set(audit.user_id),
            created_at: Set(audit.at),
            updated_at: Set(audit.at),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_app<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
    ) -> Result<Option<ci_template::Model>, DbErr> {
        ci_template::Entity::find()
            .filter(ci_template::Column::AppId.eq(app_id))
            .filter(ci_template::Column::Active.eq(true))
            .one(db)
            .await
    }
}

pub struct CiTemplateOverride;

impl CiTemplateOverride {
    pub async fn find_by_pipeline<C: ConnectionTrait>(
        db: &C,
        ci_pipeline_id: i64,
    ) -> Result<Option<ci_template_override::Model>, DbErr> {
        ci_template_override::Entity::find()
            .filter(ci_template_override::Column::CiPipelineId.eq(ci_pipeline_id))
            .filter(ci_template_override::Column::Active.eq(true))
            .one(db)
            .await
    }

    pub async fn upsert<C: ConnectionTrait>(
        db: &C,
        ci_pipeline_id: i64,
        spec: TemplateSpec,
        audit: Audit,
    ) -> Result<ci_template_override::Model, DbErr> {
        match Self::find_by_pipeline(db, ci_pipeline_id).await? {
            Some(existing) => {
                let mut active: ci_template_override::ActiveModel = existing.into();
                active.docker_registry_id = Set(spec.docker_registry_id);
                active.docker_repository = Set(spec.docker_repository);
                active.git_material_id = Set(spec.git_material_id);
                active.build_context_git_material_id = Set(spec.build_context_git_material_id);
                active.build_config = Set(spec.build_config);
                active.updated_by = Set(audit.user_id);
                active.updated_at = Set(audit.at);
                active.update(db).await
            }
            None => {
                ci_template_override::ActiveModel {
                    ci_pipeline_id: Set(ci_pipeline_id),
                    docker_registry_id: Set(spec.docker_registry_id),
                    docker_repository: Set(spec.docker_repository),
                    git_material_id: Set(spec.git_material_id),
                    build_context_git_material_id: Set(spec.build_context_git_material_id),
                    build_config: Set(spec.build_config),
                    active: Set(true),
                    created_by: Set(audit.user_id),
                    updated_by: Set(audit.user_id),
                    created_at: Set(audit.at),
                    updated_at: Set(audit.at),
                    ..Default::default()
                }
                .insert(db)
                .await
            }
        }
    }
}
