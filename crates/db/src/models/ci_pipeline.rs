use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use sea_orm::sea_query::Expr;

use super::Audit;
use crate::{
    entities::{
        ci_env_mapping, ci_pipeline, ci_pipeline_material, ci_pipeline_script,
        external_ci_pipeline,
    },
    types::{CiPipelineType, DockerArgs, SourceType, StageType},
};

#[derive(Debug, Clone)]
pub struct NewCiPipeline {
    pub app_id: i64,
    pub name: String,
    pub pipeline_type: CiPipelineType,
    pub is_manual: bool,
    pub is_external: bool,
    pub is_docker_config_overridden: bool,
    pub parent_ci_pipeline_id: i64,
    pub docker_args: DockerArgs,
    pub scan_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct NewCiPipelineMaterial {
    pub ci_pipeline_id: i64,
    pub git_material_id: i64,
    pub source_type: SourceType,
    pub value: String,
    pub regex: String,
    pub is_regex: bool,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewCiScript {
    pub name: String,
    pub index: i32,
    pub stage: StageType,
    pub script: String,
    pub output_location: String,
}

pub struct CiPipeline;

impl CiPipeline {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: NewCiPipeline,
        audit: Audit,
    ) -> Result<ci_pipeline::Model, DbErr> {
        ci_pipeline::ActiveModel {
            app_id: Set(data.app_id),
            name: Set(data.name),
            pipeline_type: Set(data.pipeline_type),
            is_manual: Set(data.is_manual),
            is_external: Set(data.is_external),
            is_docker_config_overridden: Set(data.is_docker_config_overridden),
            parent_ci_pipeline_id: Set(data.parent_ci_pipeline_id),
            docker_args: Set(data.docker_args),
            scan_enabled: Set(data.scan_enabled),
            active: Set(true),
            deleted: Set(false),
            created_by: Set(audit.user_id),
            updated_by: Set(audit.user_id),
            created_at: Set(audit.at),
            updated_at: Set(audit.at),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<ci_pipeline::Model, DbErr> {
        ci_pipeline::Entity::find_by_id(id)
            .filter(ci_pipeline::Column::Deleted.eq(false))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("CI pipeline not found".to_string()))
    }

    pub async fn find_active_by_app<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
    ) -> Result<Vec<ci_pipeline::Model>, DbErr> {
        ci_pipeline::Entity::find()
            .filter(ci_pipeline::Column::AppId.eq(app_id))
            .filter(ci_pipeline::Column::Active.eq(true))
            .filter(ci_pipeline::Column::Deleted.eq(false))
            .order_by_asc(ci_pipeline::Column::Id)
            .all(db)
            .await
    }

    pub async fn find_active_by_ids<C: ConnectionTrait>(
        db: &C,
        ids: &[i64],
    ) -> Result<Vec<ci_pipeline::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        ci_pipeline::Entity::find()
            .filter(ci_pipeline::Column::Id.is_in(ids.iter().copied()))
            .filter(ci_pipeline::Column::Active.eq(true))
            .filter(ci_pipeline::Column::Deleted.eq(false))
            .order_by_asc(ci_pipeline::Column::Id)
            .all(db)
            .await
    }

    /// Linked copies whose materials mirror `parent_id`.
    pub async fn find_by_parent_ci_pipeline_id<C: ConnectionTrait>(
        db: &C,
        parent_id: i64,
    ) -> Result<Vec<ci_pipeline::Model>, DbErr> {
        ci_pipeline::Entity::find()
            .filter(ci_pipeline::Column::ParentCiPipelineId.eq(parent_id))
            .filter(ci_pipeline::Column::Active.eq(true))
            .filter(ci_pipeline::Column::Deleted.eq(false))
            .order_by_asc(ci_pipeline::Column::Id)
            .all(db)
            .await
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        model: ci_pipeline::Model,
        audit: Audit,
    ) -> Result<ci_pipeline::Model, DbErr> {
        let mut active: ci_pipeline::ActiveModel = model.clone().into();
        active.name = Set(model.name);
        active.pipeline_type = Set(model.pipeline_type);
        active.is_manual = Set(model.is_manual);
        active.is_external = Set(model.is_external);
        active.is_docker_config_overridden = Set(model.is_docker_config_overridden);
        active.parent_ci_pipeline_id = Set(model.parent_ci_pipeline_id);
        active.docker_args = Set(model.docker_args);
        active.scan_enabled = Set(model.scan_enabled);
        active.updated_by = Set(audit.user_id);
        active.updated_at = Set(audit.at);
        active.update(db).await
    }

    pub async fn mark_deleted<C: ConnectionTrait>(
        db: &C,
        id: i64,
        audit: Audit,
    ) -> Result<(), DbErr> {
        ci_pipeline::Entity::update_many()
            .col_expr(ci_pipeline::Column::Active, Expr::value(false))
            .col_expr(ci_pipeline::Column::Deleted, Expr::value(true))
            .col_expr(ci_pipeline::Column::UpdatedBy, Expr::value(audit.user_id))
            .col_expr(ci_pipeline::Column::UpdatedAt, Expr::value(audit.at))
            .filter(ci_pipeline::Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }
}

pub struct CiPipelineMaterial;

impl CiPipelineMaterial {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: NewCiPipelineMaterial,
        audit: Audit,
    ) -> Result<ci_pipeline_material::Model, DbErr> {
        ci_pipeline_material::ActiveModel {
            ci_pipeline_id: Set(data.ci_pipeline_id),
            git_material_id: Set(data.git_material_id),
            source_type: Set(data.source_type),
            value: Set(data.value),
            regex: Set(data.regex),
            is_regex: Set(data.is_regex),
            active: Set(data.active),
            created_by: Set(audit.user_id),
            updated_by: Set(audit.user_id),
            created_at: Set(audit.at),
            updated_at: Set(audit.at),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Persists `model` as-is, including its audit columns; callers decide
    /// which creation stamps to preserve.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        model: ci_pipeline_material::Model,
    ) -> Result<ci_pipeline_material::Model, DbErr> {
        let mut active: ci_pipeline_material::ActiveModel = model.clone().into();
        active.git_material_id = Set(model.git_material_id);
        active.source_type = Set(model.source_type);
        active.value = Set(model.value);
        active.regex = Set(model.regex);
        active.is_regex = Set(model.is_regex);
        active.active = Set(model.active);
        active.created_by = Set(model.created_by);
        active.created_at = Set(model.created_at);
        active.updated_by = Set(model.updated_by);
        active.updated_at = Set(model.updated_at);
        active.update(db).await
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<ci_pipeline_material::Model, DbErr> {
        ci_pipeline_material::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound(
                "CI pipeline material not found".to_string(),
            ))
    }

    pub async fn find_by_ids<C: ConnectionTrait>(
        db: &C,
        ids: &[i64],
    ) -> Result<Vec<ci_pipeline_material::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        ci_pipeline_material::Entity::find()
            .filter(ci_pipeline_material::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(ci_pipeline_material::Column::Id)
            .all(db)
            .await
    }

    pub async fn find_by_pipeline<C: ConnectionTrait>(
        db: &C,
        ci_pipeline_id: i64,
    ) -> Result<Vec<ci_pipeline_material::Model>, DbErr> {
        ci_pipeline_material::Entity::find()
            .filter(ci_pipeline_material::Column::CiPipelineId.eq(ci_pipeline_id))
            .order_by_asc(ci_pipeline_material::Column::Id)
            .all(db)
            .await
    }

    pub async fn find_active_by_pipeline<C: ConnectionTrait>(
        db: &C,
        ci_pipeline_id: i64,
    ) -> Result<Vec<ci_pipeline_material::Model>, DbErr> {
        ci_pipeline_material::Entity::find()
            .filter(ci_pipeline_material::Column::CiPipelineId.eq(ci_pipeline_id))
            .filter(ci_pipeline_material::Column::Active.eq(true))
            .order_by_asc(ci_pipeline_material::Column::Id)
            .all(db)
            .await
    }

    pub async fn deactivate_by_pipeline<C: ConnectionTrait>(
        db: &C,
        ci_pipeline_id: i64,
        audit: Audit,
    ) -> Result<Vec<ci_pipeline_material::Model>, DbErr> {
        ci_pipeline_material::Entity::update_many()
            .col_expr(ci_pipeline_material::Column::Active, Expr::value(false))
            .col_expr(
                ci_pipeline_material::Column::UpdatedBy,
                Expr::value(audit.user_id),
            )
            .col_expr(ci_pipeline_material::Column::UpdatedAt, Expr::value(audit.at))
            .filter(ci_pipeline_material::Column::CiPipelineId.eq(ci_pipeline_id))
            .exec(db)
            .await?;
        Self::find_by_pipeline(db, ci_pipeline_id).await
    }
}

pub struct CiEnvMapping;

impl CiEnvMapping {
    pub async fn find_by_pipeline<C: ConnectionTrait>(
        db: &C,
        ci_pipeline_id: i64,
    ) -> Result<Option<ci_env_mapping::Model>, DbErr> {
        ci_env_mapping::Entity::find()
            .filter(ci_env_mapping::Column::CiPipelineId.eq(ci_pipeline_id))
            .filter(ci_env_mapping::Column::Deleted.eq(false))
            .one(db)
            .await
    }

    /// Creates the mapping or repoints the existing one at `environment_id`.
    pub async fn upsert<C: ConnectionTrait>(
        db: &C,
        ci_pipeline_id: i64,
        environment_id: i64,
        audit: Audit,
    ) -> Result<ci_env_mapping::Model, DbErr> {
        match Self::find_by_pipeline(db, ci_pipeline_id).await? {
            Some(existing) => {
                let mut active: ci_env_mapping::ActiveModel = existing.into();
                active.environment_id = Set(environment_id);
                active.updated_by = Set(audit.user_id);
                active.updated_at = Set(audit.at);
                active.update(db).await
            }
            None => {
                ci_env_mapping::ActiveModel {
                    ci_pipeline_id: Set(ci_pipeline_id),
                    environment_id: Set(environment_id),
                    deleted: Set(false),
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

    pub async fn mark_deleted<C: ConnectionTrait>(
        db: &C,
        ci_pipeline_id: i64,
        audit: Audit,
    ) -> Result<(), DbErr> {
        ci_env_mapping::Entity::update_many()
            .col_expr(ci_env_mapping::Column::Deleted, Expr::value(true))
            .col_expr(ci_env_mapping::Column::UpdatedBy, Expr::value(audit.user_id))
            .col_expr(ci_env_mapping::Column::UpdatedAt, Expr::value(audit.at))
            .filter(ci_env_mapping::Column::CiPipelineId.eq(ci_pipeline_id))
            .exec(db)
            .await?;
        Ok(())
    }
}

/// Scripts of pipelines created before structured stages existed.
pub struct CiPipelineScript;

impl CiPipelineScript {
    pub async fn create_all<C: ConnectionTrait>(
        db: &C,
        ci_pipeline_id: i64,
        scripts: &[NewCiScript],
        audit: Audit,
    ) -> Result<(), DbErr> {
        for script in scripts {
            ci_pipeline_script::ActiveModel {
                ci_pipeline_id: Set(ci_pipeline_id),
                name: Set(script.name.clone()),
                index: Set(script.index),
                stage: Set(script.stage),
                script: Set(script.script.clone()),
                output_location: Set(script.output_location.clone()),
                active: Set(true),
                created_by: Set(audit.user_id),
                updated_by: Set(audit.user_id),
                created_at: Set(audit.at),
                updated_at: Set(audit.at),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
        Ok(())
    }

    pub async fn find_active_by_pipeline<C: ConnectionTrait>(
        db: &C,
        ci_pipeline_id: i64,
    ) -> Result<Vec<ci_pipeline_script::Model>, DbErr> {
        ci_pipeline_script::Entity::find()
            .filter(ci_pipeline_script::Column::CiPipelineId.eq(ci_pipeline_id))
            .filter(ci_pipeline_script::Column::Active.eq(true))
            .order_by_asc(ci_pipeline_script::Column::Index)
            .all(db)
            .await
    }

    pub async fn deactivate_by_pipeline<C: ConnectionTrait>(
        db: &C,
        ci_pipeline_id: i64,
        audit: Audit,
    ) -> Result<(), DbErr> {
        ci_pipeline_script::Entity::update_many()
            .col_expr(ci_pipeline_script::Column::Active, Expr::value(false))
            .col_expr(
                ci_pipeline_script::Column::UpdatedBy,
                Expr::value(audit.user_id),
            )
            .col_expr(ci_pipeline_script::Column::UpdatedAt, Expr::value(audit.at))
            .filter(ci_pipeline_script::Column::CiPipelineId.eq(ci_pipeline_id))
            .exec(db)
            .await?;
        Ok(())
    }
}

/// Webhook-fed CI entry points that sit at the root of a workflow.
pub struct ExternalCiPipeline;

impl ExternalCiPipeline {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
        access_token: &str,
        audit: Audit,
    ) -> Result<external_ci_pipeline::Model, DbErr> {
        external_ci_pipeline::ActiveModel {
            app_id: Set(app_id),
            access_token: Set(access_token.to_string()),
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

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<external_ci_pipeline::Model>, DbErr> {
        external_ci_pipeline::Entity::find_by_id(id).one(db).await
    }

    pub async fn deactivate<C: ConnectionTrait>(
        db: &C,
        id: i64,
        audit: Audit,
    ) -> Result<(), DbErr> {
        external_ci_pipeline::Entity::update_many()
            .col_expr(external_ci_pipeline::Column::Active, Expr::value(false))
            .col_expr(
                external_ci_pipeline::Column::UpdatedBy,
                Expr::value(audit.user_id),
            )
            .col_expr(
                external_ci_pipeline::Column::UpdatedAt,
                Expr::value(audit.at),
            )
            .filter(external_ci_pipeline::Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }
}
