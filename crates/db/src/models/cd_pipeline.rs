use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use sea_orm::sea_query::Expr;

use super::Audit;
use crate::{
    entities::{cd_pipeline, pre_post_cd_script_history},
    types::{CmCsNames, DeploymentAppType, StageType, TriggerType},
};

#[derive(Debug, Clone)]
pub struct NewCdPipeline {
    pub app_id: i64,
    pub environment_id: i64,
    pub name: String,
    pub ci_pipeline_id: i64,
    pub trigger_type: TriggerType,
    pub pre_stage_config: String,
    pub post_stage_config: String,
    pub pre_trigger_type: TriggerType,
    pub post_trigger_type: TriggerType,
    pub pre_stage_cm_cs_names: CmCsNames,
    pub post_stage_cm_cs_names: CmCsNames,
    pub run_pre_stage_in_env: bool,
    pub run_post_stage_in_env: bool,
    pub deployment_app_type: DeploymentAppType,
    pub deployment_app_name: String,
}

/// Scope of a bulk deployment-type operation within one environment.
#[derive(Debug, Clone, Default)]
pub struct AppScope {
    pub exclude_app_ids: Vec<i64>,
    pub include_app_ids: Vec<i64>,
}

pub struct CdPipeline;

impl CdPipeline {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: NewCdPipeline,
        audit: Audit,
    ) -> Result<cd_pipeline::Model, DbErr> {
        cd_pipeline::ActiveModel {
            app_id: Set(data.app_id),
            environment_id: Set(data.environment_id),
            name: Set(data.name),
            ci_pipeline_id: Set(data.ci_pipeline_id),
            trigger_type: Set(data.trigger_type),
            pre_stage_config: Set(data.pre_stage_config),
            post_stage_config: Set(data.post_stage_config),
            pre_trigger_type: Set(data.pre_trigger_type),
            post_trigger_type: Set(data.post_trigger_type),
            pre_stage_cm_cs_names: Set(data.pre_stage_cm_cs_names),
            post_stage_cm_cs_names: Set(data.post_stage_cm_cs_names),
            run_pre_stage_in_env: Set(data.run_pre_stage_in_env),
            run_post_stage_in_env: Set(data.run_post_stage_in_env),
            deployment_app_type: Set(data.deployment_app_type),
            deployment_app_name: Set(data.deployment_app_name),
            deployment_app_created: Set(false),
            deployment_app_delete_request: Set(false),
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
    ) -> Result<cd_pipeline::Model, DbErr> {
        cd_pipeline::Entity::find_by_id(id)
            .filter(cd_pipeline::Column::Deleted.eq(false))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("CD pipeline not found".to_string()))
    }

    pub async fn find_active_by_ids<C: ConnectionTrait>(
        db: &C,
        ids: &[i64],
    ) -> Result<Vec<cd_pipeline::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        cd_pipeline::Entity::find()
            .filter(cd_pipeline::Column::Id.is_in(ids.iter().copied()))
            .filter(cd_pipeline::Column::Deleted.eq(false))
            .order_by_asc(cd_pipeline::Column::Id)
            .all(db)
            .await
    }

    pub async fn find_active_by_app_and_env<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
        environment_id: i64,
    ) -> Result<Vec<cd_pipeline::Model>, DbErr> {
        cd_pipeline::Entity::find()
            .filter(cd_pipeline::Column::AppId.eq(app_id))
            .filter(cd_pipeline::Column::EnvironmentId.eq(environment_id))
            .filter(cd_pipeline::Column::Deleted.eq(false))
            .all(db)
            .await
    }

    /// Active pipelines of `environment_id` on `deployment_type`, narrowed
    /// by the include list (when non-empty) and the exclude list.
    pub async fn find_active_by_env_and_deployment_type<C: ConnectionTrait>(
        db: &C,
        environment_id: i64,
        deployment_type: DeploymentAppType,
        scope: &AppScope,
    ) -> Result<Vec<cd_pipeline::Model>, DbErr> {
        let mut query = cd_pipeline::Entity::find()
            .filter(cd_pipeline::Column::EnvironmentId.eq(environment_id))
            .filter(cd_pipeline::Column::DeploymentAppType.eq(deployment_type))
            .filter(cd_pipeline::Column::Deleted.eq(false));
        if !scope.include_app_ids.is_empty() {
            query = query.filter(
                cd_pipeline::Column::AppId.is_in(scope.include_app_ids.iter().copied()),
            );
        }
        if !scope.exclude_app_ids.is_empty() {
            query = query.filter(
                cd_pipeline::Column::AppId.is_not_in(scope.exclude_app_ids.iter().copied()),
            );
        }
        query.order_by_asc(cd_pipeline::Column::Id).all(db).await
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        model: cd_pipeline::Model,
        audit: Audit,
    ) -> Result<cd_pipeline::Model, DbErr> {
        let mut active: cd_pipeline::ActiveModel = model.clone().into();
        active.trigger_type = Set(model.trigger_type);
        active.pre_stage_config = Set(model.pre_stage_config);
        active.post_stage_config = Set(model.post_stage_config);
        active.pre_trigger_type = Set(model.pre_trigger_type);
        active.post_trigger_type = Set(model.post_trigger_type);
        active.pre_stage_cm_cs_names = Set(model.pre_stage_cm_cs_names);
        active.post_stage_cm_cs_names = Set(model.post_stage_cm_cs_names);
        active.run_pre_stage_in_env = Set(model.run_pre_stage_in_env);
        active.run_post_stage_in_env = Set(model.run_post_stage_in_env);
        active.deployment_app_created = Set(model.deployment_app_created);
        active.updated_by = Set(audit.user_id);
        active.updated_at = Set(audit.at);
        active.update(db).await
    }

    pub async fn mark_deleted<C: ConnectionTrait>(
        db: &C,
        id: i64,
        audit: Audit,
    ) -> Result<(), DbErr> {
        cd_pipeline::Entity::update_many()
            .col_expr(cd_pipeline::Column::Deleted, Expr::value(true))
            .col_expr(cd_pipeline::Column::DeploymentAppDeleteRequest, Expr::value(true))
            .col_expr(cd_pipeline::Column::UpdatedBy, Expr::value(audit.user_id))
            .col_expr(cd_pipeline::Column::UpdatedAt, Expr::value(audit.at))
            .filter(cd_pipeline::Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Points `ids` at `deployment_type` and records whether the external
    /// object currently exists there.
    pub async fn update_deployment_app_type<C: ConnectionTrait>(
        db: &C,
        ids: &[i64],
        deployment_type: DeploymentAppType,
        created: bool,
        audit: Audit,
    ) -> Result<u64, DbErr> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = cd_pipeline::Entity::update_many()
            .col_expr(cd_pipeline::Column::DeploymentAppType, Expr::value(deployment_type))
            .col_expr(cd_pipeline::Column::DeploymentAppCreated, Expr::value(created))
            .col_expr(cd_pipeline::Column::UpdatedBy, Expr::value(audit.user_id))
            .col_expr(cd_pipeline::Column::UpdatedAt, Expr::value(audit.at))
            .filter(cd_pipeline::Column::Id.is_in(ids.iter().copied()))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn set_deployment_app_created<C: ConnectionTrait>(
        db: &C,
        ids: &[i64],
        created: bool,
        audit: Audit,
    ) -> Result<u64, DbErr> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = cd_pipeline::Entity::update_many()
            .col_expr(cd_pipeline::Column::DeploymentAppCreated, Expr::value(created))
            .col_expr(cd_pipeline::Column::UpdatedBy, Expr::value(audit.user_id))
            .col_expr(cd_pipeline::Column::UpdatedAt, Expr::value(audit.at))
            .filter(cd_pipeline::Column::Id.is_in(ids.iter().copied()))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn save_script_history<C: ConnectionTrait>(
        db: &C,
        pipeline_id: i64,
        stage: StageType,
        script: &str,
        cm_cs_names: CmCsNames,
        trigger_type: TriggerType,
        exec_in_env: bool,
        audit: Audit,
    ) -> Result<pre_post_cd_script_history::Model, DbErr> {
        pre_post_cd_script_history::ActiveModel {
            pipeline_id: Set(pipeline_id),
            stage: Set(stage),
            script: Set(script.to_string()),
            cm_cs_names: Set(cm_cs_names),
            trigger_type: Set(trigger_type),
            exec_in_env: Set(exec_in_env),
            created_by: Set(audit.user_id),
            created_at: Set(audit.at),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_script_history<C: ConnectionTrait>(
        db: &C,
        pipeline_id: i64,
    ) -> Result<Vec<pre_post_cd_script_history::Model>, DbErr> {
        pre_post_cd_script_history::Entity::find()
            .filter(pre_post_cd_script_history::Column::PipelineId.eq(pipeline_id))
            .order_by_asc(pre_post_cd_script_history::Column::Id)
            .all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_pipeline(app_id: i64, env_id: i64, kind: DeploymentAppType) -> NewCdPipeline {
        NewCdPipeline {
            app_id,
            environment_id: env_id,
            name: format!("cd-{app_id}-{env_id}"),
            ci_pipeline_id: 1,
            trigger_type: TriggerType::Manual,
            pre_stage_config: String::new(),
            post_stage_config: String::new(),
            pre_trigger_type: TriggerType::Manual,
            post_trigger_type: TriggerType::Manual,
            pre_stage_cm_cs_names: CmCsNames::default(),
            post_stage_cm_cs_names: CmCsNames::default(),
            run_pre_stage_in_env: false,
            run_post_stage_in_env: false,
            deployment_app_type: kind,
            deployment_app_name: format!("app{app_id}-env{env_id}"),
        }
    }

    #[tokio::test]
    async fn env_scope_filters_by_type_include_and_exclude() {
        let db = test_support::setup_db().await;
        let audit = Audit::now(1);
        let a = CdPipeline::create(&db, new_pipeline(1, 42, DeploymentAppType::HelmManaged), audit)
            .await
            .unwrap();
        let b = CdPipeline::create(&db, new_pipeline(2, 42, DeploymentAppType::HelmManaged), audit)
            .await
            .unwrap();
        CdPipeline::create(&db, new_pipeline(3, 42, DeploymentAppType::GitOpsManaged), audit)
            .await
            .unwrap();
        CdPipeline::create(&db, new_pipeline(4, 43, DeploymentAppType::HelmManaged), audit)
            .await
            .unwrap();

        let all_helm = CdPipeline::find_active_by_env_and_deployment_type(
            &db,
            42,
            DeploymentAppType::HelmManaged,
            &AppScope::default(),
        )
        .await
        .unwrap();
        assert_eq!(
            all_helm.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![a.id, b.id]
        );

        let scoped = CdPipeline::find_active_by_env_and_deployment_type(
            &db,
            42,
            DeploymentAppType::HelmManaged,
            &AppScope {
                exclude_app_ids: vec![1],
                include_app_ids: vec![1, 2, 3],
            },
        )
        .await
        .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, b.id);
    }

    #[tokio::test]
    async fn deployment_type_update_flips_created_flag() {
        let db = test_support::setup_db().await;
        let audit = Audit::now(1);
        let mut pipeline =
            CdPipeline::create(&db, new_pipeline(1, 42, DeploymentAppType::HelmManaged), audit)
                .await
                .unwrap();
        pipeline.deployment_app_created = true;
        CdPipeline::update(&db, pipeline.clone(), audit).await.unwrap();

        let affected = CdPipeline::update_deployment_app_type(
            &db,
            &[pipeline.id],
            DeploymentAppType::GitOpsManaged,
            false,
            audit,
        )
        .await
        .unwrap();
        assert_eq!(affected, 1);

        let stored = CdPipeline::find_by_id(&db, pipeline.id).await.unwrap();
        assert_eq!(stored.deployment_app_type, DeploymentAppType::GitOpsManaged);
        assert!(!stored.deployment_app_created);

        assert_eq!(
            CdPipeline::update_deployment_app_type(
                &db,
                &[],
                DeploymentAppType::HelmManaged,
                true,
                audit
            )
            .await
            .unwrap(),
            0
        );
    }
}
