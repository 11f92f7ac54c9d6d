use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use sea_orm::sea_query::Expr;

use super::Audit;
use crate::{
    entities::{
        pipeline_stage, pipeline_stage_step, pipeline_stage_step_condition,
        pipeline_stage_step_variable, plugin_pipeline_script, script_path_arg_port_mapping,
    },
    types::{
        ConditionType, ScriptMappingType, ScriptType, StageType, StepType, StepVariableType,
        StringList, TriggerType, ValueType, VariableFormat,
    },
};

/// Pipeline a stage hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOwner {
    Ci(i64),
    Cd(i64),
}

#[derive(Debug, Clone)]
pub struct NewStage {
    pub owner: StageOwner,
    pub stage_type: StageType,
    pub name: String,
    pub description: String,
    pub trigger_type: TriggerType,
}

#[derive(Debug, Clone)]
pub struct NewStep {
    pub pipeline_stage_id: i64,
    pub step_type: StepType,
    pub name: String,
    pub description: String,
    pub index: i32,
    pub output_directory_path: Vec<String>,
    pub dependent_on_step: String,
    pub script_id: Option<i64>,
    pub ref_plugin_id: Option<i64>,
    pub trigger_if_parent_stage_fail: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewScript {
    pub script: String,
    pub store_script_at: String,
    pub script_type: ScriptType,
    pub mount_path: String,
    pub mount_code_to_container: bool,
    pub mount_code_to_container_path: String,
    pub mount_directory_from_host: bool,
    pub container_image_path: String,
}

#[derive(Debug, Clone)]
pub struct NewScriptMapping {
    pub type_of_mapping: ScriptMappingType,
    pub file_path_on_disk: String,
    pub file_path_on_container: String,
    pub command: String,
    pub args: Vec<String>,
    pub port_on_local: i32,
    pub port_on_container: i32,
}

#[derive(Debug, Clone)]
pub struct NewVariable {
    pub name: String,
    pub format: VariableFormat,
    pub description: String,
    pub is_exposed: bool,
    pub allow_empty_value: bool,
    pub default_value: String,
    pub value: String,
    pub variable_type: StepVariableType,
    pub value_type: ValueType,
    pub previous_step_index: Option<i32>,
    pub variable_step_index_in_plugin: Option<i32>,
    pub reference_variable_name: String,
    pub reference_variable_stage: Option<StageType>,
}

#[derive(Debug, Clone)]
pub struct NewCondition {
    pub condition_variable_id: i64,
    pub condition_type: ConditionType,
    pub conditional_operator: String,
    pub conditional_value: String,
}

pub struct PipelineStage;

impl PipelineStage {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: NewStage,
        audit: Audit,
    ) -> Result<pipeline_stage::Model, DbErr> {
        let (ci_pipeline_id, cd_pipeline_id) = match data.owner {
            StageOwner::Ci(id) => (Some(id), None),
            StageOwner::Cd(id) => (None, Some(id)),
        };
        pipeline_stage::ActiveModel {
            ci_pipeline_id: Set(ci_pipeline_id),
            cd_pipeline_id: Set(cd_pipeline_id),
            stage_type: Set(data.stage_type),
            name: Set(data.name),
            description: Set(data.description),
            trigger_type: Set(data.trigger_type),
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

    pub async fn find_by_owner<C: ConnectionTrait>(
        db: &C,
        owner: StageOwner,
    ) -> Result<Vec<pipeline_stage::Model>, DbErr> {
        let owner_filter = match owner {
            StageOwner::Ci(id) => pipeline_stage::Column::CiPipelineId.eq(id),
            StageOwner::Cd(id) => pipeline_stage::Column::CdPipelineId.eq(id),
        };
        pipeline_stage::Entity::find()
            .filter(owner_filter)
            .filter(pipeline_stage::Column::Deleted.eq(false))
            .order_by_asc(pipeline_stage::Column::Id)
            .all(db)
            .await
    }

    pub async fn find_by_owner_and_type<C: ConnectionTrait>(
        db: &C,
        owner: StageOwner,
        stage_type: StageType,
    ) -> Result<Option<pipeline_stage::Model>, DbErr> {
        Ok(Self::find_by_owner(db, owner)
            .await?
            .into_iter()
            .find(|stage| stage.stage_type == stage_type))
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<pipeline_stage::Model, DbErr> {
        pipeline_stage::Entity::find_by_id(id)
            .filter(pipeline_stage::Column::Deleted.eq(false))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Pipeline stage not found".to_string()))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        model: pipeline_stage::Model,
        audit: Audit,
    ) -> Result<pipeline_stage::Model, DbErr> {
        let mut active: pipeline_stage::ActiveModel = model.clone().into();
        active.name = Set(model.name);
        active.description = Set(model.description);
        active.trigger_type = Set(model.trigger_type);
        active.updated_by = Set(audit.user_id);
        active.updated_at = Set(audit.at);
        active.update(db).await
    }

    /// Soft-deletes a stage and everything beneath it.
    pub async fn mark_deleted<C: ConnectionTrait>(
        db: &C,
        stage_id: i64,
        audit: Audit,
    ) -> Result<(), DbErr> {
        Self::mark_steps_deleted(db, stage_id, audit).await?;
        pipeline_stage::Entity::update_many()
            .col_expr(pipeline_stage::Column::Deleted, Expr::value(true))
            .col_expr(pipeline_stage::Column::UpdatedBy, Expr::value(audit.user_id))
            .col_expr(pipeline_stage::Column::UpdatedAt, Expr::value(audit.at))
            .filter(pipeline_stage::Column::Id.eq(stage_id))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Soft-deletes every active step of a stage with its scripts,
    /// mappings, variables and conditions.
    pub async fn mark_steps_deleted<C: ConnectionTrait>(
        db: &C,
        stage_id: i64,
        audit: Audit,
    ) -> Result<(), DbErr> {
        let steps = Self::find_active_steps(db, stage_id).await?;
        if steps.is_empty() {
            return Ok(());
        }
        let step_ids: Vec<i64> = steps.iter().map(|step| step.id).collect();
        let script_ids: Vec<i64> = steps.iter().filter_map(|step| step.script_id).collect();

        pipeline_stage_step_condition::Entity::update_many()
            .col_expr(pipeline_stage_step_condition::Column::Deleted, Expr::value(true))
            .col_expr(
                pipeline_stage_step_condition::Column::UpdatedBy,
                Expr::value(audit.user_id),
            )
            .col_expr(
                pipeline_stage_step_condition::Column::UpdatedAt,
                Expr::value(audit.at),
            )
            .filter(
                pipeline_stage_step_condition::Column::PipelineStageStepId
                    .is_in(step_ids.iter().copied()),
            )
            .exec(db)
            .await?;
        pipeline_stage_step_variable::Entity::update_many()
            .col_expr(pipeline_stage_step_variable::Column::Deleted, Expr::value(true))
            .col_expr(
                pipeline_stage_step_variable::Column::UpdatedBy,
                Expr::value(audit.user_id),
            )
            .col_expr(
                pipeline_stage_step_variable::Column::UpdatedAt,
                Expr::value(audit.at),
            )
            .filter(
                pipeline_stage_step_variable::Column::PipelineStageStepId
                    .is_in(step_ids.iter().copied()),
            )
            .exec(db)
            .await?;
        if !script_ids.is_empty() {
            script_path_arg_port_mapping::Entity::update_many()
                .col_expr(script_path_arg_port_mapping::Column::Deleted, Expr::value(true))
                .col_expr(
                    script_path_arg_port_mapping::Column::UpdatedBy,
                    Expr::value(audit.user_id),
                )
                .col_expr(
                    script_path_arg_port_mapping::Column::UpdatedAt,
                    Expr::value(audit.at),
                )
                .filter(
                    script_path_arg_port_mapping::Column::ScriptId
                        .is_in(script_ids.iter().copied()),
                )
                .exec(db)
                .await?;
            plugin_pipeline_script::Entity::update_many()
                .col_expr(plugin_pipeline_script::Column::Deleted, Expr::value(true))
                .col_expr(
                    plugin_pipeline_script::Column::UpdatedBy,
                    Expr::value(audit.user_id),
                )
                .col_expr(
                    plugin_pipeline_script::Column::UpdatedAt,
                    Expr::value(audit.at),
                )
                .filter(plugin_pipeline_script::Column::Id.is_in(script_ids.iter().copied()))
                .exec(db)
                .await?;
        }
        pipeline_stage_step::Entity::update_many()
            .col_expr(pipeline_stage_step::Column::Deleted, Expr::value(true))
            .col_expr(pipeline_stage_step::Column::UpdatedBy, Expr::value(audit.user_id))
            .col_expr(pipeline_stage_step::Column::UpdatedAt, Expr::value(audit.at))
            .filter(pipeline_stage_step::Column::Id.is_in(step_ids.iter().copied()))
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn create_step<C: ConnectionTrait>(
        db: &C,
        data: NewStep,
        audit: Audit,
    ) -> Result<pipeline_stage_step::Model, DbErr> {
        pipeline_stage_step::ActiveModel {
            pipeline_stage_id: Set(data.pipeline_stage_id),
            step_type: Set(data.step_type),
            name: Set(data.name),
            description: Set(data.description),
            index: Set(data.index),
            output_directory_path: Set(StringList(data.output_directory_path)),
            dependent_on_step: Set(data.dependent_on_step),
            script_id: Set(data.script_id),
            ref_plugin_id: Set(data.ref_plugin_id),
            trigger_if_parent_stage_fail: Set(data.trigger_if_parent_stage_fail),
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

    pub async fn find_active_steps<C: ConnectionTrait>(
        db: &C,
        stage_id: i64,
    ) -> Result<Vec<pipeline_stage_step::Model>, DbErr> {
        pipeline_stage_step::Entity::find()
            .filter(pipeline_stage_step::Column::PipelineStageId.eq(stage_id))
            .filter(pipeline_stage_step::Column::Deleted.eq(false))
            .order_by_asc(pipeline_stage_step::Column::Index)
            .all(db)
            .await
    }

    pub async fn create_script<C: ConnectionTrait>(
        db: &C,
        data: NewScript,
        audit: Audit,
    ) -> Result<plugin_pipeline_script::Model, DbErr> {
        plugin_pipeline_script::ActiveModel {
            script: Set(data.script),
            store_script_at: Set(data.store_script_at),
            script_type: Set(data.script_type),
            mount_path: Set(data.mount_path),
            mount_code_to_container: Set(data.mount_code_to_container),
            mount_code_to_container_path: Set(data.mount_code_to_container_path),
            mount_directory_from_host: Set(data.mount_directory_from_host),
            container_image_path: Set(data.container_image_path),
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

    pub async fn find_script<C: ConnectionTrait>(
        db: &C,
        script_id: i64,
    ) -> Result<plugin_pipeline_script::Model, DbErr> {
        plugin_pipeline_script::Entity::find_by_id(script_id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Script not found".to_string()))
    }

    pub async fn create_script_mappings<C: ConnectionTrait>(
        db: &C,
        script_id: i64,
        mappings: &[NewScriptMapping],
        audit: Audit,
    ) -> Result<(), DbErr> {
        for mapping in mappings {
            script_path_arg_port_mapping::ActiveModel {
                script_id: Set(script_id),
                type_of_mapping: Set(mapping.type_of_mapping),
                file_path_on_disk: Set(mapping.file_path_on_disk.clone()),
                file_path_on_container: Set(mapping.file_path_on_container.clone()),
                command: Set(mapping.command.clone()),
                args: Set(StringList(mapping.args.clone())),
                port_on_local: Set(mapping.port_on_local),
                port_on_container: Set(mapping.port_on_container),
                deleted: Set(false),
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

    pub async fn find_script_mappings<C: ConnectionTrait>(
        db: &C,
        script_id: i64,
    ) -> Result<Vec<script_path_arg_port_mapping::Model>, DbErr> {
        script_path_arg_port_mapping::Entity::find()
            .filter(script_path_arg_port_mapping::Column::ScriptId.eq(script_id))
            .filter(script_path_arg_port_mapping::Column::Deleted.eq(false))
            .order_by_asc(script_path_arg_port_mapping::Column::Id)
            .all(db)
            .await
    }

    pub async fn create_variable<C: ConnectionTrait>(
        db: &C,
        step_id: i64,
        data: NewVariable,
        audit: Audit,
    ) -> Result<pipeline_stage_step_variable::Model, DbErr> {
        pipeline_stage_step_variable::ActiveModel {
            pipeline_stage_step_id: Set(step_id),
            name: Set(data.name),
            format: Set(data.format),
            description: Set(data.description),
            is_exposed: Set(data.is_exposed),
            allow_empty_value: Set(data.allow_empty_value),
            default_value: Set(data.default_value),
            value: Set(data.value),
            variable_type: Set(data.variable_type),
            value_type: Set(data.value_type),
            previous_step_index: Set(data.previous_step_index),
            variable_step_index_in_plugin: Set(data.variable_step_index_in_plugin),
            reference_variable_name: Set(data.reference_variable_name),
            reference_variable_stage: Set(data.reference_variable_stage),
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

    pub async fn find_variables<C: ConnectionTrait>(
        db: &C,
        step_id: i64,
    ) -> Result<Vec<pipeline_stage_step_variable::Model>, DbErr> {
        pipeline_stage_step_variable::Entity::find()
            .filter(pipeline_stage_step_variable::Column::PipelineStageStepId.eq(step_id))
            .filter(pipeline_stage_step_variable::Column::Deleted.eq(false))
            .order_by_asc(pipeline_stage_step_variable::Column::Id)
            .all(db)
            .await
    }

    pub async fn create_condition<C: ConnectionTrait>(
        db: &C,
        step_id: i64,
        data: NewCondition,
        audit: Audit,
    ) -> Result<pipeline_stage_step_condition::Model, DbErr> {
        pipeline_stage_step_condition::ActiveModel {
            pipeline_stage_step_id: Set(step_id),
            condition_variable_id: Set(data.condition_variable_id),
            condition_type: Set(data.condition_type),
            conditional_operator: Set(data.conditional_operator),
            conditional_value: Set(data.conditional_value),
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

    pub async fn find_conditions<C: ConnectionTrait>(
        db: &C,
        step_id: i64,
    ) -> Result<Vec<pipeline_stage_step_condition::Model>, DbErr> {
        pipeline_stage_step_condition::Entity::find()
            .filter(pipeline_stage_step_condition::Column::PipelineStageStepId.eq(step_id))
            .filter(pipeline_stage_step_condition::Column::Deleted.eq(false))
            .order_by_asc(pipeline_stage_step_condition::Column::Id)
            .all(db)
            .await
    }
}
