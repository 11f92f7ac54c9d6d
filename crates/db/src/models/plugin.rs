use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use super::{
    Audit,
    pipeline_stage::{NewCondition, NewVariable},
};
use crate::{
    entities::{plugin_metadata, plugin_step, plugin_step_condition, plugin_step_variable},
    types::{StepType, StringList},
};

#[derive(Debug, Clone)]
pub struct NewPluginStep {
    pub plugin_id: i64,
    pub name: String,
    pub description: String,
    pub index: i32,
    pub step_type: StepType,
    pub script_id: Option<i64>,
    pub ref_plugin_id: Option<i64>,
    pub output_directory_path: Vec<String>,
    pub dependent_on_step: String,
}

/// Reusable step graphs referenced by `RefPlugin` steps.
pub struct Plugin;

impl Plugin {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        name: &str,
        description: &str,
        plugin_type: &str,
        audit: Audit,
    ) -> Result<plugin_metadata::Model, DbErr> {
        plugin_metadata::ActiveModel {
            name: Set(name.to_string()),
            description: Set(description.to_string()),
            plugin_type: Set(plugin_type.to_string()),
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
    ) -> Result<plugin_metadata::Model, DbErr> {
        plugin_metadata::Entity::find_by_id(id)
            .filter(plugin_metadata::Column::Deleted.eq(false))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Plugin not found".to_string()))
    }

    pub async fn create_step<C: ConnectionTrait>(
        db: &C,
        data: NewPluginStep,
        audit: Audit,
    ) -> Result<plugin_step::Model, DbErr> {
        plugin_step::ActiveModel {
            plugin_id: Set(data.plugin_id),
            name: Set(data.name),
            description: Set(data.description),
            index: Set(data.index),
            step_type: Set(data.step_type),
            script_id: Set(data.script_id),
            ref_plugin_id: Set(data.ref_plugin_id),
            output_directory_path: Set(StringList(data.output_directory_path)),
            dependent_on_step: Set(data.dependent_on_step),
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

    pub async fn find_steps<C: ConnectionTrait>(
        db: &C,
        plugin_id: i64,
    ) -> Result<Vec<plugin_step::Model>, DbErr> {
        plugin_step::Entity::find()
            .filter(plugin_step::Column::PluginId.eq(plugin_id))
            .filter(plugin_step::Column::Deleted.eq(false))
            .order_by_asc(plugin_step::Column::Index)
            .all(db)
            .await
    }

    pub async fn create_variable<C: ConnectionTrait>(
        db: &C,
        plugin_step_id: i64,
        data: NewVariable,
        audit: Audit,
    ) -> Result<plugin_step_variable::Model, DbErr> {
        plugin_step_variable::ActiveModel {
            plugin_step_id: Set(plugin_step_id),
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
        plugin_step_id: i64,
    ) -> Result<Vec<plugin_step_variable::Model>, DbErr> {
        plugin_step_variable::Entity::find()
            .filter(plugin_step_variable::Column::PluginStepId.eq(plugin_step_id))
            .filter(plugin_step_variable::Column::Deleted.eq(false))
            .order_by_asc(plugin_step_variable::Column::Id)
            .all(db)
            .await
    }

    pub async fn create_condition<C: ConnectionTrait>(
        db: &C,
        plugin_step_id: i64,
        data: NewCondition,
        audit: Audit,
    ) -> Result<plugin_step_condition::Model, DbErr> {
        plugin_step_condition::ActiveModel {
            plugin_step_id: Set(plugin_step_id),
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
        plugin_step_id: i64,
    ) -> Result<Vec<plugin_step_condition::Model>, DbErr> {
        plugin_step_condition::Entity::find()
            .filter(plugin_step_condition::Column::PluginStepId.eq(plugin_step_id))
            .filter(plugin_step_condition::Column::Deleted.eq(false))
            .order_by_asc(plugin_step_condition::Column::Id)
            .all(db)
            .await
    }
}
