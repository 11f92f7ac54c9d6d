use std::collections::HashMap;

use db::{
    ConnectionTrait,
    entities::pipeline_stage,
    models::{
        Audit,
        pipeline_stage::{
            NewCondition, NewScript, NewScriptMapping, NewStage, NewStep, NewVariable,
            PipelineStage, StageOwner,
        },
    },
    types::{ScriptMappingType, StageType, StepType, StepVariableType, VariableFormat},
};

use super::{
    types::{StageRequest, StepRequest, VariableRequest},
    validation::validate_stage,
};
use crate::services::error::{PipelineError, Result};

/// Persists structured stages. Steps are never edited in place: an update
/// soft-deletes the stage's steps and writes the request's steps afresh.
pub struct StageStore;

impl StageStore {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        owner: StageOwner,
        stage_type: StageType,
        request: &StageRequest,
        audit: Audit,
    ) -> Result<pipeline_stage::Model> {
        validate_stage(stage_type, request)?;
        let stage = PipelineStage::create(
            db,
            NewStage {
                owner,
                stage_type,
                name: request.name.clone(),
                description: request.description.clone(),
                trigger_type: request.trigger_type.clone(),
            },
            audit,
        )
        .await?;
        Self::create_steps(db, stage.id, &request.steps, audit).await?;
        Ok(stage)
    }

    /// Brings one stage in line with `request`. An empty request removes the
    /// stage; a stage without live steps is treated as corrupt and rebuilt.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        owner: StageOwner,
        stage_type: StageType,
        request: &StageRequest,
        audit: Audit,
    ) -> Result<Option<pipeline_stage::Model>> {
        let existing = PipelineStage::find_by_owner_and_type(db, owner, stage_type).await?;
        let Some(mut stage) = existing else {
            if request.is_empty() {
                return Ok(None);
            }
            return Self::create(db, owner, stage_type, request, audit)
                .await
                .map(Some);
        };

        if request.is_empty() {
            PipelineStage::mark_deleted(db, stage.id, audit).await?;
            return Ok(None);
        }

        validate_stage(stage_type, request)?;
        if PipelineStage::find_active_steps(db, stage.id).await?.is_empty() {
            tracing::warn!(stage_id = stage.id, "stage has no active steps, recreating");
            PipelineStage::mark_deleted(db, stage.id, audit).await?;
            return Self::create(db, owner, stage_type, request, audit)
                .await
                .map(Some);
        }

        stage.name = request.name.clone();
        stage.description = request.description.clone();
        stage.trigger_type = request.trigger_type.clone();
        let stage = PipelineStage::update(db, stage, audit).await?;
        PipelineStage::mark_steps_deleted(db, stage.id, audit).await?;
        Self::create_steps(db, stage.id, &request.steps, audit).await?;
        Ok(Some(stage))
    }

    pub async fn delete_all<C: ConnectionTrait>(
        db: &C,
        owner: StageOwner,
        audit: Audit,
    ) -> Result<()> {
        for stage in PipelineStage::find_by_owner(db, owner).await? {
            PipelineStage::mark_deleted(db, stage.id, audit).await?;
        }
        Ok(())
    }

    async fn create_steps<C: ConnectionTrait>(
        db: &C,
        stage_id: i64,
        steps: &[StepRequest],
        audit: Audit,
    ) -> Result<()> {
        let mut ordered: Vec<&StepRequest> = steps.iter().collect();
        ordered.sort_by_key(|step| step.index);
        let names_by_index: HashMap<i32, &str> = ordered
            .iter()
            .map(|step| (step.index, step.name.as_str()))
            .collect();

        for step in ordered {
            let dependent_on_step = names_by_index
                .get(&(step.index - 1))
                .map(|name| name.to_string())
                .unwrap_or_default();
            let (script_id, ref_plugin_id) = match step.step_type {
                StepType::Inline => (Some(Self::create_script(db, step, audit).await?), None),
                StepType::RefPlugin => (
                    None,
                    step.plugin_ref_step_detail
                        .as_ref()
                        .map(|detail| detail.plugin_id),
                ),
            };

            let created = PipelineStage::create_step(
                db,
                NewStep {
                    pipeline_stage_id: stage_id,
                    step_type: step.step_type,
                    name: step.name.clone(),
                    description: step.description.clone(),
                    index: step.index,
                    output_directory_path: step.output_directory_path.clone(),
                    dependent_on_step,
                    script_id,
                    ref_plugin_id,
                    trigger_if_parent_stage_fail: step.trigger_if_parent_stage_fail,
                },
                audit,
            )
            .await?;

            let mut variable_ids = HashMap::new();
            for (variable, direction) in step
                .input_variables()
                .iter()
                .map(|v| (v, StepVariableType::Input))
                .chain(
                    step.output_variables()
                        .iter()
                        .map(|v| (v, StepVariableType::Output)),
                )
            {
                let saved =
                    PipelineStage::create_variable(db, created.id, new_variable(variable, direction)?, audit)
                        .await?;
                variable_ids.insert(saved.name.clone(), saved.id);
            }

            for condition in step.conditions() {
                let condition_variable_id = variable_ids
                    .get(&condition.condition_on_variable)
                    .copied()
                    .ok_or_else(|| {
                        PipelineError::invalid(format!(
                            "condition in step '{}' references unknown variable '{}'",
                            step.name, condition.condition_on_variable
                        ))
                    })?;
                PipelineStage::create_condition(
                    db,
                    created.id,
                    NewCondition {
                        condition_variable_id,
                        condition_type: condition.condition_type,
                        conditional_operator: condition.conditional_operator.clone(),
                        conditional_value: condition.conditional_value.clone(),
                    },
                    audit,
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn create_script<C: ConnectionTrait>(
        db: &C,
        step: &StepRequest,
        audit: Audit,
    ) -> Result<i64> {
        let detail = step.inline_step_detail.clone().unwrap_or_default();
        let script = PipelineStage::create_script(
            db,
            NewScript {
                script: detail.script,
                store_script_at: detail.store_script_at,
                script_type: detail.script_type,
                mount_path: String::new(),
                mount_code_to_container: detail.mount_code_to_container,
                mount_code_to_container_path: detail.mount_code_to_container_path,
                mount_directory_from_host: detail.mount_directory_from_host,
                container_image_path: detail.container_image_path,
            },
            audit,
        )
        .await?;

        let mut mappings = Vec::new();
        for mount in detail.mount_path_map {
            mappings.push(NewScriptMapping {
                type_of_mapping: ScriptMappingType::FilePath,
                file_path_on_disk: mount.file_path_on_disk,
                file_path_on_container: mount.file_path_on_container,
                command: String::new(),
                args: Vec::new(),
                port_on_local: 0,
                port_on_container: 0,
            });
        }
        for command in detail.command_args_map {
            mappings.push(NewScriptMapping {
                type_of_mapping: ScriptMappingType::DockerArg,
                file_path_on_disk: String::new(),
                file_path_on_container: String::new(),
                command: command.command,
                args: command.args,
                port_on_local: 0,
                port_on_container: 0,
            });
        }
        for port in detail.port_map {
            mappings.push(NewScriptMapping {
                type_of_mapping: ScriptMappingType::Port,
                file_path_on_disk: String::new(),
                file_path_on_container: String::new(),
                command: String::new(),
                args: Vec::new(),
                port_on_local: port.port_on_local,
                port_on_container: port.port_on_container,
            });
        }
        if !mappings.is_empty() {
            PipelineStage::create_script_mappings(db, script.id, &mappings, audit).await?;
        }
        Ok(script.id)
    }
}

fn new_variable(variable: &VariableRequest, direction: StepVariableType) -> Result<NewVariable> {
    let format: VariableFormat = variable.format.parse().map_err(|_| {
        PipelineError::invalid(format!(
            "variable '{}' has invalid format '{}'",
            variable.name, variable.format
        ))
    })?;
    Ok(NewVariable {
        name: variable.name.clone(),
        format,
        description: variable.description.clone(),
        is_exposed: variable.is_exposed,
        allow_empty_value: variable.allow_empty_value,
        default_value: variable.default_value.clone(),
        value: variable.value.clone(),
        variable_type: direction,
        value_type: variable.value_type,
        previous_step_index: (variable.previous_step_index > 0)
            .then_some(variable.previous_step_index),
        variable_step_index_in_plugin: (variable.variable_step_index_in_plugin > 0)
            .then_some(variable.variable_step_index_in_plugin),
        reference_variable_name: variable.reference_variable_name.clone(),
        reference_variable_stage: variable.reference_variable_stage,
    })
}

#[cfg(test)]
mod tests {
    use db::types::{ConditionType, ScriptType, TriggerType};

    use super::*;
    use crate::services::pipeline_stage::types::{ConditionRequest, InlineStepDetail};

    fn shell_step(index: i32, name: &str) -> StepRequest {
        StepRequest {
            id: 0,
            name: name.to_string(),
            description: String::new(),
            index,
            step_type: StepType::Inline,
            output_directory_path: Vec::new(),
            inline_step_detail: Some(InlineStepDetail {
                script_type: ScriptType::Shell,
                script: format!("echo {name}"),
                input_variables: vec![VariableRequest {
                    name: "RETRIES".to_string(),
                    format: "NUMBER".to_string(),
                    value: "3".to_string(),
                    ..Default::default()
                }],
                condition_details: vec![ConditionRequest {
                    id: 0,
                    condition_on_variable: "RETRIES".to_string(),
                    condition_type: ConditionType::Trigger,
                    conditional_operator: ">".to_string(),
                    conditional_value: "0".to_string(),
                }],
                ..Default::default()
            }),
            plugin_ref_step_detail: None,
            trigger_if_parent_stage_fail: false,
        }
    }

    fn request(names: &[&str]) -> StageRequest {
        StageRequest {
            name: "pre".to_string(),
            trigger_type: TriggerType::Automatic,
            steps: names
                .iter()
                .enumerate()
                .map(|(i, name)| shell_step(i as i32 + 1, name))
                .collect(),
            ..Default::default()
        }
    }

    async fn assert_chain(db: &db::DatabaseConnection, stage_id: i64, expected: &[&str]) {
        let steps = PipelineStage::find_active_steps(db, stage_id).await.unwrap();
        let indices: Vec<i32> = steps.iter().map(|s| s.index).collect();
        let expected_indices: Vec<i32> = (1..=expected.len() as i32).collect();
        assert_eq!(indices, expected_indices);
        for (position, step) in steps.iter().enumerate() {
            assert_eq!(step.name, expected[position]);
            let previous = if position == 0 { "" } else { expected[position - 1] };
            assert_eq!(step.dependent_on_step, previous);
        }
    }

    #[tokio::test]
    async fn steps_chain_by_index_across_updates() {
        let db = test_support::setup_db().await;
        let owner = StageOwner::Ci(9);
        let audit = Audit::now(1);

        let stage = StageStore::create(
            &db,
            owner,
            StageType::PreCi,
            &request(&["lint", "test"]),
            audit,
        )
        .await
        .unwrap();
        assert_chain(&db, stage.id, &["lint", "test"]).await;

        let step = &PipelineStage::find_active_steps(&db, stage.id).await.unwrap()[0];
        let variables = PipelineStage::find_variables(&db, step.id).await.unwrap();
        let conditions = PipelineStage::find_conditions(&db, step.id).await.unwrap();
        assert_eq!(conditions[0].condition_variable_id, variables[0].id);

        let updated = StageStore::update(
            &db,
            owner,
            StageType::PreCi,
            &request(&["fmt", "lint", "test"]),
            Audit::now(2),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.id, stage.id);
        assert_chain(&db, stage.id, &["fmt", "lint", "test"]).await;
    }

    #[tokio::test]
    async fn empty_request_deletes_stage() {
        let db = test_support::setup_db().await;
        let owner = StageOwner::Cd(4);
        let audit = Audit::now(1);
        StageStore::create(&db, owner, StageType::PreCd, &request(&["a"]), audit)
            .await
            .unwrap();

        let result = StageStore::update(&db, owner, StageType::PreCd, &StageRequest::default(), audit)
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(PipelineStage::find_by_owner(&db, owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stage_without_steps_is_recreated() {
        let db = test_support::setup_db().await;
        let owner = StageOwner::Ci(5);
        let audit = Audit::now(1);
        let stage = StageStore::create(&db, owner, StageType::PostCi, &request(&["a"]), audit)
            .await
            .unwrap();
        PipelineStage::mark_steps_deleted(&db, stage.id, audit)
            .await
            .unwrap();

        let rebuilt = StageStore::update(&db, owner, StageType::PostCi, &request(&["b"]), audit)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(rebuilt.id, stage.id);
        assert_chain(&db, rebuilt.id, &["b"]).await;
        assert_eq!(PipelineStage::find_by_owner(&db, owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_request_writes_nothing() {
        let db = test_support::setup_db().await;
        let owner = StageOwner::Ci(6);
        let mut bad = request(&["a", "b"]);
        bad.steps[1].index = 5;
        let err = StageStore::create(&db, owner, StageType::PreCi, &bad, Audit::now(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Invalid(_)));
        assert!(PipelineStage::find_by_owner(&db, owner).await.unwrap().is_empty());
    }
}
