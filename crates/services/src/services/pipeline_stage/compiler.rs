use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use db::{
    ConnectionTrait,
    entities::{
        pipeline_stage_step, pipeline_stage_step_condition, pipeline_stage_step_variable,
        plugin_step, plugin_step_condition, plugin_step_variable,
    },
    models::{
        pipeline_stage::{PipelineStage, StageOwner},
        plugin::Plugin,
    },
    types::{
        ConditionType, ScriptMappingType, StageType, StepType, StepVariableType, ValueType,
        VariableFormat,
    },
};
use executors::steps::{
    ConditionObject, MountPath, RefPluginObject, StepObject, VariableKind, VariableObject,
};

use crate::services::error::Result;

const PLUGIN_EXECUTOR_TYPE: &str = "PLUGIN";

/// Executor-ready pre and post steps of one pipeline plus every plugin
/// they reach.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledStages {
    pub pre_steps: Vec<StepObject>,
    pub post_steps: Vec<StepObject>,
    pub ref_plugins: Vec<RefPluginObject>,
}

/// Reads stored stages and plugins back into [`StepObject`]s.
pub struct StageCompiler;

struct StepRow {
    id: i64,
    name: String,
    index: i32,
    step_type: StepType,
    script_id: Option<i64>,
    ref_plugin_id: Option<i64>,
    artifact_paths: Vec<String>,
    trigger_if_parent_stage_fail: bool,
}

impl From<pipeline_stage_step::Model> for StepRow {
    fn from(step: pipeline_stage_step::Model) -> Self {
        Self {
            id: step.id,
            name: step.name,
            index: step.index,
            step_type: step.step_type,
            script_id: step.script_id,
            ref_plugin_id: step.ref_plugin_id,
            artifact_paths: step.output_directory_path.0,
            trigger_if_parent_stage_fail: step.trigger_if_parent_stage_fail,
        }
    }
}

impl From<plugin_step::Model> for StepRow {
    fn from(step: plugin_step::Model) -> Self {
        Self {
            id: step.id,
            name: step.name,
            index: step.index,
            step_type: step.step_type,
            script_id: step.script_id,
            ref_plugin_id: step.ref_plugin_id,
            artifact_paths: step.output_directory_path.0,
            trigger_if_parent_stage_fail: false,
        }
    }
}

struct VariableRow {
    id: i64,
    name: String,
    format: VariableFormat,
    is_exposed: bool,
    default_value: String,
    value: String,
    variable_type: StepVariableType,
    value_type: ValueType,
    previous_step_index: Option<i32>,
    variable_step_index_in_plugin: Option<i32>,
    reference_variable_name: String,
    reference_variable_stage: Option<StageType>,
}

macro_rules! variable_row_from {
    ($model:ty) => {
        impl From<$model> for VariableRow {
            fn from(variable: $model) -> Self {
                Self {
                    id: variable.id,
                    name: variable.name,
                    format: variable.format,
                    is_exposed: variable.is_exposed,
                    default_value: variable.default_value,
                    value: variable.value,
                    variable_type: variable.variable_type,
                    value_type: variable.value_type,
                    previous_step_index: variable.previous_step_index,
                    variable_step_index_in_plugin: variable.variable_step_index_in_plugin,
                    reference_variable_name: variable.reference_variable_name,
                    reference_variable_stage: variable.reference_variable_stage,
                }
            }
        }
    };
}

variable_row_from!(pipeline_stage_step_variable::Model);
variable_row_from!(plugin_step_variable::Model);

struct ConditionRow {
    condition_variable_id: i64,
    condition_type: ConditionType,
    conditional_operator: String,
    conditional_value: String,
}

macro_rules! condition_row_from {
    ($model:ty) => {
        impl From<$model> for ConditionRow {
            fn from(condition: $model) -> Self {
                Self {
                    condition_variable_id: condition.condition_variable_id,
                    condition_type: condition.condition_type,
                    conditional_operator: condition.conditional_operator,
                    conditional_value: condition.conditional_value,
                }
            }
        }
    };
}

condition_row_from!(pipeline_stage_step_condition::Model);
condition_row_from!(plugin_step_condition::Model);

#[derive(Clone, Copy, PartialEq, Eq)]
enum StepOrigin {
    Stage,
    Plugin,
}

impl StageCompiler {
    pub async fn compile<C: ConnectionTrait>(db: &C, owner: StageOwner) -> Result<CompiledStages> {
        let (pre_type, post_type) = match owner {
            StageOwner::Ci(_) => (StageType::PreCi, StageType::PostCi),
            StageOwner::Cd(_) => (StageType::PreCd, StageType::PostCd),
        };
        let pre_steps = Self::compile_stage(db, owner, pre_type).await?;
        let post_steps = Self::compile_stage(db, owner, post_type).await?;
        let referenced = pre_steps
            .iter()
            .chain(post_steps.iter())
            .filter(|step| step.is_ref_plugin())
            .map(|step| step.ref_plugin_id);
        let ref_plugins = Self::resolve_plugins(db, referenced).await?;
        Ok(CompiledStages {
            pre_steps,
            post_steps,
            ref_plugins,
        })
    }

    pub async fn compile_stage<C: ConnectionTrait>(
        db: &C,
        owner: StageOwner,
        stage_type: StageType,
    ) -> Result<Vec<StepObject>> {
        let Some(stage) = PipelineStage::find_by_owner_and_type(db, owner, stage_type).await?
        else {
            return Ok(Vec::new());
        };
        let mut steps = Vec::new();
        for step in PipelineStage::find_active_steps(db, stage.id).await? {
            let variables = PipelineStage::find_variables(db, step.id)
                .await?
                .into_iter()
                .map(VariableRow::from)
                .collect();
            let conditions = PipelineStage::find_conditions(db, step.id)
                .await?
                .into_iter()
                .map(ConditionRow::from)
                .collect();
            steps.push(
                Self::build_step(db, step.into(), variables, conditions, StepOrigin::Stage).await?,
            );
        }
        Ok(steps)
    }

    /// Breadth-first over plugin references. Each plugin id is compiled
    /// once, which also ends reference cycles.
    pub async fn resolve_plugins<C: ConnectionTrait>(
        db: &C,
        plugin_ids: impl IntoIterator<Item = i64>,
    ) -> Result<Vec<RefPluginObject>> {
        let mut queue: VecDeque<i64> = plugin_ids.into_iter().filter(|id| *id > 0).collect();
        let mut seen = HashSet::new();
        let mut plugins = Vec::new();

        while let Some(plugin_id) = queue.pop_front() {
            if !seen.insert(plugin_id) {
                continue;
            }
            let mut steps = Vec::new();
            for step in Plugin::find_steps(db, plugin_id).await? {
                let variables = Plugin::find_variables(db, step.id)
                    .await?
                    .into_iter()
                    .map(VariableRow::from)
                    .collect();
                let conditions = Plugin::find_conditions(db, step.id)
                    .await?
                    .into_iter()
                    .map(ConditionRow::from)
                    .collect();
                let compiled =
                    Self::build_step(db, step.into(), variables, conditions, StepOrigin::Plugin)
                        .await?;
                if compiled.is_ref_plugin() && !seen.contains(&compiled.ref_plugin_id) {
                    queue.push_back(compiled.ref_plugin_id);
                }
                steps.push(compiled);
            }
            plugins.push(RefPluginObject {
                id: plugin_id,
                steps,
            });
        }
        Ok(plugins)
    }

    async fn build_step<C: ConnectionTrait>(
        db: &C,
        step: StepRow,
        variables: Vec<VariableRow>,
        conditions: Vec<ConditionRow>,
        origin: StepOrigin,
    ) -> Result<StepObject> {
        let mut compiled = StepObject {
            name: step.name,
            index: step.index,
            step_type: step.step_type.to_string(),
            artifact_paths: step.artifact_paths,
            trigger_if_parent_stage_fail: step.trigger_if_parent_stage_fail,
            ..Default::default()
        };

        match (step.step_type, step.script_id) {
            (StepType::Inline, Some(script_id)) => {
                let script = PipelineStage::find_script(db, script_id).await?;
                let mut extra_mounts = Vec::new();
                let mut ports = BTreeMap::new();
                for mapping in PipelineStage::find_script_mappings(db, script_id).await? {
                    match mapping.type_of_mapping {
                        ScriptMappingType::FilePath => extra_mounts.push(MountPath {
                            source_path: mapping.file_path_on_disk,
                            destination_path: mapping.file_path_on_container,
                        }),
                        ScriptMappingType::DockerArg => {
                            compiled.command = mapping.command;
                            compiled.args = mapping.args.0;
                        }
                        ScriptMappingType::Port => {
                            ports.insert(mapping.port_on_local, mapping.port_on_container);
                        }
                    }
                }
                compiled.executor_type = script.script_type.to_string();
                compiled.docker_image = script.container_image_path;
                compiled.script = script.script;
                compiled.exposed_ports = ports;
                if !script.store_script_at.is_empty() {
                    compiled.custom_script_mount = Some(MountPath {
                        source_path: String::new(),
                        destination_path: script.store_script_at,
                    });
                }
                if script.mount_code_to_container && !script.mount_code_to_container_path.is_empty()
                {
                    compiled.source_code_mount = Some(MountPath {
                        source_path: String::new(),
                        destination_path: script.mount_code_to_container_path,
                    });
                }
                if script.mount_directory_from_host {
                    compiled.extra_volume_mounts = extra_mounts;
                }
            }
            (StepType::Inline, None) => {
                tracing::warn!(step_id = step.id, "inline step has no script");
            }
            (StepType::RefPlugin, _) => {
                compiled.executor_type = PLUGIN_EXECUTOR_TYPE.to_string();
                compiled.ref_plugin_id = step.ref_plugin_id.unwrap_or_default();
            }
        }

        let names: HashMap<i64, String> = variables
            .iter()
            .map(|variable| (variable.id, variable.name.clone()))
            .collect();
        for variable in variables {
            let direction = variable.variable_type;
            let object = compile_variable(variable, origin);
            match direction {
                StepVariableType::Input => compiled.input_vars.push(object),
                StepVariableType::Output => compiled.output_vars.push(object),
            }
        }
        for condition in conditions {
            let object = ConditionObject {
                condition_type: condition_type_name(condition.condition_type).to_string(),
                condition_on_variable: names
                    .get(&condition.condition_variable_id)
                    .cloned()
                    .unwrap_or_default(),
                conditional_operator: condition.conditional_operator,
                conditional_value: condition.conditional_value,
            };
            match condition.condition_type {
                ConditionType::Trigger | ConditionType::Skip => {
                    compiled.trigger_skip_conditions.push(object)
                }
                ConditionType::Success | ConditionType::Fail => {
                    compiled.success_failure_conditions.push(object)
                }
            }
        }
        Ok(compiled)
    }
}

fn compile_variable(variable: VariableRow, origin: StepOrigin) -> VariableObject {
    let variable_type = match (variable.value_type, origin) {
        (ValueType::New, _) => VariableKind::Value,
        (ValueType::Global, _) => VariableKind::RefGlobal,
        (ValueType::Previous, StepOrigin::Stage) => match variable.reference_variable_stage {
            Some(StageType::PostCi) => VariableKind::RefPostCi,
            Some(StageType::PreCi) => VariableKind::RefPreCi,
            _ => VariableKind::Value,
        },
        (ValueType::Previous, StepOrigin::Plugin) if !variable.is_exposed => {
            VariableKind::RefPlugin
        }
        (ValueType::Previous, StepOrigin::Plugin) => VariableKind::Value,
    };

    let value = match (variable.variable_type, origin) {
        (StepVariableType::Output, _) => String::new(),
        (StepVariableType::Input, StepOrigin::Stage) => {
            if variable.value.is_empty() {
                variable.default_value
            } else {
                variable.value
            }
        }
        // Exposed plugin inputs are filled from the referencing step's
        // variables; hidden ones always run with the plugin default.
        (StepVariableType::Input, StepOrigin::Plugin) => {
            if variable.default_value.is_empty() || variable.is_exposed {
                variable.value
            } else {
                variable.default_value
            }
        }
    };

    VariableObject {
        name: variable.name,
        format: variable.format.to_string(),
        value,
        variable_type,
        reference_variable_name: variable.reference_variable_name,
        reference_variable_step_index: variable.previous_step_index.unwrap_or_default(),
        variable_step_index_in_plugin: variable.variable_step_index_in_plugin.unwrap_or_default(),
    }
}

fn condition_type_name(condition_type: ConditionType) -> &'static str {
    match condition_type {
        ConditionType::Trigger => "TRIGGER",
        ConditionType::Skip => "SKIP",
        ConditionType::Success => "SUCCESS",
        ConditionType::Fail => "FAIL",
    }
}
