use db::types::{ConditionType, ScriptType, StageType, StepType, TriggerType, ValueType};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Structured definition of one pre or post stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct StageRequest {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub steps: Vec<StepRequest>,
}

impl StageRequest {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct StepRequest {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub index: i32,
    pub step_type: StepType,
    #[serde(default)]
    pub output_directory_path: Vec<String>,
    #[serde(default)]
    pub inline_step_detail: Option<InlineStepDetail>,
    #[serde(default)]
    pub plugin_ref_step_detail: Option<RefPluginStepDetail>,
    #[serde(default)]
    pub trigger_if_parent_stage_fail: bool,
}

impl StepRequest {
    pub fn input_variables(&self) -> &[VariableRequest] {
        match (&self.inline_step_detail, &self.plugin_ref_step_detail) {
            (Some(inline), _) => &inline.input_variables,
            (None, Some(plugin)) => &plugin.input_variables,
            (None, None) => &[],
        }
    }

    pub fn output_variables(&self) -> &[VariableRequest] {
        match (&self.inline_step_detail, &self.plugin_ref_step_detail) {
            (Some(inline), _) => &inline.output_variables,
            (None, Some(plugin)) => &plugin.output_variables,
            (None, None) => &[],
        }
    }

    pub fn conditions(&self) -> &[ConditionRequest] {
        match (&self.inline_step_detail, &self.plugin_ref_step_detail) {
            (Some(inline), _) => &inline.condition_details,
            (None, Some(plugin)) => &plugin.condition_details,
            (None, None) => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct InlineStepDetail {
    #[serde(default)]
    pub script_type: ScriptType,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub store_script_at: String,
    #[serde(default)]
    pub container_image_path: String,
    #[serde(default)]
    pub command_args_map: Vec<CommandArgs>,
    #[serde(default)]
    pub mount_path_map: Vec<MountPathMap>,
    #[serde(default)]
    pub port_map: Vec<PortMap>,
    #[serde(default)]
    pub mount_code_to_container: bool,
    #[serde(default)]
    pub mount_code_to_container_path: String,
    #[serde(default)]
    pub mount_directory_from_host: bool,
    #[serde(default)]
    pub input_variables: Vec<VariableRequest>,
    #[serde(default)]
    pub output_variables: Vec<VariableRequest>,
    #[serde(default)]
    pub condition_details: Vec<ConditionRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CommandArgs {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct MountPathMap {
    pub file_path_on_disk: String,
    pub file_path_on_container: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PortMap {
    pub port_on_local: i32,
    pub port_on_container: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct RefPluginStepDetail {
    pub plugin_id: i64,
    #[serde(default)]
    pub input_variables: Vec<VariableRequest>,
    #[serde(default)]
    pub output_variables: Vec<VariableRequest>,
    #[serde(default)]
    pub condition_details: Vec<ConditionRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct VariableRequest {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// One of `STRING`, `NUMBER`, `BOOL`, `DATE`, `FILE`; checked on save.
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_exposed: bool,
    #[serde(default)]
    pub allow_empty_value: bool,
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub previous_step_index: i32,
    #[serde(default)]
    pub reference_variable_name: String,
    #[serde(default)]
    pub reference_variable_stage: Option<StageType>,
    #[serde(default)]
    pub variable_step_index_in_plugin: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRequest {
    #[serde(default)]
    pub id: i64,
    pub condition_on_variable: String,
    pub condition_type: ConditionType,
    #[serde(default)]
    pub conditional_operator: String,
    #[serde(default)]
    pub conditional_value: String,
}
