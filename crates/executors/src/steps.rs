//! Compiled pre/post stage steps as the workflow runner consumes them.
//!
//! These objects travel inside `CI_CD_EVENT`, so field names are camelCase and
//! the enum spellings are part of the runner contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

/// How the runner resolves a variable's value at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableKind {
    #[default]
    Value,
    RefPreCi,
    RefPostCi,
    RefGlobal,
    RefPlugin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
pub struct VariableObject {
    pub name: String,
    pub format: String,
    pub value: String,
    pub variable_type: VariableKind,
    pub reference_variable_name: String,
    pub reference_variable_step_index: i32,
    pub variable_step_index_in_plugin: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConditionObject {
    pub condition_type: String,
    pub condition_on_variable: String,
    pub conditional_operator: String,
    pub conditional_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
pub struct MountPath {
    pub source_path: String,
    pub destination_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
pub struct StepObject {
    pub name: String,
    pub index: i32,
    pub step_type: String,
    pub executor_type: String,
    pub ref_plugin_id: i64,
    pub script: String,
    pub input_vars: Vec<VariableObject>,
    pub output_vars: Vec<VariableObject>,
    pub trigger_skip_conditions: Vec<ConditionObject>,
    pub success_failure_conditions: Vec<ConditionObject>,
    pub docker_image: String,
    pub command: String,
    pub args: Vec<String>,
    pub custom_script_mount: Option<MountPath>,
    pub source_code_mount: Option<MountPath>,
    pub extra_volume_mounts: Vec<MountPath>,
    pub artifact_paths: Vec<String>,
    pub trigger_if_parent_stage_fail: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub exposed_ports: BTreeMap<i32, i32>,
}

impl StepObject {
    pub fn is_ref_plugin(&self) -> bool {
        self.step_type == "REF_PLUGIN"
    }
}

/// A referenced plugin flattened to its own step list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefPluginObject {
    pub id: i64,
    pub steps: Vec<StepObject>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_kind_uses_runner_spelling() {
        let json = serde_json::to_string(&VariableKind::RefPostCi).unwrap();
        assert_eq!(json, "\"REF_POST_CI\"");
        assert_eq!(VariableKind::RefGlobal.to_string(), "REF_GLOBAL");
    }

    #[test]
    fn step_object_is_camel_case() {
        let step = StepObject {
            name: "lint".to_string(),
            index: 1,
            trigger_if_parent_stage_fail: true,
            ..Default::default()
        };
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["triggerIfParentStageFail"], true);
        assert!(value.get("exposedPorts").is_none());
    }
}
