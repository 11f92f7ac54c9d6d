//! Free-form stage YAML used by CD pipelines created before structured
//! stages existed:
//!
//! ```yaml
//! version: "0.0.1"
//! cdPipelineConf:
//!   - beforeStages:
//!       - name: migrate
//!         script: ./migrate.sh
//!         outputLocation: ./out
//!     afterStages: []
//! ```

use db::types::{ScriptType, StepType, TriggerType};
use executors::steps::StepObject;
use serde::{Deserialize, Serialize};

use crate::services::error::Result;

pub const LEGACY_STAGE_VERSION: &str = "0.0.1";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyStageYaml {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub cd_pipeline_conf: Vec<LegacyStageConf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyStageConf {
    #[serde(default)]
    pub before_stages: Vec<LegacyTask>,
    #[serde(default)]
    pub after_stages: Vec<LegacyTask>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTask {
    pub name: String,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub output_location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledLegacyStage {
    pub trigger_type: TriggerType,
    pub before: Vec<StepObject>,
    pub after: Vec<StepObject>,
}

pub fn parse(yaml: &str) -> Result<LegacyStageYaml> {
    if yaml.trim().is_empty() {
        return Ok(LegacyStageYaml::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// Compiles a legacy stage into inline shell steps, indexed 1..N per list
/// in document order.
pub fn compile(yaml: &str, trigger_type: &str) -> Result<CompiledLegacyStage> {
    let parsed = parse(yaml)?;
    let mut before = Vec::new();
    let mut after = Vec::new();
    for conf in parsed.cd_pipeline_conf {
        before.extend(conf.before_stages);
        after.extend(conf.after_stages);
    }
    Ok(CompiledLegacyStage {
        trigger_type: TriggerType::parse_or_manual(trigger_type),
        before: to_steps(before),
        after: to_steps(after),
    })
}

fn to_steps(tasks: Vec<LegacyTask>) -> Vec<StepObject> {
    tasks
        .into_iter()
        .enumerate()
        .map(|(position, task)| StepObject {
            name: task.name,
            index: position as i32 + 1,
            step_type: StepType::Inline.to_string(),
            executor_type: ScriptType::Shell.to_string(),
            script: task.script,
            artifact_paths: if task.output_location.is_empty() {
                Vec::new()
            } else {
                vec![task.output_location]
            },
            ..Default::default()
        })
        .collect()
}

fn to_tasks(steps: &[StepObject]) -> Vec<LegacyTask> {
    let mut ordered: Vec<&StepObject> = steps.iter().collect();
    ordered.sort_by_key(|step| step.index);
    ordered
        .into_iter()
        .map(|step| LegacyTask {
            name: step.name.clone(),
            script: step.script.clone(),
            output_location: step.artifact_paths.first().cloned().unwrap_or_default(),
        })
        .collect()
}

/// Renders compiled steps back to the legacy document.
pub fn render(before: &[StepObject], after: &[StepObject]) -> Result<String> {
    let document = LegacyStageYaml {
        version: LEGACY_STAGE_VERSION.to_string(),
        cd_pipeline_conf: vec![LegacyStageConf {
            before_stages: to_tasks(before),
            after_stages: to_tasks(after),
        }],
    };
    Ok(serde_yaml::to_string(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRE_STAGE: &str = r#"
version: "0.0.1"
cdPipelineConf:
  - beforeStages:
      - name: migrate
        script: |
          ./migrate.sh
          echo done
        outputLocation: ./out
      - name: notify
        script: curl -X POST hook
    afterStages:
      - name: smoke
        script: ./smoke.sh
"#;

    #[test]
    fn compiles_in_document_order() {
        let compiled = compile(PRE_STAGE, "AUTOMATIC").unwrap();
        assert_eq!(compiled.trigger_type, TriggerType::Automatic);
        let names: Vec<_> = compiled.before.iter().map(|s| (s.index, s.name.as_str())).collect();
        assert_eq!(names, vec![(1, "migrate"), (2, "notify")]);
        assert_eq!(compiled.before[0].artifact_paths, vec!["./out"]);
        assert_eq!(compiled.before[0].executor_type, "SHELL");
        assert_eq!(compiled.after[0].index, 1);
    }

    #[test]
    fn unknown_trigger_falls_back_to_manual() {
        let compiled = compile(PRE_STAGE, "sometimes").unwrap();
        assert_eq!(compiled.trigger_type, TriggerType::Manual);
        assert_eq!(compile("", "").unwrap(), CompiledLegacyStage::default());
    }

    #[test]
    fn render_preserves_tasks() {
        let compiled = compile(PRE_STAGE, "MANUAL").unwrap();
        let rendered = render(&compiled.before, &compiled.after).unwrap();
        let original = parse(PRE_STAGE).unwrap();
        let reparsed = parse(&rendered).unwrap();
        assert_eq!(reparsed.version, LEGACY_STAGE_VERSION);
        assert_eq!(
            reparsed.cd_pipeline_conf[0].before_stages,
            original.cd_pipeline_conf[0].before_stages
        );
        assert_eq!(
            reparsed.cd_pipeline_conf[0].after_stages,
            original.cd_pipeline_conf[0].after_stages
        );
    }

    #[test]
    fn malformed_yaml_is_invalid() {
        let err = compile("cdPipelineConf: [", "MANUAL").unwrap_err();
        assert!(err.to_string().starts_with("invalid stage yaml"));
    }
}
