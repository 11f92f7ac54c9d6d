use std::collections::HashSet;

use chrono::{DateTime, NaiveDate};
use db::types::{StageType, StepType, ValueType, VariableFormat};

use super::types::{StageRequest, StepRequest, VariableRequest};
use crate::services::error::{PipelineError, Result};

/// Structural and variable checks run before a stage is persisted.
pub fn validate_stage(stage_type: StageType, stage: &StageRequest) -> Result<()> {
    validate_indices(&stage.steps)?;
    for step in &stage.steps {
        validate_step(stage_type, step)?;
    }
    Ok(())
}

fn validate_indices(steps: &[StepRequest]) -> Result<()> {
    let mut indices: Vec<i32> = steps.iter().map(|step| step.index).collect();
    indices.sort_unstable();
    let contiguous = indices
        .iter()
        .enumerate()
        .all(|(position, index)| *index == position as i32 + 1);
    if !contiguous {
        return Err(PipelineError::invalid(format!(
            "step indices must be contiguous starting at 1, got {indices:?}"
        )));
    }
    Ok(())
}

fn validate_step(stage_type: StageType, step: &StepRequest) -> Result<()> {
    match step.step_type {
        StepType::Inline if step.inline_step_detail.is_none() => {
            return Err(PipelineError::invalid(format!(
                "inline step '{}' has no script detail",
                step.name
            )));
        }
        StepType::RefPlugin if step.plugin_ref_step_detail.is_none() => {
            return Err(PipelineError::invalid(format!(
                "plugin step '{}' has no plugin reference",
                step.name
            )));
        }
        _ => {}
    }

    let inline = step.step_type == StepType::Inline;
    let mut names = HashSet::new();
    for variable in step.input_variables() {
        validate_variable(variable, inline)?;
        validate_reference(stage_type, step, variable)?;
        names.insert(variable.name.as_str());
    }
    for variable in step.output_variables() {
        if variable.name.is_empty() {
            return Err(PipelineError::invalid("variable name is mandatory"));
        }
        parse_format(variable)?;
        names.insert(variable.name.as_str());
    }
    for condition in step.conditions() {
        if !names.contains(condition.condition_on_variable.as_str()) {
            return Err(PipelineError::invalid(format!(
                "condition in step '{}' references unknown variable '{}'",
                step.name, condition.condition_on_variable
            )));
        }
    }
    Ok(())
}

fn validate_reference(
    stage_type: StageType,
    step: &StepRequest,
    variable: &VariableRequest,
) -> Result<()> {
    if variable.value_type != ValueType::Previous {
        return Ok(());
    }
    let same_stage = variable
        .reference_variable_stage
        .is_none_or(|stage| stage == stage_type);
    if same_stage && (variable.previous_step_index < 1 || variable.previous_step_index >= step.index)
    {
        return Err(PipelineError::invalid(format!(
            "variable '{}' of step {} references step {} which does not precede it",
            variable.name, step.index, variable.previous_step_index
        )));
    }
    Ok(())
}

fn parse_format(variable: &VariableRequest) -> Result<VariableFormat> {
    variable.format.parse().map_err(|_| {
        PipelineError::invalid(format!(
            "variable '{}' has invalid format '{}'",
            variable.name, variable.format
        ))
    })
}

/// Name, format and value checks of one input variable. Empty values are
/// only policed on inline steps; plugin inputs fall back to plugin defaults.
pub fn validate_variable(variable: &VariableRequest, inline: bool) -> Result<()> {
    if variable.name.is_empty() {
        return Err(PipelineError::invalid("variable name is mandatory"));
    }
    let format = parse_format(variable)?;
    if variable.value_type != ValueType::New {
        return Ok(());
    }

    let value = if variable.value.is_empty() {
        variable.default_value.as_str()
    } else {
        variable.value.as_str()
    };
    if value.is_empty() {
        if inline && !variable.allow_empty_value {
            return Err(PipelineError::invalid(format!(
                "variable '{}' does not allow empty value",
                variable.name
            )));
        }
        return Ok(());
    }
    if !value_matches_format(value, format) {
        return Err(PipelineError::invalid(format!(
            "variable '{}' has invalid value '{}' for format '{}'",
            variable.name, value, variable.format
        )));
    }
    Ok(())
}

fn value_matches_format(value: &str, format: VariableFormat) -> bool {
    match format {
        VariableFormat::String | VariableFormat::File => true,
        VariableFormat::Number => value.parse::<f64>().is_ok(),
        VariableFormat::Bool => value.parse::<bool>().is_ok(),
        VariableFormat::Date => {
            DateTime::parse_from_rfc3339(value).is_ok()
                || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        }
    }
}
