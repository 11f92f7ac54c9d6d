pub mod app;
pub mod app_label;
pub mod app_status;
pub mod app_workflow;
pub mod app_workflow_mapping;
pub mod cd_pipeline;
pub mod chart;
pub mod ci_env_mapping;
pub mod ci_pipeline;
pub mod ci_pipeline_history;
pub mod ci_pipeline_material;
pub mod ci_pipeline_script;
pub mod ci_template;
pub mod ci_template_override;
pub mod cluster;
pub mod deployment_group;
pub mod deployment_group_app;
pub mod environment;
pub mod event_outbox;
pub mod external_ci_pipeline;
pub mod generic_note;
pub mod git_material;
pub mod git_material_history;
pub mod pipeline_stage;
pub mod pipeline_stage_step;
pub mod pipeline_stage_step_condition;
pub mod pipeline_stage_step_variable;
pub mod plugin_metadata;
pub mod plugin_pipeline_script;
pub mod plugin_step;
pub mod plugin_step_condition;
pub mod plugin_step_variable;
pub mod pre_post_cd_script_history;
pub mod script_path_arg_port_mapping;
