use sea_orm::entity::prelude::*;

use crate::types::{CmCsNames, DeploymentAppType, TriggerType};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pipeline")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
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
    pub deployment_app_created: bool,
    pub deployment_app_delete_request: bool,
    pub deleted: bool,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
