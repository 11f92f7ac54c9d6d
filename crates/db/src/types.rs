use std::collections::BTreeMap;

use sea_orm::{FromJsonQueryResult, entity::prelude::*};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, TS, Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AppType {
    #[default]
    #[sea_orm(string_value = "DEVTRON_APP")]
    DevtronApp,
    #[sea_orm(string_value = "CHART_STORE_APP")]
    ChartStoreApp,
    #[sea_orm(string_value = "JOB")]
    Job,
}

/// Closed set of CI pipeline kinds. `Linked` and `LinkedCd` never own
/// their source configuration.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum CiPipelineType {
    #[default]
    #[sea_orm(string_value = "CI_BUILD")]
    #[serde(rename = "CI_BUILD")]
    #[strum(serialize = "CI_BUILD")]
    Normal,
    #[sea_orm(string_value = "LINKED")]
    #[serde(rename = "LINKED")]
    #[strum(serialize = "LINKED")]
    Linked,
    #[sea_orm(string_value = "EXTERNAL")]
    #[serde(rename = "EXTERNAL")]
    #[strum(serialize = "EXTERNAL")]
    External,
    #[sea_orm(string_value = "LINKED_CD")]
    #[serde(rename = "LINKED_CD")]
    #[strum(serialize = "LINKED_CD")]
    LinkedCd,
}

#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum SourceType {
    #[sea_orm(string_value = "SOURCE_TYPE_BRANCH_FIXED")]
    #[serde(rename = "SOURCE_TYPE_BRANCH_FIXED")]
    #[strum(serialize = "SOURCE_TYPE_BRANCH_FIXED")]
    BranchFixed,
    #[sea_orm(string_value = "SOURCE_TYPE_BRANCH_REGEX")]
    #[serde(rename = "SOURCE_TYPE_BRANCH_REGEX")]
    #[strum(serialize = "SOURCE_TYPE_BRANCH_REGEX")]
    BranchRegex,
    #[sea_orm(string_value = "WEBHOOK")]
    #[serde(rename = "WEBHOOK")]
    #[strum(serialize = "WEBHOOK")]
    Webhook,
}

#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    #[sea_orm(string_value = "AUTOMATIC")]
    Automatic,
    #[default]
    #[sea_orm(string_value = "MANUAL")]
    Manual,
}

impl TriggerType {
    /// Falls back to `Manual` for empty or unknown values.
    pub fn parse_or_manual(raw: &str) -> Self {
        raw.parse().unwrap_or(TriggerType::Manual)
    }
}

#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum DeploymentAppType {
    #[sea_orm(string_value = "argo_cd")]
    #[serde(rename = "argo_cd")]
    #[strum(serialize = "argo_cd")]
    GitOpsManaged,
    #[sea_orm(string_value = "helm")]
    #[serde(rename = "helm")]
    #[strum(serialize = "helm")]
    HelmManaged,
}

impl DeploymentAppType {
    /// The backend a migration towards `self` tears down.
    pub fn opposite(&self) -> Self {
        match self {
            DeploymentAppType::GitOpsManaged => DeploymentAppType::HelmManaged,
            DeploymentAppType::HelmManaged => DeploymentAppType::GitOpsManaged,
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StageType {
    #[sea_orm(string_value = "PRE_CI")]
    PreCi,
    #[sea_orm(string_value = "POST_CI")]
    PostCi,
    #[sea_orm(string_value = "PRE_CD")]
    PreCd,
    #[sea_orm(string_value = "POST_CD")]
    PostCd,
}

impl StageType {
    pub fn is_ci(&self) -> bool {
        matches!(self, StageType::PreCi | StageType::PostCi)
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, TS,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    #[sea_orm(string_value = "INLINE")]
    Inline,
    #[sea_orm(string_value = "REF_PLUGIN")]
    RefPlugin,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptType {
    #[default]
    #[sea_orm(string_value = "SHELL")]
    Shell,
    #[sea_orm(string_value = "CONTAINER_IMAGE")]
    ContainerImage,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, TS,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptMappingType {
    #[sea_orm(string_value = "FILE_PATH")]
    FilePath,
    #[sea_orm(string_value = "DOCKER_ARG")]
    DockerArg,
    #[sea_orm(string_value = "PORT")]
    Port,
}

/// Direction of a step variable.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, TS,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepVariableType {
    #[sea_orm(string_value = "INPUT")]
    Input,
    #[sea_orm(string_value = "OUTPUT")]
    Output,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum ValueType {
    #[default]
    #[sea_orm(string_value = "NEW")]
    #[serde(rename = "NEW")]
    New,
    #[sea_orm(string_value = "GLOBAL")]
    #[serde(rename = "GLOBAL")]
    Global,
    #[sea_orm(string_value = "FROM_PREVIOUS_STEP")]
    #[serde(rename = "FROM_PREVIOUS_STEP")]
    Previous,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableFormat {
    #[sea_orm(string_value = "STRING")]
    String,
    #[sea_orm(string_value = "NUMBER")]
    Number,
    #[sea_orm(string_value = "BOOL")]
    Bool,
    #[sea_orm(string_value = "DATE")]
    Date,
    #[sea_orm(string_value = "FILE")]
    File,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, TS,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    #[sea_orm(string_value = "TRIGGER")]
    Trigger,
    #[sea_orm(string_value = "SKIP")]
    Skip,
    #[sea_orm(string_value = "SUCCESS")]
    Success,
    #[sea_orm(string_value = "FAIL")]
    Fail,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, TS,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowNodeType {
    #[sea_orm(string_value = "CI_PIPELINE")]
    CiPipeline,
    #[sea_orm(string_value = "CD_PIPELINE")]
    CdPipeline,
    #[sea_orm(string_value = "WEBHOOK")]
    Webhook,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, TS,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryTrigger {
    #[sea_orm(string_value = "TRIGGER_ADD")]
    TriggerAdd,
    #[sea_orm(string_value = "TRIGGER_UPDATE")]
    TriggerUpdate,
    #[sea_orm(string_value = "TRIGGER_DELETE")]
    TriggerDelete,
}

/// JSON-encoded list column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, TS)]
pub struct StringList(pub Vec<String>);

impl From<Vec<String>> for StringList {
    fn from(values: Vec<String>) -> Self {
        StringList(values)
    }
}

/// Names of config maps and secrets a CD stage may consume, stored as
/// `{"configMaps": [...], "secrets": [...]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, TS)]
#[serde(rename_all = "camelCase")]
pub struct CmCsNames {
    #[serde(default)]
    pub config_maps: Vec<String>,
    #[serde(default)]
    pub secrets: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, TS)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(default)]
    pub dockerfile_path: String,
    #[serde(default)]
    pub build_context: String,
    #[serde(default)]
    pub target_platform: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, TS)]
pub struct DockerArgs(pub BTreeMap<String, String>);
