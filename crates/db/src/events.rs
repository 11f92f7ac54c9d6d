use serde::{Deserialize, Serialize};

pub const EVENT_MATERIALS_REGISTERED: &str = "material.registered";
pub const EVENT_MATERIAL_UPDATED: &str = "material.updated";
pub const EVENT_PIPELINE_MATERIALS_SAVED: &str = "pipeline_material.saved";

pub const ENTITY_APP: &str = "app";
pub const ENTITY_GIT_MATERIAL: &str = "git_material";
pub const ENTITY_CI_PIPELINE: &str = "ci_pipeline";

/// Full material set of an application, pushed as one `AddRepo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialsRegisteredPayload {
    pub app_id: i64,
    pub material_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialUpdatedPayload {
    pub material_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMaterialsSavedPayload {
    pub ci_pipeline_material_ids: Vec<i64>,
}
