#![allow(clippy::useless_conversion)]

use chrono::{DateTime, Utc};

pub mod app;
pub mod app_status;
pub mod app_workflow;
pub mod cd_pipeline;
pub mod chart;
pub mod ci_pipeline;
pub mod ci_pipeline_history;
pub mod ci_template;
pub mod deployment_group;
pub mod environment;
pub mod event_outbox;
pub mod git_material;
pub mod pipeline_stage;
pub mod plugin;

/// Who performs a mutation and when. Threaded explicitly through every
/// write so a single request stamps all rows identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Audit {
    pub user_id: i64,
    pub at: DateTime<Utc>,
}

impl Audit {
    pub fn now(user_id: i64) -> Self {
        Self {
            user_id,
            at: Utc::now(),
        }
    }
}
