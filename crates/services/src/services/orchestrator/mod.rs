//! Transactional entry point for every mutation of the pipeline graph.
//!
//! Each operation opens one transaction, writes every row it touches and
//! enqueues the git-sensor side effects on the same transaction. After the
//! commit it asks the [`MaterialRegistrar`] for a best-effort flush.

use std::sync::Arc;

use config::CiCdConfig;
use db::DBService;
use rand::{Rng, distributions::Alphanumeric};

use super::{clients::Collaborators, material::MaterialRegistrar};

mod app;
mod cd_pipeline;
mod ci_material_patch;
mod ci_pipeline;
mod material;
pub mod types;

pub use app::{JOB_NAME_SUFFIX, validate_label};
pub use cd_pipeline::{DELETE_CHILDREN_FIRST, HELM_DELETE_UNSUCCESSFUL, deployment_app_name};
pub use types::*;

#[derive(Clone)]
pub struct PipelineOrchestrator {
    db: DBService,
    clients: Collaborators,
    registrar: MaterialRegistrar,
    config: Arc<CiCdConfig>,
}

impl PipelineOrchestrator {
    pub fn new(
        db: DBService,
        clients: Collaborators,
        registrar: MaterialRegistrar,
        config: Arc<CiCdConfig>,
    ) -> Self {
        Self {
            db,
            clients,
            registrar,
            config,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }
}

/// Lowercase alphanumeric suffix used for generated names.
pub(crate) fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

pub(crate) fn workflow_name(app_id: i64) -> String {
    format!("wf-{app_id}-{}", random_suffix(4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_are_lowercase() {
        let suffix = random_suffix(8);
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

        let name = workflow_name(12);
        assert!(name.starts_with("wf-12-"));
        assert_eq!(name.len(), "wf-12-".len() + 4);
    }
}
