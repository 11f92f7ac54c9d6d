//! Keeps the git sensor's view of materials in step with the database.
//!
//! Mutations never call the sensor directly. They enqueue an outbox row on
//! the same connection (usually an open transaction) and, after commit, ask
//! the registrar for a best-effort [`MaterialRegistrar::flush`]. Anything the
//! flush cannot deliver stays queued for the background [`OutboxWorker`].

use std::collections::HashSet;

use db::{
    ConnectionTrait,
    events::{
        ENTITY_APP, ENTITY_CI_PIPELINE, ENTITY_GIT_MATERIAL, EVENT_MATERIAL_UPDATED,
        EVENT_MATERIALS_REGISTERED, EVENT_PIPELINE_MATERIALS_SAVED, MaterialUpdatedPayload,
        MaterialsRegisteredPayload, PipelineMaterialsSavedPayload,
    },
    models::event_outbox::EventOutbox,
};

use super::{
    error::{PipelineError, Result},
    outbox::OutboxWorker,
};

pub const CHECKOUT_PATH_PREFIX: &str = "./";

#[derive(Clone)]
pub struct MaterialRegistrar {
    outbox: OutboxWorker,
}

impl MaterialRegistrar {
    pub fn new(outbox: OutboxWorker) -> Self {
        Self { outbox }
    }

    /// Queues the full material set of an application as one `AddRepo`.
    pub async fn register<C: ConnectionTrait>(
        &self,
        db: &C,
        app_id: i64,
        material_ids: Vec<i64>,
    ) -> Result<()> {
        if material_ids.is_empty() {
            return Ok(());
        }
        let payload = serde_json::to_value(MaterialsRegisteredPayload {
            app_id,
            material_ids,
        })?;
        EventOutbox::enqueue(db, EVENT_MATERIALS_REGISTERED, ENTITY_APP, app_id, payload).await?;
        Ok(())
    }

    /// Queues an `UpdateRepo` for a material, including soft-deleted ones so
    /// the sensor stops polling them.
    pub async fn update<C: ConnectionTrait>(&self, db: &C, material_id: i64) -> Result<()> {
        let payload = serde_json::to_value(MaterialUpdatedPayload { material_id })?;
        EventOutbox::enqueue(
            db,
            EVENT_MATERIAL_UPDATED,
            ENTITY_GIT_MATERIAL,
            material_id,
            payload,
        )
        .await?;
        Ok(())
    }

    pub async fn save_pipeline_materials<C: ConnectionTrait>(
        &self,
        db: &C,
        ci_pipeline_id: i64,
        ci_pipeline_material_ids: Vec<i64>,
    ) -> Result<()> {
        if ci_pipeline_material_ids.is_empty() {
            return Ok(());
        }
        let payload = serde_json::to_value(PipelineMaterialsSavedPayload {
            ci_pipeline_material_ids,
        })?;
        EventOutbox::enqueue(
            db,
            EVENT_PIPELINE_MATERIALS_SAVED,
            ENTITY_CI_PIPELINE,
            ci_pipeline_id,
            payload,
        )
        .await?;
        Ok(())
    }

    /// Pushes whatever is queued. Failures are logged and left for the worker.
    pub async fn flush(&self) {
        if let Err(err) = self.outbox.flush_pending().await {
            tracing::warn!(error = %err, "post-commit material flush failed; left for outbox worker");
        }
    }
}

/// Validates the checkout paths of every material an application will own
/// after the mutation. A single material may leave its path empty, which
/// is normalized to `./`.
pub fn validate_checkout_paths(paths: &mut [String]) -> Result<()> {
    let multi = paths.len() > 1;
    let mut seen = HashSet::new();
    for path in paths.iter_mut() {
        if path.is_empty() {
            if multi {
                return Err(PipelineError::invalid("checkout path required for multi-git"));
            }
            *path = CHECKOUT_PATH_PREFIX.to_string();
        }
        if !path.starts_with(CHECKOUT_PATH_PREFIX) {
            return Err(PipelineError::invalid(
                "invalid checkout path it must start with ./",
            ));
        }
        if !seen.insert(path.clone()) {
            return Err(PipelineError::invalid("duplicate checkout paths found"));
        }
    }
    Ok(())
}

/// `{provider}-{repo}` where `repo` is the URL basename without `.git`.
pub fn material_name(git_provider_id: i64, url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let base = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let base = base.strip_suffix(".git").unwrap_or(base);
    format!("{git_provider_id}-{base}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn single_material_defaults_to_root() {
        let mut single = paths(&[""]);
        validate_checkout_paths(&mut single).unwrap();
        assert_eq!(single, vec!["./"]);
    }

    #[test]
    fn multi_git_paths_must_be_unique_and_relative() {
        let mut missing = paths(&["./a", ""]);
        assert_eq!(
            validate_checkout_paths(&mut missing).unwrap_err().to_string(),
            "checkout path required for multi-git"
        );

        let mut absolute = paths(&["./a", "/b"]);
        assert_eq!(
            validate_checkout_paths(&mut absolute)
                .unwrap_err()
                .to_string(),
            "invalid checkout path it must start with ./"
        );

        let mut duplicate = paths(&["./a", "./a"]);
        assert_eq!(
            validate_checkout_paths(&mut duplicate)
                .unwrap_err()
                .to_string(),
            "duplicate checkout paths found"
        );

        let mut ok = paths(&["./a", "./b"]);
        validate_checkout_paths(&mut ok).unwrap();
    }

    #[test]
    fn names_strip_git_suffix() {
        assert_eq!(material_name(7, "https://g/x/y.git"), "7-y");
        assert_eq!(material_name(2, "https://g/x/service/"), "2-service");
        assert_eq!(material_name(3, "repo"), "3-repo");
    }
}
