use std::{collections::HashSet, sync::LazyLock};

use db::{
    ConnectionTrait, TransactionTrait,
    entities::app,
    models::{
        Audit,
        app::{App, NewApp, NewLabel},
        git_material::GitMaterial,
    },
    types::AppType,
};
use regex::Regex;

use super::{PipelineOrchestrator, random_suffix, types::{CreateAppRequest, LabelRequest}};
use crate::services::error::{PipelineError, Result};

/// Marks generated job names so they never collide with user-chosen app names.
pub const JOB_NAME_SUFFIX: &str = "J";

const LABEL_NAME_MAX: usize = 63;
const LABEL_PREFIX_MAX: usize = 253;

static LABEL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").expect("valid regex")
});

static LABEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("valid regex")
});

fn already_exists_message(app_type: &AppType) -> &'static str {
    match app_type {
        AppType::Job => "job already exists",
        _ => "app already exists",
    }
}

fn job_name(display_name: &str) -> String {
    format!("{display_name}-{}{JOB_NAME_SUFFIX}", random_suffix(8))
}

fn is_label_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= LABEL_NAME_MAX && LABEL_NAME.is_match(name)
}

/// Kubernetes label syntax, required for labels propagated to workloads.
pub fn validate_label(key: &str, value: &str) -> Result<()> {
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty()
                || prefix.len() > LABEL_PREFIX_MAX
                || !LABEL_PREFIX.is_match(prefix)
            {
                return Err(PipelineError::invalid(format!(
                    "label key '{key}' has an invalid prefix"
                )));
            }
            name
        }
        None => key,
    };
    if !is_label_name(name) {
        return Err(PipelineError::invalid(format!(
            "label key '{key}' is not a valid kubernetes label key"
        )));
    }
    if !value.is_empty() && !is_label_name(value) {
        return Err(PipelineError::invalid(format!(
            "label value '{value}' is not a valid kubernetes label value"
        )));
    }
    Ok(())
}

fn dedup_labels(labels: &[LabelRequest]) -> Result<Vec<NewLabel>> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for label in labels {
        if label.propagate {
            validate_label(&label.key, &label.value)?;
        }
        if seen.insert((label.key.as_str(), label.value.as_str(), label.propagate)) {
            unique.push(NewLabel {
                key: label.key.clone(),
                value: label.value.clone(),
                propagate: label.propagate,
            });
        }
    }
    Ok(unique)
}

/// Post-insert re-read: when a concurrent creator got in first, this row
/// loses, is soft-deleted and the caller sees a conflict.
pub(crate) async fn resolve_name_race<C: ConnectionTrait>(
    db: &C,
    created: &app::Model,
    lookup_name: &str,
    audit: Audit,
) -> Result<()> {
    let rows = App::find_active_by_name(db, lookup_name, &created.app_type).await?;
    if rows.len() > 1 && rows[0].id != created.id {
        App::deactivate(db, created.id, audit).await?;
        tracing::warn!(
            app_id = created.id,
            winner_id = rows[0].id,
            name = lookup_name,
            "concurrent create lost the name race"
        );
        return Err(PipelineError::Conflict(
            already_exists_message(&created.app_type).to_string(),
        ));
    }
    Ok(())
}

impl PipelineOrchestrator {
    pub async fn create_app(&self, request: CreateAppRequest, user_id: i64) -> Result<app::Model> {
        let audit = Audit::now(user_id);
        let display_name = request.app_name.trim().to_string();
        if display_name.is_empty() {
            return Err(PipelineError::invalid("app name is required"));
        }
        let labels = dedup_labels(&request.labels)?;

        let existing =
            App::find_active_by_name(&self.db.pool, &display_name, &request.app_type).await?;
        if !existing.is_empty() {
            return Err(PipelineError::Conflict(
                already_exists_message(&request.app_type).to_string(),
            ));
        }

        let name = match request.app_type {
            AppType::Job => job_name(&display_name),
            _ => display_name.clone(),
        };
        let note = request
            .description
            .as_deref()
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .map(str::to_string);

        let tx = self.db.pool.begin().await?;
        let app = App::create(
            &tx,
            NewApp {
                name,
                display_name: display_name.clone(),
                app_type: request.app_type.clone(),
                team_id: request.team_id,
                description: note.clone(),
            },
            audit,
        )
        .await?;
        if let Some(note) = note.as_deref() {
            App::create_note(&tx, app.id, note, audit).await?;
        }
        App::create_labels(&tx, app.id, &labels, audit).await?;
        tx.commit().await?;

        resolve_name_race(&self.db.pool, &app, &display_name, audit).await?;
        tracing::info!(app_id = app.id, name = %app.name, app_type = %app.app_type, "app created");
        Ok(app)
    }

    /// Soft-deletes the app and its materials, then revokes app-scoped roles.
    pub async fn delete_app(&self, app_id: i64, user_id: i64) -> Result<()> {
        let audit = Audit::now(user_id);
        let app = App::find_active_by_id(&self.db.pool, app_id).await?;

        let tx = self.db.pool.begin().await?;
        for mut material in GitMaterial::find_active_by_app(&tx, app_id).await? {
            material.active = false;
            let material = GitMaterial::update(&tx, material, audit).await?;
            GitMaterial::save_history(&tx, &material, audit).await?;
            self.registrar.update(&tx, material.id).await?;
        }
        App::deactivate(&tx, app_id, audit).await?;
        tx.commit().await?;

        self.registrar.flush().await;
        if let Err(err) = self.clients.rbac.delete_app_roles(&app.name).await {
            tracing::error!(app_id, error = %err, "failed to revoke app roles");
        }
        tracing::info!(app_id, "app deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use db::models::git_material::NewGitMaterial;

    use super::*;
    use crate::services::{error::ErrorKind, test_utils::orchestrator};

    fn request(name: &str, app_type: AppType) -> CreateAppRequest {
        CreateAppRequest {
            app_name: name.to_string(),
            app_type,
            team_id: 1,
            description: None,
            labels: Vec::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_app_name_is_rejected() {
        let (orchestrator, _) = orchestrator().await;
        orchestrator
            .create_app(request("web", AppType::DevtronApp), 1)
            .await
            .unwrap();
        let err = orchestrator
            .create_app(request("web", AppType::DevtronApp), 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "app already exists");
    }

    #[tokio::test]
    async fn jobs_get_generated_names() {
        let (orchestrator, _) = orchestrator().await;
        let job = orchestrator
            .create_app(request("nightly", AppType::Job), 1)
            .await
            .unwrap();
        assert_eq!(job.display_name, "nightly");
        assert!(job.name.starts_with("nightly-"));
        assert!(job.name.ends_with(JOB_NAME_SUFFIX));
        assert_eq!(job.name.len(), "nightly-".len() + 8 + JOB_NAME_SUFFIX.len());

        let err = orchestrator
            .create_app(request("nightly", AppType::Job), 1)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "job already exists");
    }

    #[tokio::test]
    async fn race_loser_is_soft_deleted() {
        let (orchestrator, _) = orchestrator().await;
        let db = &orchestrator.db().pool;
        let audit = Audit::now(1);
        let new_app = || NewApp {
            name: "web".to_string(),
            display_name: "web".to_string(),
            app_type: AppType::DevtronApp,
            team_id: 1,
            description: None,
        };
        let winner = App::create(db, new_app(), audit).await.unwrap();
        let loser = App::create(db, new_app(), audit).await.unwrap();

        let err = resolve_name_race(db, &loser, "web", audit).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        resolve_name_race(db, &winner, "web", audit).await.unwrap();

        let active = App::find_active_by_name(db, "web", &AppType::DevtronApp)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, winner.id);
    }

    #[tokio::test]
    async fn labels_are_deduplicated_and_note_written() {
        let (orchestrator, _) = orchestrator().await;
        let label = LabelRequest {
            key: "team".to_string(),
            value: "payments".to_string(),
            propagate: true,
        };
        let mut req = request("api", AppType::DevtronApp);
        req.description = Some("owned by payments".to_string());
        req.labels = vec![label.clone(), label];
        let app = orchestrator.create_app(req, 1).await.unwrap();

        let labels = App::find_labels(&orchestrator.db().pool, app.id).await.unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(app.description.as_deref(), Some("owned by payments"));
    }

    #[test]
    fn label_syntax() {
        validate_label("app", "web").unwrap();
        validate_label("devtron.ai/team", "").unwrap();
        validate_label("a.b-c_d", "v1.2").unwrap();
        assert!(validate_label("-app", "web").is_err());
        assert!(validate_label("app", "has space").is_err());
        assert!(validate_label("Bad_Prefix/app", "web").is_err());
        assert!(validate_label(&"k".repeat(64), "v").is_err());
    }

    #[tokio::test]
    async fn delete_app_pushes_inactive_materials_and_revokes_roles() {
        let (orchestrator, fakes) = orchestrator().await;
        let app = orchestrator
            .create_app(request("web", AppType::DevtronApp), 1)
            .await
            .unwrap();
        GitMaterial::create(
            &orchestrator.db().pool,
            NewGitMaterial {
                app_id: app.id,
                git_provider_id: 7,
                url: "https://g/x/y.git".to_string(),
                name: "7-y".to_string(),
                checkout_path: "./".to_string(),
                fetch_submodules: false,
                filter_pattern: Vec::new(),
            },
            Audit::now(1),
        )
        .await
        .unwrap();

        orchestrator.delete_app(app.id, 2).await.unwrap();

        let updated = fakes.sensor.updated();
        assert_eq!(updated.len(), 1);
        assert!(updated[0].deleted);
        assert_eq!(fakes.rbac.revoked(), vec!["web".to_string()]);
        let err = orchestrator.delete_app(app.id, 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
