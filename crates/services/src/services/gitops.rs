use db::{
    ConnectionTrait,
    models::{Audit, chart::Chart},
};

use super::{
    clients::{Collaborators, GitOpsRepository},
    error::Result,
};

pub const GITOPS_NOT_CONFIGURED: &str =
    "GitOps not configured or unable to fetch GitOps configuration";

/// Lookup failures count as not configured.
pub async fn is_configured(clients: &Collaborators) -> bool {
    match clients.gitops_repos.is_configured().await {
        Ok(configured) => configured,
        Err(err) => {
            tracing::warn!(error = %err, "failed to fetch gitops configuration");
            false
        }
    }
}

/// Creates the chart repository for `app_name`, registers it with the
/// GitOps controller and points the app's charts at it. Stops at the
/// first failing step.
pub async fn provision_repository<C: ConnectionTrait>(
    db: &C,
    clients: &Collaborators,
    app_id: i64,
    app_name: &str,
    audit: Audit,
) -> Result<GitOpsRepository> {
    let repo = clients
        .gitops_repos
        .create_repository(app_name, audit.user_id)
        .await?;
    clients.gitops.register_repository(&repo.repo_url).await?;
    Chart::update_git_repo_url(db, app_id, &repo.repo_url, audit).await?;
    tracing::info!(app_id, repo_url = %repo.repo_url, "gitops repository provisioned");
    Ok(repo)
}

#[cfg(test)]
mod tests {
    use db::models::{
        app::{App, NewApp},
        chart::Chart,
    };
    use db::types::AppType;

    use super::*;
    use crate::services::test_utils::Fakes;

    #[tokio::test]
    async fn provisioning_points_chart_at_new_repository() {
        let db = test_support::setup_db().await;
        let audit = Audit::now(1);
        let app = App::create(
            &db,
            NewApp {
                name: "web".to_string(),
                display_name: "web".to_string(),
                app_type: AppType::DevtronApp,
                team_id: 1,
                description: None,
            },
            audit,
        )
        .await
        .unwrap();
        Chart::create(&db, app.id, "reference-chart_4-18-0", audit)
            .await
            .unwrap();

        let fakes = Fakes::default();
        let repo = provision_repository(&db, &fakes.collaborators(), app.id, "web", audit)
            .await
            .unwrap();

        let chart = Chart::find_latest_by_app(&db, app.id).await.unwrap().unwrap();
        assert_eq!(chart.git_repo_url, repo.repo_url);
        assert_eq!(fakes.gitops.registered(), vec![repo.repo_url]);
    }

    #[tokio::test]
    async fn registration_failure_leaves_chart_untouched() {
        let db = test_support::setup_db().await;
        let audit = Audit::now(1);
        let app = App::create(
            &db,
            NewApp {
                name: "api".to_string(),
                display_name: "api".to_string(),
                app_type: AppType::DevtronApp,
                team_id: 1,
                description: None,
            },
            audit,
        )
        .await
        .unwrap();
        Chart::create(&db, app.id, "reference-chart_4-18-0", audit)
            .await
            .unwrap();

        let fakes = Fakes::default();
        fakes.gitops.fail_registration("repository rejected");
        let err = provision_repository(&db, &fakes.collaborators(), app.id, "api", audit)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "repository rejected");
        let chart = Chart::find_latest_by_app(&db, app.id).await.unwrap().unwrap();
        assert!(chart.git_repo_url.is_empty());
    }
}
