use db::{
    TransactionTrait,
    entities::git_material,
    models::{
        Audit,
        app::App,
        git_material::{GitMaterial, NewGitMaterial},
    },
};

use super::{
    PipelineOrchestrator,
    types::{CreateMaterialsRequest, MaterialRequest},
};
use crate::services::{
    error::{PipelineError, Result},
    material::{material_name, validate_checkout_paths},
};

impl PipelineOrchestrator {
    pub async fn create_materials(
        &self,
        request: CreateMaterialsRequest,
        user_id: i64,
    ) -> Result<Vec<git_material::Model>> {
        let audit = Audit::now(user_id);
        let app_id = request.app_id;
        App::find_active_by_id(&self.db.pool, app_id).await?;
        if request.materials.is_empty() {
            return Ok(Vec::new());
        }

        let existing = GitMaterial::find_active_by_app(&self.db.pool, app_id).await?;
        let mut paths: Vec<String> = existing
            .iter()
            .map(|m| m.checkout_path.clone())
            .chain(request.materials.iter().map(|m| m.checkout_path.clone()))
            .collect();
        validate_checkout_paths(&mut paths)?;
        let new_paths = &paths[existing.len()..];

        let tx = self.db.pool.begin().await?;
        let mut created = Vec::with_capacity(request.materials.len());
        for (material, checkout_path) in request.materials.into_iter().zip(new_paths) {
            let model = GitMaterial::create(
                &tx,
                NewGitMaterial {
                    app_id,
                    git_provider_id: material.git_provider_id,
                    name: material_name(material.git_provider_id, &material.url),
                    url: material.url,
                    checkout_path: checkout_path.clone(),
                    fetch_submodules: material.fetch_submodules,
                    filter_pattern: material.filter_pattern,
                },
                audit,
            )
            .await?;
            GitMaterial::save_history(&tx, &model, audit).await?;
            created.push(model);
        }
        let all_ids = existing
            .iter()
            .chain(created.iter())
            .map(|m| m.id)
            .collect();
        self.registrar.register(&tx, app_id, all_ids).await?;
        tx.commit().await?;

        self.registrar.flush().await;
        tracing::info!(app_id, count = created.len(), "materials created");
        Ok(created)
    }

    pub async fn update_material(
        &self,
        app_id: i64,
        material: MaterialRequest,
        user_id: i64,
    ) -> Result<git_material::Model> {
        let audit = Audit::now(user_id);
        let existing = GitMaterial::find_active_by_app(&self.db.pool, app_id).await?;
        let Some(position) = existing.iter().position(|m| m.id == material.id) else {
            return Err(PipelineError::NotFound(
                "material to be updated does not exist".to_string(),
            ));
        };

        let mut paths: Vec<String> = existing.iter().map(|m| m.checkout_path.clone()).collect();
        paths[position] = material.checkout_path.clone();
        validate_checkout_paths(&mut paths)?;

        let mut model = existing[position].clone();
        model.name = material_name(material.git_provider_id, &material.url);
        model.url = material.url;
        model.git_provider_id = material.git_provider_id;
        model.checkout_path = paths[position].clone();
        model.fetch_submodules = material.fetch_submodules;
        model.filter_pattern = material.filter_pattern.into();

        let tx = self.db.pool.begin().await?;
        let model = GitMaterial::update(&tx, model, audit).await?;
        GitMaterial::save_history(&tx, &model, audit).await?;
        self.registrar.update(&tx, model.id).await?;
        tx.commit().await?;

        self.registrar.flush().await;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use db::types::AppType;

    use super::*;
    use crate::services::{
        error::ErrorKind,
        orchestrator::types::CreateAppRequest,
        test_utils::orchestrator,
    };

    fn material(url: &str, path: &str) -> MaterialRequest {
        MaterialRequest {
            id: 0,
            url: url.to_string(),
            git_provider_id: 7,
            checkout_path: path.to_string(),
            fetch_submodules: false,
            filter_pattern: Vec::new(),
        }
    }

    async fn app(orchestrator: &PipelineOrchestrator) -> i64 {
        orchestrator
            .create_app(
                CreateAppRequest {
                    app_name: "web".to_string(),
                    app_type: AppType::DevtronApp,
                    team_id: 1,
                    description: None,
                    labels: Vec::new(),
                },
                1,
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn registration_sends_full_material_set() {
        let (orchestrator, fakes) = orchestrator().await;
        let app_id = app(&orchestrator).await;
        orchestrator
            .create_materials(
                CreateMaterialsRequest {
                    app_id,
                    materials: vec![material("https://g/x/y.git", "./y")],
                },
                1,
            )
            .await
            .unwrap();
        orchestrator
            .create_materials(
                CreateMaterialsRequest {
                    app_id,
                    materials: vec![material("https://g/x/z.git", "./z")],
                },
                1,
            )
            .await
            .unwrap();

        let added = fakes.sensor.added();
        assert_eq!(added.len(), 2);
        let names: Vec<_> = added[1].iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["7-y", "7-z"]);
    }

    #[tokio::test]
    async fn checkout_paths_stay_unique_across_app() {
        let (orchestrator, fakes) = orchestrator().await;
        let app_id = app(&orchestrator).await;
        let created = orchestrator
            .create_materials(
                CreateMaterialsRequest {
                    app_id,
                    materials: vec![
                        material("https://g/x/a.git", "./a"),
                        material("https://g/x/b.git", "./b"),
                    ],
                },
                1,
            )
            .await
            .unwrap();

        let err = orchestrator
            .create_materials(
                CreateMaterialsRequest {
                    app_id,
                    materials: vec![material("https://g/x/c.git", "./a")],
                },
                1,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "duplicate checkout paths found");

        let mut edit = material("https://g/x/b.git", "");
        edit.id = created[1].id;
        let err = orchestrator.update_material(app_id, edit, 1).await.unwrap_err();
        assert_eq!(err.to_string(), "checkout path required for multi-git");

        let active = GitMaterial::find_active_by_app(&orchestrator.db().pool, app_id)
            .await
            .unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|m| m.checkout_path.starts_with("./")));
        assert_eq!(fakes.sensor.added().len(), 1);
    }

    #[tokio::test]
    async fn update_pushes_material_and_history() {
        let (orchestrator, fakes) = orchestrator().await;
        let app_id = app(&orchestrator).await;
        let created = orchestrator
            .create_materials(
                CreateMaterialsRequest {
                    app_id,
                    materials: vec![material("https://g/x/y.git", "")],
                },
                1,
            )
            .await
            .unwrap();
        assert_eq!(created[0].checkout_path, "./");

        let mut edit = material("https://g/x/renamed.git", "./src");
        edit.id = created[0].id;
        let updated = orchestrator.update_material(app_id, edit, 2).await.unwrap();
        assert_eq!(updated.name, "7-renamed");
        assert_eq!(fakes.sensor.updated()[0].checkout_location, "./src");

        let history = GitMaterial::find_history(&orchestrator.db().pool, updated.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);

        let mut missing = material("https://g/x/q.git", "./q");
        missing.id = 9999;
        let err = orchestrator.update_material(app_id, missing, 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "material to be updated does not exist");
    }
}
