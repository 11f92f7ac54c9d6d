use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use super::Audit;
use crate::{
    entities::{git_material, git_material_history},
    types::StringList,
};

#[derive(Debug, Clone)]
pub struct NewGitMaterial {
    pub app_id: i64,
    pub git_provider_id: i64,
    pub url: String,
    pub name: String,
    pub checkout_path: String,
    pub fetch_submodules: bool,
    pub filter_pattern: Vec<String>,
}

pub struct GitMaterial;

impl GitMaterial {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: NewGitMaterial,
        audit: Audit,
    ) -> Result<git_material::Model, DbErr> {
        git_material::ActiveModel {
            app_id: Set(data.app_id),
            git_provider_id: Set(data.git_provider_id),
            url: Set(data.url),
            name: Set(data.name),
            checkout_path: Set(data.checkout_path),
            fetch_submodules: Set(data.fetch_submodules),
            filter_pattern: Set(StringList(data.filter_pattern)),
            active: Set(true),
            created_by: Set(audit.user_id),
            updated_by: Set(audit.user_id),
            created_at: Set(audit.at),
            updated_at: Set(audit.at),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<git_material::Model, DbErr> {
        git_material::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Git material not found".to_string()))
    }

    pub async fn find_by_ids<C: ConnectionTrait>(
        db: &C,
        ids: &[i64],
    ) -> Result<Vec<git_material::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        git_material::Entity::find()
            .filter(git_material::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(git_material::Column::Id)
            .all(db)
            .await
    }

    pub async fn find_active_by_app<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
    ) -> Result<Vec<git_material::Model>, DbErr> {
        git_material::Entity::find()
            .filter(git_material::Column::AppId.eq(app_id))
            .filter(git_material::Column::Active.eq(true))
            .order_by_asc(git_material::Column::Id)
            .all(db)
            .await
    }

    /// Writes every mutable column of `model` back, stamping the update audit.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        model: git_material::Model,
        audit: Audit,
    ) -> Result<git_material::Model, DbErr> {
        let mut active: git_material::ActiveModel = model.clone().into();
        active.git_provider_id = Set(model.git_provider_id);
        active.url = Set(model.url);
        active.name = Set(model.name);
        active.checkout_path = Set(model.checkout_path);
        active.fetch_submodules = Set(model.fetch_submodules);
        active.filter_pattern = Set(model.filter_pattern);
        active.active = Set(model.active);
        active.updated_by = Set(audit.user_id);
        active.updated_at = Set(audit.at);
        active.update(db).await
    }

    pub async fn save_history<C: ConnectionTrait>(
        db: &C,
        material: &git_material::Model,
        audit: Audit,
    ) -> Result<git_material_history::Model, DbErr> {
        git_material_history::ActiveModel {
            git_material_id: Set(material.id),
            app_id: Set(material.app_id),
            git_provider_id: Set(material.git_provider_id),
            url: Set(material.url.clone()),
            name: Set(material.name.clone()),
            checkout_path: Set(material.checkout_path.clone()),
            fetch_submodules: Set(material.fetch_submodules),
            filter_pattern: Set(material.filter_pattern.clone()),
            active: Set(material.active),
            created_by: Set(audit.user_id),
            created_at: Set(audit.at),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_history<C: ConnectionTrait>(
        db: &C,
        material_id: i64,
    ) -> Result<Vec<git_material_history::Model>, DbErr> {
        git_material_history::Entity::find()
            .filter(git_material_history::Column::GitMaterialId.eq(material_id))
            .order_by_asc(git_material_history::Column::Id)
            .all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::app::{App, NewApp},
        types::AppType,
    };

    #[tokio::test]
    async fn update_keeps_creation_audit_and_writes_history() {
        let db = test_support::setup_db().await;
        let created_audit = Audit::now(1);
        let app = App::create(
            &db,
            NewApp {
                name: "web".to_string(),
                display_name: "web".to_string(),
                app_type: AppType::DevtronApp,
                team_id: 1,
                description: None,
            },
            created_audit,
        )
        .await
        .unwrap();

        let material = GitMaterial::create(
            &db,
            NewGitMaterial {
                app_id: app.id,
                git_provider_id: 7,
                url: "https://g/x/y.git".to_string(),
                name: "7-y".to_string(),
                checkout_path: "./".to_string(),
                fetch_submodules: false,
                filter_pattern: Vec::new(),
            },
            created_audit,
        )
        .await
        .unwrap();
        GitMaterial::save_history(&db, &material, created_audit)
            .await
            .unwrap();

        let mut edited = material.clone();
        edited.checkout_path = "./y".to_string();
        edited.active = false;
        let updated = GitMaterial::update(&db, edited, Audit::now(2)).await.unwrap();
        GitMaterial::save_history(&db, &updated, Audit::now(2))
            .await
            .unwrap();

        assert_eq!(updated.created_by, 1);
        assert_eq!(updated.updated_by, 2);
        assert_eq!(updated.checkout_path, "./y");
        assert!(
            GitMaterial::find_active_by_app(&db, app.id)
                .await
                .unwrap()
                .is_empty()
        );

        let history = GitMaterial::find_history(&db, material.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].active);
        assert!(!history[1].active);
    }
}
