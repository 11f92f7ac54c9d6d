use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use sea_orm::sea_query::Expr;

use super::Audit;
use crate::{
    entities::{app_workflow, app_workflow_mapping},
    types::WorkflowNodeType,
};

#[derive(Debug, Clone)]
pub struct NewMapping {
    pub app_workflow_id: i64,
    pub parent_id: i64,
    pub parent_type: Option<WorkflowNodeType>,
    pub component_id: i64,
    pub node_type: WorkflowNodeType,
}

pub struct AppWorkflow;

impl AppWorkflow {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        app_id: i64,
        name: &str,
        audit: Audit,
    ) -> Result<app_workflow::Model, DbErr> {
        app_workflow::ActiveModel {
            app_id: Set(app_id),
            name: Set(name.to_string()),
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

    pub async fn find_active_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> Result<Option<app_workflow::Model>, DbErr> {
        app_workflow::Entity::find_by_id(id)
            .filter(app_workflow::Column::Active.eq(true))
            .one(db)
            .await
    }

    pub async fn deactivate<C: ConnectionTrait>(
        db: &C,
        id: i64,
        audit: Audit,
    ) -> Result<(), DbErr> {
        app_workflow::Entity::update_many()
            .col_expr(app_workflow::Column::Active, Expr::value(false))
            .col_expr(app_workflow::Column::UpdatedBy, Expr::value(audit.user_id))
            .col_expr(app_workflow::Column::UpdatedAt, Expr::value(audit.at))
            .filter(app_workflow::Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn create_mapping<C: ConnectionTrait>(
        db: &C,
        data: NewMapping,
        audit: Audit,
    ) -> Result<app_workflow_mapping::Model, DbErr> {
        app_workflow_mapping::ActiveModel {
            app_workflow_id: Set(data.app_workflow_id),
            parent_id: Set(data.parent_id),
            parent_type: Set(data.parent_type),
            component_id: Set(data.component_id),
            node_type: Set(data.node_type),
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

    /// The active node for a pipeline component.
    pub async fn find_mapping_by_component<C: ConnectionTrait>(
        db: &C,
        node_type: WorkflowNodeType,
        component_id: i64,
    ) -> Result<Option<app_workflow_mapping::Model>, DbErr> {
        app_workflow_mapping::Entity::find()
            .filter(app_workflow_mapping::Column::NodeType.eq(node_type))
            .filter(app_workflow_mapping::Column::ComponentId.eq(component_id))
            .filter(app_workflow_mapping::Column::Active.eq(true))
            .one(db)
            .await
    }

    /// Active nodes hanging directly off `parent_id`.
    pub async fn find_children<C: ConnectionTrait>(
        db: &C,
        parent_type: WorkflowNodeType,
        parent_id: i64,
    ) -> Result<Vec<app_workflow_mapping::Model>, DbErr> {
        app_workflow_mapping::Entity::find()
            .filter(app_workflow_mapping::Column::ParentType.eq(parent_type))
            .filter(app_workflow_mapping::Column::ParentId.eq(parent_id))
            .filter(app_workflow_mapping::Column::Active.eq(true))
            .order_by_asc(app_workflow_mapping::Column::Id)
            .all(db)
            .await
    }

    pub async fn deactivate_mapping<C: ConnectionTrait>(
        db: &C,
        id: i64,
        audit: Audit,
    ) -> Result<(), DbErr> {
        app_workflow_mapping::Entity::update_many()
            .col_expr(app_workflow_mapping::Column::Active, Expr::value(false))
            .col_expr(
                app_workflow_mapping::Column::UpdatedBy,
                Expr::value(audit.user_id),
            )
            .col_expr(app_workflow_mapping::Column::UpdatedAt, Expr::value(audit.at))
            .filter(app_workflow_mapping::Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn children_lookup_follows_parent_edges() {
        let db = test_support::setup_db().await;
        let audit = Audit::now(1);
        let wf = AppWorkflow::create(&db, 1, "wf-1-abcd", audit).await.unwrap();
        AppWorkflow::create_mapping(
            &db,
            NewMapping {
                app_workflow_id: wf.id,
                parent_id: 0,
                parent_type: None,
                component_id: 10,
                node_type: WorkflowNodeType::CiPipeline,
            },
            audit,
        )
        .await
        .unwrap();
        let cd = AppWorkflow::create_mapping(
            &db,
            NewMapping {
                app_workflow_id: wf.id,
                parent_id: 10,
                parent_type: Some(WorkflowNodeType::CiPipeline),
                component_id: 20,
                node_type: WorkflowNodeType::CdPipeline,
            },
            audit,
        )
        .await
        .unwrap();

        let children = AppWorkflow::find_children(&db, WorkflowNodeType::CiPipeline, 10)
            .await
            .unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].component_id, 20);

        AppWorkflow::deactivate_mapping(&db, cd.id, audit).await.unwrap();
        assert!(
            AppWorkflow::find_mapping_by_component(&db, WorkflowNodeType::CdPipeline, 20)
                .await
                .unwrap()
                .is_none()
        );
    }
}
