use sea_orm_migration::prelude::*;

use crate::columns::{
    audited, bool_col, enum_col, fk_id_col, json_col, pk_id_col, string_col, text_col,
    timestamp_col,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(Pipeline::Table)
                    .col(pk_id_col(manager, Pipeline::Id))
                    .col(fk_id_col(manager, Pipeline::AppId))
                    .col(fk_id_col(manager, Pipeline::EnvironmentId))
                    .col(ColumnDef::new(Pipeline::Name).string().not_null())
                    .col(fk_id_col(manager, Pipeline::CiPipelineId))
                    .col(enum_col(Pipeline::TriggerType))
                    .col(text_col(Pipeline::PreStageConfig))
                    .col(text_col(Pipeline::PostStageConfig))
                    .col(enum_col(Pipeline::PreTriggerType))
                    .col(enum_col(Pipeline::PostTriggerType))
                    .col(json_col(Pipeline::PreStageCmCsNames))
                    .col(json_col(Pipeline::PostStageCmCsNames))
                    .col(bool_col(Pipeline::RunPreStageInEnv, false))
                    .col(bool_col(Pipeline::RunPostStageInEnv, false))
                    .col(enum_col(Pipeline::DeploymentAppType))
                    .col(string_col(Pipeline::DeploymentAppName))
                    .col(bool_col(Pipeline::DeploymentAppCreated, false))
                    .col(bool_col(Pipeline::DeploymentAppDeleteRequest, false))
                    .col(bool_col(Pipeline::Deleted, false)),
            ))
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_pipeline_app_env")
                    .table(Pipeline::Table)
                    .col(Pipeline::AppId)
                    .col(Pipeline::EnvironmentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(PrePostCdScriptHistory::Table)
                    .col(pk_id_col(manager, PrePostCdScriptHistory::Id))
                    .col(fk_id_col(manager, PrePostCdScriptHistory::PipelineId))
                    .col(enum_col(PrePostCdScriptHistory::Stage))
                    .col(text_col(PrePostCdScriptHistory::Script))
                    .col(json_col(PrePostCdScriptHistory::CmCsNames))
                    .col(enum_col(PrePostCdScriptHistory::TriggerType))
                    .col(bool_col(PrePostCdScriptHistory::ExecInEnv, false))
                    .col(fk_id_col(manager, PrePostCdScriptHistory::CreatedBy))
                    .col(timestamp_col(PrePostCdScriptHistory::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(DeploymentGroup::Table)
                    .col(pk_id_col(manager, DeploymentGroup::Id))
                    .col(ColumnDef::new(DeploymentGroup::Name).string().not_null())
                    .col(fk_id_col(manager, DeploymentGroup::EnvironmentId))
                    .col(fk_id_col(manager, DeploymentGroup::CiPipelineId))
                    .col(bool_col(DeploymentGroup::Active, true)),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(DeploymentGroupApp::Table)
                    .col(pk_id_col(manager, DeploymentGroupApp::Id))
                    .col(fk_id_col(manager, DeploymentGroupApp::DeploymentGroupId))
                    .col(fk_id_col(manager, DeploymentGroupApp::AppId))
                    .col(bool_col(DeploymentGroupApp::Active, true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deployment_group_app_group_id")
                            .from(DeploymentGroupApp::Table, DeploymentGroupApp::DeploymentGroupId)
                            .to(DeploymentGroup::Table, DeploymentGroup::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    ),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeploymentGroupApp::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DeploymentGroup::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PrePostCdScriptHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Pipeline::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Pipeline {
    Table,
    Id,
    AppId,
    EnvironmentId,
    Name,
    CiPipelineId,
    TriggerType,
    PreStageConfig,
    PostStageConfig,
    PreTriggerType,
    PostTriggerType,
    PreStageCmCsNames,
    PostStageCmCsNames,
    RunPreStageInEnv,
    RunPostStageInEnv,
    DeploymentAppType,
    DeploymentAppName,
    DeploymentAppCreated,
    DeploymentAppDeleteRequest,
    Deleted,
}

#[derive(Iden)]
enum PrePostCdScriptHistory {
    Table,
    Id,
    PipelineId,
    Stage,
    Script,
    CmCsNames,
    TriggerType,
    ExecInEnv,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum DeploymentGroup {
    Table,
    Id,
    Name,
    EnvironmentId,
    CiPipelineId,
    Active,
}

#[derive(Iden)]
enum DeploymentGroupApp {
    Table,
    Id,
    DeploymentGroupId,
    AppId,
    Active,
}
