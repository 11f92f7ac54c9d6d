use sea_orm_migration::prelude::*;

use crate::{
    columns::{
        audited, bool_col, enum_col, fk_id_col, int_col, json_col, pk_id_col, string_col,
        text_col, timestamp_col,
    },
    m20250101000000_baseline::{App, GitMaterial},
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
                    .table(CiTemplate::Table)
                    .col(pk_id_col(manager, CiTemplate::Id))
                    .col(fk_id_col(manager, CiTemplate::AppId))
                    .col(string_col(CiTemplate::DockerRegistryId))
                    .col(string_col(CiTemplate::DockerRepository))
                    .col(fk_id_col(manager, CiTemplate::GitMaterialId))
                    .col(fk_id_col(manager, CiTemplate::BuildContextGitMaterialId))
                    .col(json_col(CiTemplate::BuildConfig))
                    .col(bool_col(CiTemplate::Active, true)),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(CiPipeline::Table)
                    .col(pk_id_col(manager, CiPipeline::Id))
                    .col(fk_id_col(manager, CiPipeline::AppId))
                    .col(ColumnDef::new(CiPipeline::Name).string().not_null())
                    .col(enum_col(CiPipeline::PipelineType))
                    .col(bool_col(CiPipeline::IsManual, false))
                    .col(bool_col(CiPipeline::IsExternal, false))
                    .col(bool_col(CiPipeline::IsDockerConfigOverridden, false))
                    .col(
                        fk_id_col(manager, CiPipeline::ParentCiPipelineId)
                            .default(Expr::val(0))
                            .to_owned(),
                    )
                    .col(json_col(CiPipeline::DockerArgs))
                    .col(bool_col(CiPipeline::ScanEnabled, false))
                    .col(bool_col(CiPipeline::Active, true))
                    .col(bool_col(CiPipeline::Deleted, false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ci_pipeline_app_id")
                            .from(CiPipeline::Table, CiPipeline::AppId)
                            .to(App::Table, App::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    ),
            ))
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ci_pipeline_app_id")
                    .table(CiPipeline::Table)
                    .col(CiPipeline::AppId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ci_pipeline_parent_id")
                    .table(CiPipeline::Table)
                    .col(CiPipeline::ParentCiPipelineId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(CiPipelineMaterial::Table)
                    .col(pk_id_col(manager, CiPipelineMaterial::Id))
                    .col(fk_id_col(manager, CiPipelineMaterial::CiPipelineId))
                    .col(fk_id_col(manager, CiPipelineMaterial::GitMaterialId))
                    .col(enum_col(CiPipelineMaterial::SourceType))
                    .col(string_col(CiPipelineMaterial::Value))
                    .col(string_col(CiPipelineMaterial::Regex))
                    .col(bool_col(CiPipelineMaterial::IsRegex, false))
                    .col(bool_col(CiPipelineMaterial::Active, true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ci_pipeline_material_ci_pipeline_id")
                            .from(CiPipelineMaterial::Table, CiPipelineMaterial::CiPipelineId)
                            .to(CiPipeline::Table, CiPipeline::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ci_pipeline_material_git_material_id")
                            .from(CiPipelineMaterial::Table, CiPipelineMaterial::GitMaterialId)
                            .to(GitMaterial::Table, GitMaterial::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    ),
            ))
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ci_pipeline_material_ci_pipeline_id")
                    .table(CiPipelineMaterial::Table)
                    .col(CiPipelineMaterial::CiPipelineId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(CiTemplateOverride::Table)
                    .col(pk_id_col(manager, CiTemplateOverride::Id))
                    .col(fk_id_col(manager, CiTemplateOverride::CiPipelineId))
                    .col(string_col(CiTemplateOverride::DockerRegistryId))
                    .col(string_col(CiTemplateOverride::DockerRepository))
                    .col(fk_id_col(manager, CiTemplateOverride::GitMaterialId))
                    .col(fk_id_col(manager, CiTemplateOverride::BuildContextGitMaterialId))
                    .col(json_col(CiTemplateOverride::BuildConfig))
                    .col(bool_col(CiTemplateOverride::Active, true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ci_template_override_ci_pipeline_id")
                            .from(CiTemplateOverride::Table, CiTemplateOverride::CiPipelineId)
                            .to(CiPipeline::Table, CiPipeline::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    ),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(CiEnvMapping::Table)
                    .col(pk_id_col(manager, CiEnvMapping::Id))
                    .col(fk_id_col(manager, CiEnvMapping::CiPipelineId))
                    .col(fk_id_col(manager, CiEnvMapping::EnvironmentId))
                    .col(bool_col(CiEnvMapping::Deleted, false)),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(CiPipelineScript::Table)
                    .col(pk_id_col(manager, CiPipelineScript::Id))
                    .col(fk_id_col(manager, CiPipelineScript::CiPipelineId))
                    .col(string_col(CiPipelineScript::Name))
                    .col(int_col(CiPipelineScript::Index))
                    .col(enum_col(CiPipelineScript::Stage))
                    .col(text_col(CiPipelineScript::Script))
                    .col(string_col(CiPipelineScript::OutputLocation))
                    .col(bool_col(CiPipelineScript::Active, true)),
            ))
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(CiPipelineHistory::Table)
                    .col(pk_id_col(manager, CiPipelineHistory::Id))
                    .col(fk_id_col(manager, CiPipelineHistory::CiPipelineId))
                    .col(enum_col(CiPipelineHistory::Trigger))
                    .col(json_col(CiPipelineHistory::TemplateSnapshot))
                    .col(json_col(CiPipelineHistory::MaterialsSnapshot))
                    .col(bool_col(CiPipelineHistory::ScanEnabled, false))
                    .col(bool_col(CiPipelineHistory::IsManual, false))
                    .col(fk_id_col(manager, CiPipelineHistory::CreatedBy))
                    .col(timestamp_col(CiPipelineHistory::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ci_pipeline_history_ci_pipeline_id")
                    .table(CiPipelineHistory::Table)
                    .col(CiPipelineHistory::CiPipelineId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(ExternalCiPipeline::Table)
                    .col(pk_id_col(manager, ExternalCiPipeline::Id))
                    .col(fk_id_col(manager, ExternalCiPipeline::AppId))
                    .col(string_col(ExternalCiPipeline::AccessToken))
                    .col(bool_col(ExternalCiPipeline::Active, true)),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(AppWorkflow::Table)
                    .col(pk_id_col(manager, AppWorkflow::Id))
                    .col(fk_id_col(manager, AppWorkflow::AppId))
                    .col(ColumnDef::new(AppWorkflow::Name).string().not_null())
                    .col(bool_col(AppWorkflow::Active, true)),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(AppWorkflowMapping::Table)
                    .col(pk_id_col(manager, AppWorkflowMapping::Id))
                    .col(fk_id_col(manager, AppWorkflowMapping::AppWorkflowId))
                    .col(
                        fk_id_col(manager, AppWorkflowMapping::ParentId)
                            .default(Expr::val(0))
                            .to_owned(),
                    )
                    .col(ColumnDef::new(AppWorkflowMapping::ParentType).string_len(32))
                    .col(fk_id_col(manager, AppWorkflowMapping::ComponentId))
                    .col(enum_col(AppWorkflowMapping::NodeType))
                    .col(bool_col(AppWorkflowMapping::Active, true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_workflow_mapping_app_workflow_id")
                            .from(AppWorkflowMapping::Table, AppWorkflowMapping::AppWorkflowId)
                            .to(AppWorkflow::Table, AppWorkflow::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    ),
            ))
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_app_workflow_mapping_component")
                    .table(AppWorkflowMapping::Table)
                    .col(AppWorkflowMapping::NodeType)
                    .col(AppWorkflowMapping::ComponentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AppWorkflowMapping::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AppWorkflow::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExternalCiPipeline::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CiPipelineHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CiPipelineScript::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CiEnvMapping::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CiTemplateOverride::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CiPipelineMaterial::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CiPipeline::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CiTemplate::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum CiTemplate {
    Table,
    Id,
    AppId,
    DockerRegistryId,
    DockerRepository,
    GitMaterialId,
    BuildContextGitMaterialId,
    BuildConfig,
    Active,
}

#[derive(Iden)]
pub(crate) enum CiPipeline {
    Table,
    Id,
    AppId,
    Name,
    PipelineType,
    IsManual,
    IsExternal,
    IsDockerConfigOverridden,
    ParentCiPipelineId,
    DockerArgs,
    ScanEnabled,
    Active,
    Deleted,
}

#[derive(Iden)]
enum CiPipelineMaterial {
    Table,
    Id,
    CiPipelineId,
    GitMaterialId,
    SourceType,
    Value,
    Regex,
    IsRegex,
    Active,
}

#[derive(Iden)]
enum CiTemplateOverride {
    Table,
    Id,
    CiPipelineId,
    DockerRegistryId,
    DockerRepository,
    GitMaterialId,
    BuildContextGitMaterialId,
    BuildConfig,
    Active,
}

#[derive(Iden)]
enum CiEnvMapping {
    Table,
    Id,
    CiPipelineId,
    EnvironmentId,
    Deleted,
}

#[derive(Iden)]
enum CiPipelineScript {
    Table,
    Id,
    CiPipelineId,
    Name,
    Index,
    Stage,
    Script,
    OutputLocation,
    Active,
}

#[derive(Iden)]
enum CiPipelineHistory {
    Table,
    Id,
    CiPipelineId,
    Trigger,
    TemplateSnapshot,
    MaterialsSnapshot,
    ScanEnabled,
    IsManual,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum ExternalCiPipeline {
    Table,
    Id,
    AppId,
    AccessToken,
    Active,
}

#[derive(Iden)]
enum AppWorkflow {
    Table,
    Id,
    AppId,
    Name,
    Active,
}

#[derive(Iden)]
enum AppWorkflowMapping {
    Table,
    Id,
    AppWorkflowId,
    ParentId,
    ParentType,
    ComponentId,
    NodeType,
    Active,
}
