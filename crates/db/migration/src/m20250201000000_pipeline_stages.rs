use sea_orm_migration::prelude::*;

use crate::columns::{
    audited, bool_col, enum_col, fk_id_col, fk_id_nullable_col, int_col, json_col, pk_id_col,
    string_col, text_col,
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
                    .table(PluginPipelineScript::Table)
                    .col(pk_id_col(manager, PluginPipelineScript::Id))
                    .col(text_col(PluginPipelineScript::Script))
                    .col(string_col(PluginPipelineScript::StoreScriptAt))
                    .col(enum_col(PluginPipelineScript::ScriptType))
                    .col(string_col(PluginPipelineScript::MountPath))
                    .col(bool_col(PluginPipelineScript::MountCodeToContainer, false))
                    .col(string_col(PluginPipelineScript::MountCodeToContainerPath))
                    .col(bool_col(PluginPipelineScript::MountDirectoryFromHost, false))
                    .col(string_col(PluginPipelineScript::ContainerImagePath))
                    .col(bool_col(PluginPipelineScript::Deleted, false)),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(ScriptPathArgPortMapping::Table)
                    .col(pk_id_col(manager, ScriptPathArgPortMapping::Id))
                    .col(fk_id_col(manager, ScriptPathArgPortMapping::ScriptId))
                    .col(enum_col(ScriptPathArgPortMapping::TypeOfMapping))
                    .col(string_col(ScriptPathArgPortMapping::FilePathOnDisk))
                    .col(string_col(ScriptPathArgPortMapping::FilePathOnContainer))
                    .col(string_col(ScriptPathArgPortMapping::Command))
                    .col(json_col(ScriptPathArgPortMapping::Args))
                    .col(int_col(ScriptPathArgPortMapping::PortOnLocal))
                    .col(int_col(ScriptPathArgPortMapping::PortOnContainer))
                    .col(bool_col(ScriptPathArgPortMapping::Deleted, false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_script_mapping_script_id")
                            .from(ScriptPathArgPortMapping::Table, ScriptPathArgPortMapping::ScriptId)
                            .to(PluginPipelineScript::Table, PluginPipelineScript::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    ),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(PluginMetadata::Table)
                    .col(pk_id_col(manager, PluginMetadata::Id))
                    .col(ColumnDef::new(PluginMetadata::Name).string().not_null())
                    .col(text_col(PluginMetadata::Description))
                    .col(string_col(PluginMetadata::PluginType))
                    .col(bool_col(PluginMetadata::Deleted, false)),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(PluginStep::Table)
                    .col(pk_id_col(manager, PluginStep::Id))
                    .col(fk_id_col(manager, PluginStep::PluginId))
                    .col(string_col(PluginStep::Name))
                    .col(text_col(PluginStep::Description))
                    .col(int_col(PluginStep::Index))
                    .col(enum_col(PluginStep::StepType))
                    .col(fk_id_nullable_col(manager, PluginStep::ScriptId))
                    .col(fk_id_nullable_col(manager, PluginStep::RefPluginId))
                    .col(json_col(PluginStep::OutputDirectoryPath))
                    .col(string_col(PluginStep::DependentOnStep))
                    .col(bool_col(PluginStep::Deleted, false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_plugin_step_plugin_id")
                            .from(PluginStep::Table, PluginStep::PluginId)
                            .to(PluginMetadata::Table, PluginMetadata::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    ),
            ))
            .await?;

        let mut plugin_variable = Table::create();
        plugin_variable
            .if_not_exists()
            .table(PluginStepVariable::Table)
            .col(pk_id_col(manager, PluginStepVariable::Id))
            .col(fk_id_col(manager, PluginStepVariable::PluginStepId));
        manager
            .create_table(audited(
                manager,
                variable_columns(&mut plugin_variable).foreign_key(
                    ForeignKey::create()
                        .name("fk_plugin_step_variable_step_id")
                        .from(PluginStepVariable::Table, PluginStepVariable::PluginStepId)
                        .to(PluginStep::Table, PluginStep::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                ),
            ))
            .await?;

        let mut plugin_condition = Table::create();
        plugin_condition
            .if_not_exists()
            .table(PluginStepCondition::Table)
            .col(pk_id_col(manager, PluginStepCondition::Id))
            .col(fk_id_col(manager, PluginStepCondition::PluginStepId));
        manager
            .create_table(audited(
                manager,
                condition_columns(manager, &mut plugin_condition).foreign_key(
                    ForeignKey::create()
                        .name("fk_plugin_step_condition_step_id")
                        .from(PluginStepCondition::Table, PluginStepCondition::PluginStepId)
                        .to(PluginStep::Table, PluginStep::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                ),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(PipelineStage::Table)
                    .col(pk_id_col(manager, PipelineStage::Id))
                    .col(fk_id_nullable_col(manager, PipelineStage::CiPipelineId))
                    .col(fk_id_nullable_col(manager, PipelineStage::CdPipelineId))
                    .col(enum_col(PipelineStage::StageType))
                    .col(string_col(PipelineStage::Name))
                    .col(text_col(PipelineStage::Description))
                    .col(enum_col(PipelineStage::TriggerType))
                    .col(bool_col(PipelineStage::Deleted, false)),
            ))
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_pipeline_stage_ci_pipeline_id")
                    .table(PipelineStage::Table)
                    .col(PipelineStage::CiPipelineId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_pipeline_stage_cd_pipeline_id")
                    .table(PipelineStage::Table)
                    .col(PipelineStage::CdPipelineId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(PipelineStageStep::Table)
                    .col(pk_id_col(manager, PipelineStageStep::Id))
                    .col(fk_id_col(manager, PipelineStageStep::PipelineStageId))
                    .col(enum_col(PipelineStageStep::StepType))
                    .col(string_col(PipelineStageStep::Name))
                    .col(text_col(PipelineStageStep::Description))
                    .col(int_col(PipelineStageStep::Index))
                    .col(json_col(PipelineStageStep::OutputDirectoryPath))
                    .col(string_col(PipelineStageStep::DependentOnStep))
                    .col(fk_id_nullable_col(manager, PipelineStageStep::ScriptId))
                    .col(fk_id_nullable_col(manager, PipelineStageStep::RefPluginId))
                    .col(bool_col(PipelineStageStep::TriggerIfParentStageFail, false))
                    .col(bool_col(PipelineStageStep::Deleted, false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pipeline_stage_step_stage_id")
                            .from(PipelineStageStep::Table, PipelineStageStep::PipelineStageId)
                            .to(PipelineStage::Table, PipelineStage::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    ),
            ))
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_pipeline_stage_step_stage_id")
                    .table(PipelineStageStep::Table)
                    .col(PipelineStageStep::PipelineStageId)
                    .to_owned(),
            )
            .await?;

        let mut step_variable = Table::create();
        step_variable
            .if_not_exists()
            .table(PipelineStageStepVariable::Table)
            .col(pk_id_col(manager, PipelineStageStepVariable::Id))
            .col(fk_id_col(manager, PipelineStageStepVariable::PipelineStageStepId));
        manager
            .create_table(audited(
                manager,
                variable_columns(&mut step_variable).foreign_key(
                    ForeignKey::create()
                        .name("fk_pipeline_stage_step_variable_step_id")
                        .from(
                            PipelineStageStepVariable::Table,
                            PipelineStageStepVariable::PipelineStageStepId,
                        )
                        .to(PipelineStageStep::Table, PipelineStageStep::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                ),
            ))
            .await?;

        let mut step_condition = Table::create();
        step_condition
            .if_not_exists()
            .table(PipelineStageStepCondition::Table)
            .col(pk_id_col(manager, PipelineStageStepCondition::Id))
            .col(fk_id_col(manager, PipelineStageStepCondition::PipelineStageStepId));
        manager
            .create_table(audited(
                manager,
                condition_columns(manager, &mut step_condition).foreign_key(
                    ForeignKey::create()
                        .name("fk_pipeline_stage_step_condition_step_id")
                        .from(
                            PipelineStageStepCondition::Table,
                            PipelineStageStepCondition::PipelineStageStepId,
                        )
                        .to(PipelineStageStep::Table, PipelineStageStep::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                ),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PipelineStageStepCondition::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PipelineStageStepVariable::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PipelineStageStep::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PipelineStage::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PluginStepCondition::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PluginStepVariable::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PluginStep::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PluginMetadata::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ScriptPathArgPortMapping::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PluginPipelineScript::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn variable_columns(table: &mut TableCreateStatement) -> &mut TableCreateStatement {
    table
        .col(ColumnDef::new(StepVariable::Name).string().not_null())
        .col(enum_col(StepVariable::Format))
        .col(text_col(StepVariable::Description))
        .col(bool_col(StepVariable::IsExposed, true))
        .col(bool_col(StepVariable::AllowEmptyValue, false))
        .col(text_col(StepVariable::DefaultValue))
        .col(text_col(StepVariable::Value))
        .col(enum_col(StepVariable::VariableType))
        .col(enum_col(StepVariable::ValueType))
        .col(ColumnDef::new(StepVariable::PreviousStepIndex).integer())
        .col(ColumnDef::new(StepVariable::VariableStepIndexInPlugin).integer())
        .col(string_col(StepVariable::ReferenceVariableName))
        .col(ColumnDef::new(StepVariable::ReferenceVariableStage).string_len(32))
        .col(bool_col(StepVariable::Deleted, false))
}

fn condition_columns<'a>(
    manager: &SchemaManager,
    table: &'a mut TableCreateStatement,
) -> &'a mut TableCreateStatement {
    table
        .col(fk_id_col(manager, StepCondition::ConditionVariableId))
        .col(enum_col(StepCondition::ConditionType))
        .col(string_col(StepCondition::ConditionalOperator))
        .col(text_col(StepCondition::ConditionalValue))
        .col(bool_col(StepCondition::Deleted, false))
}

#[derive(Iden)]
enum StepVariable {
    Name,
    Format,
    Description,
    IsExposed,
    AllowEmptyValue,
    DefaultValue,
    Value,
    VariableType,
    ValueType,
    PreviousStepIndex,
    VariableStepIndexInPlugin,
    ReferenceVariableName,
    ReferenceVariableStage,
    Deleted,
}

#[derive(Iden)]
enum StepCondition {
    ConditionVariableId,
    ConditionType,
    ConditionalOperator,
    ConditionalValue,
    Deleted,
}

#[derive(Iden)]
enum PluginPipelineScript {
    Table,
    Id,
    Script,
    StoreScriptAt,
    ScriptType,
    MountPath,
    MountCodeToContainer,
    MountCodeToContainerPath,
    MountDirectoryFromHost,
    ContainerImagePath,
    Deleted,
}

#[derive(Iden)]
enum ScriptPathArgPortMapping {
    Table,
    Id,
    ScriptId,
    TypeOfMapping,
    FilePathOnDisk,
    FilePathOnContainer,
    Command,
    Args,
    PortOnLocal,
    PortOnContainer,
    Deleted,
}

#[derive(Iden)]
enum PluginMetadata {
    Table,
    Id,
    Name,
    Description,
    PluginType,
    Deleted,
}

#[derive(Iden)]
enum PluginStep {
    Table,
    Id,
    PluginId,
    Name,
    Description,
    Index,
    StepType,
    ScriptId,
    RefPluginId,
    OutputDirectoryPath,
    DependentOnStep,
    Deleted,
}

#[derive(Iden)]
enum PluginStepVariable {
    Table,
    Id,
    PluginStepId,
}

#[derive(Iden)]
enum PluginStepCondition {
    Table,
    Id,
    PluginStepId,
}

#[derive(Iden)]
enum PipelineStage {
    Table,
    Id,
    CiPipelineId,
    CdPipelineId,
    StageType,
    Name,
    Description,
    TriggerType,
    Deleted,
}

#[derive(Iden)]
enum PipelineStageStep {
    Table,
    Id,
    PipelineStageId,
    StepType,
    Name,
    Description,
    Index,
    OutputDirectoryPath,
    DependentOnStep,
    ScriptId,
    RefPluginId,
    TriggerIfParentStageFail,
    Deleted,
}

#[derive(Iden)]
enum PipelineStageStepVariable {
    Table,
    Id,
    PipelineStageStepId,
}

#[derive(Iden)]
enum PipelineStageStepCondition {
    Table,
    Id,
    PipelineStageStepId,
}
