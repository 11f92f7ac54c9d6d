use sea_orm_migration::prelude::*;

use crate::columns::{
    audited, bool_col, enum_col, fk_id_col, int_col, json_col, pk_id_col, string_col,
    timestamp_col, uuid_col,
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
                    .table(App::Table)
                    .col(pk_id_col(manager, App::Id))
                    .col(ColumnDef::new(App::Name).string().not_null())
                    .col(string_col(App::DisplayName))
                    .col(enum_col(App::AppType))
                    .col(fk_id_col(manager, App::TeamId))
                    .col(ColumnDef::new(App::Description).text())
                    .col(bool_col(App::Active, true)),
            ))
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_app_name_active")
                    .table(App::Table)
                    .col(App::Name)
                    .col(App::Active)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(AppLabel::Table)
                    .col(pk_id_col(manager, AppLabel::Id))
                    .col(fk_id_col(manager, AppLabel::AppId))
                    .col(ColumnDef::new(AppLabel::Key).string().not_null())
                    .col(string_col(AppLabel::Value))
                    .col(bool_col(AppLabel::Propagate, false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_label_app_id")
                            .from(AppLabel::Table, AppLabel::AppId)
                            .to(App::Table, App::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    ),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(GenericNote::Table)
                    .col(pk_id_col(manager, GenericNote::Id))
                    .col(fk_id_col(manager, GenericNote::AppId))
                    .col(ColumnDef::new(GenericNote::Description).text().not_null()),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(GitMaterial::Table)
                    .col(pk_id_col(manager, GitMaterial::Id))
                    .col(fk_id_col(manager, GitMaterial::AppId))
                    .col(fk_id_col(manager, GitMaterial::GitProviderId))
                    .col(ColumnDef::new(GitMaterial::Url).string().not_null())
                    .col(string_col(GitMaterial::Name))
                    .col(string_col(GitMaterial::CheckoutPath))
                    .col(bool_col(GitMaterial::FetchSubmodules, false))
                    .col(json_col(GitMaterial::FilterPattern))
                    .col(bool_col(GitMaterial::Active, true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_git_material_app_id")
                            .from(GitMaterial::Table, GitMaterial::AppId)
                            .to(App::Table, App::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    ),
            ))
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_git_material_app_id")
                    .table(GitMaterial::Table)
                    .col(GitMaterial::AppId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(GitMaterialHistory::Table)
                    .col(pk_id_col(manager, GitMaterialHistory::Id))
                    .col(fk_id_col(manager, GitMaterialHistory::GitMaterialId))
                    .col(fk_id_col(manager, GitMaterialHistory::AppId))
                    .col(fk_id_col(manager, GitMaterialHistory::GitProviderId))
                    .col(ColumnDef::new(GitMaterialHistory::Url).string().not_null())
                    .col(string_col(GitMaterialHistory::Name))
                    .col(string_col(GitMaterialHistory::CheckoutPath))
                    .col(bool_col(GitMaterialHistory::FetchSubmodules, false))
                    .col(json_col(GitMaterialHistory::FilterPattern))
                    .col(bool_col(GitMaterialHistory::Active, true))
                    .col(fk_id_col(manager, GitMaterialHistory::CreatedBy))
                    .col(timestamp_col(GitMaterialHistory::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(Cluster::Table)
                    .col(pk_id_col(manager, Cluster::Id))
                    .col(ColumnDef::new(Cluster::ClusterName).string().not_null())
                    .col(string_col(Cluster::ServerUrl))
                    .col(string_col(Cluster::BearerToken))
                    .col(string_col(Cluster::ErrorInConnecting))
                    .col(bool_col(Cluster::Active, true)),
            ))
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(Environment::Table)
                    .col(pk_id_col(manager, Environment::Id))
                    .col(ColumnDef::new(Environment::Name).string().not_null())
                    .col(fk_id_col(manager, Environment::ClusterId))
                    .col(string_col(Environment::Namespace))
                    .col(bool_col(Environment::Active, true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_environment_cluster_id")
                            .from(Environment::Table, Environment::ClusterId)
                            .to(Cluster::Table, Cluster::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    ),
            ))
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(AppStatus::Table)
                    .col(pk_id_col(manager, AppStatus::Id))
                    .col(fk_id_col(manager, AppStatus::AppId))
                    .col(fk_id_col(manager, AppStatus::EnvironmentId))
                    .col(string_col(AppStatus::Status))
                    .col(timestamp_col(AppStatus::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_app_status_app_env")
                    .table(AppStatus::Table)
                    .col(AppStatus::AppId)
                    .col(AppStatus::EnvironmentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(audited(
                manager,
                Table::create()
                    .if_not_exists()
                    .table(Chart::Table)
                    .col(pk_id_col(manager, Chart::Id))
                    .col(fk_id_col(manager, Chart::AppId))
                    .col(string_col(Chart::ChartLocation))
                    .col(string_col(Chart::GitRepoUrl))
                    .col(bool_col(Chart::Latest, true))
                    .col(bool_col(Chart::Active, true)),
            ))
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(EventOutbox::Table)
                    .col(pk_id_col(manager, EventOutbox::Id))
                    .col(uuid_col(EventOutbox::Uuid))
                    .col(ColumnDef::new(EventOutbox::EventType).string_len(64).not_null())
                    .col(ColumnDef::new(EventOutbox::EntityType).string_len(64).not_null())
                    .col(fk_id_col(manager, EventOutbox::EntityId))
                    .col(json_col(EventOutbox::Payload))
                    .col(timestamp_col(EventOutbox::CreatedAt))
                    .col(ColumnDef::new(EventOutbox::PublishedAt).timestamp())
                    .col(int_col(EventOutbox::Attempts))
                    .col(ColumnDef::new(EventOutbox::LastError).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_event_outbox_uuid")
                    .table(EventOutbox::Table)
                    .col(EventOutbox::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_event_outbox_published_at")
                    .table(EventOutbox::Table)
                    .col(EventOutbox::PublishedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventOutbox::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Chart::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AppStatus::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Environment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Cluster::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GitMaterialHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GitMaterial::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GenericNote::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AppLabel::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(App::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
pub(crate) enum App {
    Table,
    Id,
    Name,
    DisplayName,
    AppType,
    TeamId,
    Description,
    Active,
}

#[derive(Iden)]
enum AppLabel {
    Table,
    Id,
    AppId,
    Key,
    Value,
    Propagate,
}

#[derive(Iden)]
enum GenericNote {
    Table,
    Id,
    AppId,
    Description,
}

#[derive(Iden)]
pub(crate) enum GitMaterial {
    Table,
    Id,
    AppId,
    GitProviderId,
    Url,
    Name,
    CheckoutPath,
    FetchSubmodules,
    FilterPattern,
    Active,
}

#[derive(Iden)]
enum GitMaterialHistory {
    Table,
    Id,
    GitMaterialId,
    AppId,
    GitProviderId,
    Url,
    Name,
    CheckoutPath,
    FetchSubmodules,
    FilterPattern,
    Active,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum Cluster {
    Table,
    Id,
    ClusterName,
    ServerUrl,
    BearerToken,
    ErrorInConnecting,
    Active,
}

#[derive(Iden)]
enum Environment {
    Table,
    Id,
    Name,
    ClusterId,
    Namespace,
    Active,
}

#[derive(Iden)]
enum AppStatus {
    Table,
    Id,
    AppId,
    EnvironmentId,
    Status,
    UpdatedAt,
}

#[derive(Iden)]
enum Chart {
    Table,
    Id,
    AppId,
    ChartLocation,
    GitRepoUrl,
    Latest,
    Active,
}

#[derive(Iden)]
enum EventOutbox {
    Table,
    Id,
    Uuid,
    EventType,
    EntityType,
    EntityId,
    Payload,
    CreatedAt,
    PublishedAt,
    Attempts,
    LastError,
}
