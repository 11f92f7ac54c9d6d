use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

pub(crate) fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

pub(crate) fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

pub(crate) fn fk_id_nullable_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.to_owned()
}

pub(crate) fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

pub(crate) fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

pub(crate) fn string_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .string()
        .not_null()
        .default(Expr::val(""))
        .to_owned()
}

pub(crate) fn text_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .text()
        .not_null()
        .default(Expr::val(""))
        .to_owned()
}

pub(crate) fn enum_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).string_len(32).not_null().to_owned()
}

pub(crate) fn bool_col<T: Iden>(col: T, default: bool) -> ColumnDef {
    ColumnDef::new(col)
        .boolean()
        .not_null()
        .default(Expr::val(default))
        .to_owned()
}

pub(crate) fn int_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .integer()
        .not_null()
        .default(Expr::val(0))
        .to_owned()
}

pub(crate) fn json_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).json().not_null().to_owned()
}

#[derive(Iden)]
pub(crate) enum Audit {
    CreatedBy,
    UpdatedBy,
    CreatedAt,
    UpdatedAt,
}

/// Appends `created_by`, `updated_by`, `created_at` and `updated_at`.
pub(crate) fn audited(
    manager: &SchemaManager,
    table: &mut TableCreateStatement,
) -> TableCreateStatement {
    table
        .col(fk_id_col(manager, Audit::CreatedBy).default(Expr::val(0)).to_owned())
        .col(fk_id_col(manager, Audit::UpdatedBy).default(Expr::val(0)).to_owned())
        .col(timestamp_col(Audit::CreatedAt))
        .col(timestamp_col(Audit::UpdatedAt))
        .to_owned()
}
