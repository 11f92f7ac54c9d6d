use db::DbErr;
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use super::clients::ClientError;

/// Message returned when an RBAC check declines a patch.
pub const NOT_AUTHORIZED_MESSAGE: &str = "unauthorized user";

/// Caller-facing classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Invalid,
    NotFound,
    Conflict,
    Permission,
    Unavailable,
    Fatal,
    Skip,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("invalid stage yaml: {0}")]
    StageYaml(#[from] serde_yaml::Error),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Permission(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("skip: {0}")]
    Skip(String),
    #[error("{0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Database(DbErr::RecordNotFound(_)) => ErrorKind::NotFound,
            Self::Database(_) | Self::Serialization(_) | Self::Fatal(_) => ErrorKind::Fatal,
            Self::Client(err) => match err {
                ClientError::NotFound(_) => ErrorKind::NotFound,
                ClientError::AlreadyExists(_) => ErrorKind::Conflict,
                ClientError::Unavailable(_) => ErrorKind::Unavailable,
                ClientError::Rejected(_) => ErrorKind::Fatal,
            },
            Self::StageYaml(_) | Self::Invalid(_) => ErrorKind::Invalid,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Permission(_) => ErrorKind::Permission,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Skip(_) => ErrorKind::Skip,
        }
    }
}
