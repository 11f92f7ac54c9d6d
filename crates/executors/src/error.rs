use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Kube(#[from] kube::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("workflow executor not found")]
    ExecutorNotFound,
    #[error("cannot find workflow {0}")]
    WorkflowNotFound(String),
    #[error("invalid cluster config: {0}")]
    InvalidClusterConfig(String),
    #[error("config/secret source failed: {0}")]
    ConfigSource(String),
    #[error("submitted object has no name")]
    MissingName,
}

impl WorkflowError {
    pub fn is_not_found(&self) -> bool {
        match self {
            WorkflowError::WorkflowNotFound(_) => true,
            WorkflowError::Kube(kube::Error::Api(err)) => err.code == 404,
            _ => false,
        }
    }
}
