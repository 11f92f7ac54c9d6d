use executors::WorkflowError;
use reqwest::StatusCode;
use serde::Serialize;
use services::services::error::{ErrorKind, PipelineError};
use ts_rs::TS;

/// Error body returned to callers of the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: String,
    pub http_status_code: u16,
    pub internal_message: String,
    pub user_message: String,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Invalid | ErrorKind::Skip => StatusCode::BAD_REQUEST,
        ErrorKind::Permission => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    fn new(status: StatusCode, internal_message: String, user_message: String) -> Self {
        if status.is_server_error() {
            tracing::error!(status = %status, error = %internal_message, "request failed");
        }
        Self {
            code: status.as_u16().to_string(),
            http_status_code: status.as_u16(),
            internal_message,
            user_message,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = status_for(err.kind());
        let internal = err.to_string();
        // Driver detail stays in the internal message.
        let user = match &err {
            PipelineError::Database(_) if status.is_server_error() => {
                "internal server error".to_string()
            }
            _ => internal.clone(),
        };
        Self::new(status, internal, user)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let status = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            match err {
                WorkflowError::ExecutorNotFound | WorkflowError::InvalidClusterConfig(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        };
        let message = err.to_string();
        Self::new(status, message.clone(), message)
    }
}
