pub mod argo;
pub mod cluster;
pub mod error;
pub mod job;
mod manifests;
pub mod request;
pub mod steps;
pub mod submitter;
pub mod template;

pub use error::WorkflowError;
pub use submitter::{CmCsSource, SubmittedWorkflow, WorkflowExecutor, WorkflowSubmitter};
