pub mod clients;
pub mod deployment_type;
pub mod error;
pub mod gitops;
pub mod material;
pub mod orchestrator;
pub mod outbox;
pub mod pipeline_stage;

#[cfg(test)]
pub(crate) mod test_utils;
