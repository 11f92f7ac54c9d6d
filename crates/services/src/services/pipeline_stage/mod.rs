//! Pre/post stage persistence and compilation into runner step objects.

pub mod compiler;
pub mod legacy;
pub mod store;
pub mod types;
pub mod validation;

pub use compiler::{CompiledStages, StageCompiler};
pub use store::StageStore;
pub use types::{
    CommandArgs, ConditionRequest, InlineStepDetail, MountPathMap, PortMap, RefPluginStepDetail,
    StageRequest, StepRequest, VariableRequest,
};
