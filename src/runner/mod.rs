mod executor;
mod expr;
mod pipeline;
mod run;
mod status;

pub use executor::{DryRunExecutor, ShellExecutor, UnmappedActionPolicy};
pub use pipeline::PipelineRunner;
pub use run::Trigger;
pub use status::{SkipReason, StageStatus, StepStatus};
