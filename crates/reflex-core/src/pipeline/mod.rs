pub mod config;
mod orchestrator;
mod types;

pub use orchestrator::{reduce, run_reduction};
pub use types::{ProgressReporter, ReductionOutput, ReductionStage};
