//! Translation runs.
//!
//! A run moves through strictly sequential phases:
//! - **Validate**: inputs, languages and glossary formats, with no side effects
//! - **Upload**: accepted files into a fresh source container
//! - **Submit / Poll**: hand the job to the service and wait for it to finish
//! - **Download**: fetch the target container into the output directory
//! - **Cleanup**: delete the run's containers, occasionally sweeping old ones

mod orchestrator;
mod types;

pub use orchestrator::RunOrchestrator;
pub use types::{RunError, RunOutcome, RunRequest};
