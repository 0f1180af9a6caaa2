//! Grading job execution for AutoTest.
//!
//! `GradingJob` prepares a per-job workspace, clones the student's commit,
//! runs the deliverable's grading container under a timeout, and turns
//! whatever happened into an `ExecutionResult`. It never returns an error.

pub mod config;
pub mod container;
pub mod git;
pub mod job;
pub mod workspace;

pub use config::RunnerConfig;
pub use container::DockerRuntime;
pub use git::GitClient;
pub use job::{GradingJob, RunExit};
pub use workspace::Workspace;
