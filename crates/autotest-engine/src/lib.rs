//! AutoTest orchestration.
//!
//! `AutoTest` owns the scheduler and the completion loop that turns finished
//! jobs into datastore writes and postbacks. `GitHubAutoTest` is the push and
//! comment state machine, including the student feedback quota.

pub mod autotest;
pub mod github;
pub mod launcher;

pub use autotest::{AutoTest, Collaborators};
pub use github::{GitHubAutoTest, GitHubConfig, GitHubExecutionProcessor};
pub use launcher::ExecutorLauncher;
