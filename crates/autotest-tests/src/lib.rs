//! Test infrastructure for AutoTest.
//!
//! In-process fakes for every collaborator port, so the scheduler, executor
//! and comment state machine can be exercised together without Docker,
//! git or GitHub.

pub mod context;
pub mod fakes;
pub mod fixtures;
pub mod helpers;

pub use context::TestContext;
pub use fakes::*;
pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,autotest_engine=debug")),
        )
        .with_test_writer()
        .try_init();
}
