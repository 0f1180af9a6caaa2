//! AutoTest Core
//!
//! Domain types, collaborator ports, and error handling for AutoTest.
//! Every other crate in the workspace speaks in these types; this crate
//! has no runtime dependencies of its own.

pub mod error;
pub mod feedback;
pub mod ids;
pub mod ports;
pub mod result;
pub mod target;
pub mod util;

pub use error::{Error, Result};
pub use feedback::{AuthInfo, FeedbackGrant, QueueStatus};
pub use ids::*;
pub use result::{ContainerOutput, ContainerState, ExecutionResult, GradeReport};
pub use target::{CommitTarget, ContainerConfig, JobDescriptor, Tier};
