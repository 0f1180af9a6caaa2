//! Error types for AutoTest.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Course configuration errors
    #[error("Deliverable not found: {0}")]
    DeliverableNotFound(String),

    #[error("No container configuration for deliverable: {0}")]
    ContainerConfigMissing(String),

    // Event errors
    #[error("Invalid commit target: {0}")]
    InvalidTarget(String),

    // Scheduling errors
    #[error("Queue error: {0}")]
    Queue(String),

    // Execution errors
    #[error("Container error: {0}")]
    Container(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Grade report unavailable: {0}")]
    Report(String),

    // Collaborator errors
    #[error("Datastore error: {0}")]
    Datastore(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
