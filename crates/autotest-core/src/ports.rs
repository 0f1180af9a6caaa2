//! Port traits (hexagonal architecture).
//!
//! These traits define the boundary between the grading core and its collaborators:
//! storage, the course portal, the comment channel, the container runtime and git.

use crate::feedback::{AuthInfo, FeedbackGrant};
use crate::result::ExecutionResult;
use crate::target::{CommitTarget, ContainerConfig, JobDescriptor};
use crate::Result;
use async_trait::async_trait;
use std::path::Path;

/// Storage for push, comment, quota and result records.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn save_push(&self, target: &CommitTarget) -> Result<()>;

    async fn get_push_record(&self, commit_url: &str) -> Result<Option<CommitTarget>>;

    /// Save a feedback request; the latest comment per commit and deliverable wins.
    async fn save_comment(&self, target: &CommitTarget) -> Result<()>;

    /// Outstanding feedback request for a commit and deliverable, if any.
    async fn get_comment_record(
        &self,
        commit_url: &str,
        deliv_id: &str,
    ) -> Result<Option<CommitTarget>>;

    async fn save_feedback_grant(&self, grant: &FeedbackGrant) -> Result<()>;

    /// Most recent grant for a person on a deliverable.
    async fn get_latest_feedback_grant(
        &self,
        deliv_id: &str,
        person_id: &str,
    ) -> Result<Option<FeedbackGrant>>;

    async fn get_feedback_grant_for_commit(
        &self,
        commit_url: &str,
        deliv_id: &str,
        person_id: &str,
    ) -> Result<Option<FeedbackGrant>>;

    async fn save_result(&self, result: &ExecutionResult) -> Result<()>;

    async fn get_result(&self, commit_url: &str, deliv_id: &str)
    -> Result<Option<ExecutionResult>>;
}

/// Course configuration: deliverables, roster and container settings.
#[async_trait]
pub trait CoursePortal: Send + Sync {
    async fn default_deliverable_id(&self) -> Result<Option<String>>;

    async fn is_staff(&self, person_id: &str) -> Result<AuthInfo>;

    async fn container_config(&self, deliv_id: &str) -> Result<Option<ContainerConfig>>;
}

/// Posts markdown comments back to the source-control host.
#[async_trait]
pub trait CommentChannel: Send + Sync {
    /// Returns `false` when the host rejected the post.
    async fn post_message(&self, url: &str, markdown: &str) -> Result<bool>;
}

/// Container creation parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// `KEY=value` pairs.
    pub env: Vec<String>,
    /// `host:container` bind mounts.
    pub binds: Vec<String>,
    pub network: Option<String>,
    pub extra_hosts: Vec<String>,
    pub user: Option<String>,
    pub nano_cpus: Option<i64>,
    pub memory_bytes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle>;

    async fn start(&self, handle: &ContainerHandle) -> Result<()>;

    /// Stop, killing after `grace_secs`.
    async fn stop(&self, handle: &ContainerHandle, grace_secs: i64) -> Result<()>;

    /// Wait for exit and return the exit code.
    async fn wait(&self, handle: &ContainerHandle) -> Result<i64>;

    /// Combined stdout and stderr.
    async fn logs(&self, handle: &ContainerHandle) -> Result<String>;

    async fn remove(&self, handle: &ContainerHandle) -> Result<()>;
}

/// Shell-level git operations on a workspace.
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn clone_repo(&self, clone_url: &str, dir: &Path) -> Result<()>;

    async fn checkout(&self, dir: &Path, commit_sha: &str) -> Result<()>;

    /// Recursively hand `dir` to the grading user.
    async fn chown(&self, dir: &Path, uid: u32) -> Result<()>;
}

/// Reacts to a finished job (posting, quota).
#[async_trait]
pub trait ExecutionProcessor: Send + Sync {
    async fn process_execution(&self, result: &ExecutionResult) -> Result<()>;
}

/// Runs one job to a terminal state. Never fails; failures become FAIL results.
#[async_trait]
pub trait GradingRunner: Send + Sync {
    async fn execute(&self, job: JobDescriptor) -> ExecutionResult;
}
