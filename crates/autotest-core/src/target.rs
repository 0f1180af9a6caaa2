//! Commit targets, container configuration and job descriptors.

use crate::ids::{CommitKey, TaskId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FLAG_FORCE: &str = "#force";
pub const FLAG_SILENT: &str = "#silent";

/// A push or comment on a commit, as parsed by the webhook layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitTarget {
    /// Deliverable named by the event; `None` means the course default applies.
    #[serde(default)]
    pub deliv_id: Option<String>,
    pub repo_id: String,
    #[serde(default)]
    pub org_id: Option<String>,
    /// Commenter; `None` for pushes.
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub bot_mentioned: bool,
    pub clone_url: String,
    pub commit_sha: String,
    pub commit_url: String,
    pub postback_url: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ref_name: String,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub admin_request: bool,
}

impl CommitTarget {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn is_force(&self) -> bool {
        self.has_flag(FLAG_FORCE)
    }

    pub fn is_silent(&self) -> bool {
        self.has_flag(FLAG_SILENT)
    }

    /// Rejects targets that carry nothing to identify the commit.
    pub fn validate(&self) -> Result<()> {
        if self.commit_url.is_empty() && self.commit_sha.is_empty() {
            return Err(Error::InvalidTarget(format!(
                "no commit url or sha for repo '{}'",
                self.repo_id
            )));
        }
        Ok(())
    }
}

/// Per-deliverable grading container settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub image: String,
    /// Seconds before the container is stopped; zero or negative disables the timer.
    #[serde(default)]
    pub max_exec_time: i64,
    /// Minimum seconds between chargeable student feedback requests.
    #[serde(default)]
    pub student_delay: i64,
    pub open_timestamp: DateTime<Utc>,
    pub close_timestamp: DateTime<Utc>,
    /// Keep grading after `close_timestamp`.
    #[serde(default)]
    pub late_autotest: bool,
    #[serde(default)]
    pub regression_deliv_ids: Vec<String>,
    #[serde(default)]
    pub cpus: Option<f64>,
    #[serde(default)]
    pub memory_bytes: Option<i64>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub custom: serde_json::Value,
}

impl ContainerConfig {
    pub fn is_open_at(&self, ts: DateTime<Utc>) -> bool {
        self.open_timestamp <= ts
    }

    /// Closed means past the close time with late grading disabled.
    pub fn is_closed_at(&self, ts: DateTime<Utc>) -> bool {
        self.close_timestamp < ts && !self.late_autotest
    }
}

/// Everything needed to grade one commit against one deliverable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub deliv_id: String,
    pub target: CommitTarget,
    pub container: ContainerConfig,
}

impl JobDescriptor {
    /// Builds a descriptor, pinning the target to `deliv_id`.
    pub fn new(deliv_id: impl Into<String>, mut target: CommitTarget, container: ContainerConfig) -> Self {
        let deliv_id = deliv_id.into();
        target.deliv_id = Some(deliv_id.clone());
        Self {
            deliv_id,
            target,
            container,
        }
    }

    pub fn key(&self) -> CommitKey {
        CommitKey::new(self.target.commit_url.clone(), self.deliv_id.clone())
    }

    pub fn task_id(&self) -> TaskId {
        TaskId::new(&self.target.commit_sha, &self.deliv_id)
    }

    pub fn commit_url(&self) -> &str {
        &self.target.commit_url
    }
}

/// Scheduling tier, listed in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Express,
    Standard,
    Regression,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Express, Tier::Standard, Tier::Regression];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Express => write!(f, "express"),
            Tier::Standard => write!(f, "standard"),
            Tier::Regression => write!(f, "regression"),
        }
    }
}
