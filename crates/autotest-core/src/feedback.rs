//! Feedback quota records and requester authorization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const GRANT_KIND_STANDARD: &str = "standard";

/// Feedback was shown to `person_id` for `deliv_id` at `timestamp`. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackGrant {
    pub person_id: String,
    pub deliv_id: String,
    pub commit_url: String,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
}

impl FeedbackGrant {
    pub fn standard(
        person_id: impl Into<String>,
        deliv_id: impl Into<String>,
        commit_url: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            person_id: person_id.into(),
            deliv_id: deliv_id.into(),
            commit_url: commit_url.into(),
            timestamp,
            kind: GRANT_KIND_STANDARD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub is_staff: bool,
    pub is_admin: bool,
}

impl AuthInfo {
    /// Staff and admins skip window checks and quota.
    pub fn is_privileged(&self) -> bool {
        self.is_staff || self.is_admin
    }
}

/// Queue occupancy snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub express: usize,
    pub standard: usize,
    pub regression: usize,
    pub running: usize,
}
