//! Identifiers for grading jobs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a grading request: one commit graded against one deliverable.
///
/// At most one queue entry with a given key may exist across all tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitKey {
    pub commit_url: String,
    pub deliv_id: String,
}

impl CommitKey {
    pub fn new(commit_url: impl Into<String>, deliv_id: impl Into<String>) -> Self {
        Self {
            commit_url: commit_url.into(),
            deliv_id: deliv_id.into(),
        }
    }

    pub fn matches(&self, commit_url: &str, deliv_id: &str) -> bool {
        self.commit_url == commit_url && self.deliv_id == deliv_id
    }
}

impl fmt::Display for CommitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.commit_url, self.deliv_id)
    }
}

/// Grader task id, `<sha>-<deliv>`. Also names the job's workspace directory,
/// which keeps concurrent jobs from colliding on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(commit_sha: &str, deliv_id: &str) -> Self {
        Self(format!("{}-{}", commit_sha, deliv_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_format() {
        let id = TaskId::new("abc123def", "d1");
        assert_eq!(id.as_str(), "abc123def-d1");
    }

    #[test]
    fn test_commit_key_matches_both_fields() {
        let key = CommitKey::new("https://github.com/org/repo/commit/abc", "d1");
        assert!(key.matches("https://github.com/org/repo/commit/abc", "d1"));
        assert!(!key.matches("https://github.com/org/repo/commit/abc", "d2"));
    }
}
