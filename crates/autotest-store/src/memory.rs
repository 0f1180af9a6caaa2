//! In-process datastore.

use async_trait::async_trait;
use autotest_core::ports::DataStore;
use autotest_core::{CommitTarget, Error, ExecutionResult, FeedbackGrant, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

type Key = (String, String);

fn key(commit_url: &str, deliv_id: &str) -> Key {
    (commit_url.to_string(), deliv_id.to_string())
}

/// `DataStore` held in memory; contents are lost on restart.
#[derive(Default)]
pub struct MemoryDataStore {
    pushes: RwLock<HashMap<String, CommitTarget>>,
    comments: RwLock<HashMap<Key, CommitTarget>>,
    grants: RwLock<Vec<FeedbackGrant>>,
    results: RwLock<HashMap<Key, ExecutionResult>>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn feedback_grants(&self) -> Vec<FeedbackGrant> {
        self.grants.read().await.clone()
    }

    pub async fn comment_count(&self) -> usize {
        self.comments.read().await.len()
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn save_push(&self, target: &CommitTarget) -> Result<()> {
        debug!(commit = %target.commit_url, "Push saved");
        self.pushes
            .write()
            .await
            .insert(target.commit_url.clone(), target.clone());
        Ok(())
    }

    async fn get_push_record(&self, commit_url: &str) -> Result<Option<CommitTarget>> {
        Ok(self.pushes.read().await.get(commit_url).cloned())
    }

    async fn save_comment(&self, target: &CommitTarget) -> Result<()> {
        let Some(deliv) = target.deliv_id.clone().filter(|d| !d.is_empty()) else {
            return Err(Error::Datastore(format!(
                "comment on {} names no deliverable",
                target.commit_url
            )));
        };
        debug!(commit = %target.commit_url, deliv = %deliv, "Comment saved");
        self.comments
            .write()
            .await
            .insert(key(&target.commit_url, &deliv), target.clone());
        Ok(())
    }

    async fn get_comment_record(
        &self,
        commit_url: &str,
        deliv_id: &str,
    ) -> Result<Option<CommitTarget>> {
        Ok(self
            .comments
            .read()
            .await
            .get(&key(commit_url, deliv_id))
            .cloned())
    }

    async fn save_feedback_grant(&self, grant: &FeedbackGrant) -> Result<()> {
        debug!(person = %grant.person_id, deliv = %grant.deliv_id, "Feedback grant saved");
        self.grants.write().await.push(grant.clone());
        Ok(())
    }

    async fn get_latest_feedback_grant(
        &self,
        deliv_id: &str,
        person_id: &str,
    ) -> Result<Option<FeedbackGrant>> {
        Ok(self
            .grants
            .read()
            .await
            .iter()
            .filter(|g| g.deliv_id == deliv_id && g.person_id == person_id)
            .max_by_key(|g| g.timestamp)
            .cloned())
    }

    async fn get_feedback_grant_for_commit(
        &self,
        commit_url: &str,
        deliv_id: &str,
        person_id: &str,
    ) -> Result<Option<FeedbackGrant>> {
        Ok(self
            .grants
            .read()
            .await
            .iter()
            .find(|g| {
                g.commit_url == commit_url && g.deliv_id == deliv_id && g.person_id == person_id
            })
            .cloned())
    }

    async fn save_result(&self, result: &ExecutionResult) -> Result<()> {
        self.results
            .write()
            .await
            .insert(key(&result.commit_url, &result.deliv_id), result.clone());
        Ok(())
    }

    async fn get_result(
        &self,
        commit_url: &str,
        deliv_id: &str,
    ) -> Result<Option<ExecutionResult>> {
        Ok(self
            .results
            .read()
            .await
            .get(&key(commit_url, deliv_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_latest_grant_by_timestamp() {
        let store = MemoryDataStore::new();
        let t0 = Utc::now();
        store
            .save_feedback_grant(&FeedbackGrant::standard("u1", "d1", "c2", t0 + Duration::hours(1)))
            .await
            .unwrap();
        store
            .save_feedback_grant(&FeedbackGrant::standard("u1", "d1", "c1", t0))
            .await
            .unwrap();
        store
            .save_feedback_grant(&FeedbackGrant::standard("u1", "d2", "c3", t0 + Duration::hours(2)))
            .await
            .unwrap();

        let latest = store.get_latest_feedback_grant("d1", "u1").await.unwrap().unwrap();
        assert_eq!(latest.commit_url, "c2");
        assert!(store.get_latest_feedback_grant("d1", "u2").await.unwrap().is_none());

        let for_commit = store
            .get_feedback_grant_for_commit("c1", "d1", "u1")
            .await
            .unwrap();
        assert!(for_commit.is_some());
        assert!(
            store
                .get_feedback_grant_for_commit("c1", "d1", "u2")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_comment_needs_deliverable() {
        let store = MemoryDataStore::new();
        let comment = CommitTarget {
            deliv_id: None,
            repo_id: "repo1".to_string(),
            org_id: None,
            person_id: Some("u1".to_string()),
            bot_mentioned: true,
            clone_url: "https://github.com/org/repo1.git".to_string(),
            commit_sha: "abc123".to_string(),
            commit_url: "https://github.com/org/repo1/commit/abc123".to_string(),
            postback_url: String::new(),
            timestamp: Utc::now(),
            ref_name: String::new(),
            flags: Vec::new(),
            admin_request: false,
        };

        let err = store.save_comment(&comment).await.unwrap_err();
        assert!(matches!(err, Error::Datastore(_)));
        assert_eq!(store.comment_count().await, 0);

        let named = CommitTarget {
            deliv_id: Some("d1".to_string()),
            ..comment
        };
        store.save_comment(&named).await.unwrap();
        let saved = store
            .get_comment_record(&named.commit_url, "d1")
            .await
            .unwrap();
        assert_eq!(saved.and_then(|c| c.person_id).as_deref(), Some("u1"));
    }
}
