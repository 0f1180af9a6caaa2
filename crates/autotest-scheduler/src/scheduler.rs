//! Serialized access to the tiers and job launching.

use crate::config::SchedulerConfig;
use crate::persist::QueueStore;
use crate::set::{EnqueueOutcome, QueueSet};
use autotest_core::util::sha_human;
use autotest_core::{CommitKey, JobDescriptor, QueueStatus, Result, Tier};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Starts a job in the background.
///
/// Implementations hand the job off (e.g. `tokio::spawn`) and return at once;
/// completion comes back through `Scheduler::clear_execution`.
pub trait JobLauncher: Send + Sync {
    fn launch(&self, job: JobDescriptor);
}

/// The scheduler service. Every queue mutation goes through one mutex.
pub struct Scheduler {
    queues: Mutex<QueueSet>,
    launcher: Arc<dyn JobLauncher>,
    store: Option<QueueStore>,
    /// Bumped under the queue lock for each snapshot taken.
    generation: AtomicU64,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, launcher: Arc<dyn JobLauncher>) -> Self {
        info!(
            express = config.express,
            standard = config.standard,
            regression = config.regression,
            "Scheduler created"
        );
        Self {
            queues: Mutex::new(QueueSet::new(&config)),
            launcher,
            store: None,
            generation: AtomicU64::new(0),
        }
    }

    /// Persist the queues after every tick.
    pub fn with_store(mut self, store: QueueStore) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn enqueue(&self, tier: Tier, job: JobDescriptor) -> EnqueueOutcome {
        self.queues.lock().await.enqueue(tier, job)
    }

    pub async fn promote_if_needed(&self, key: &CommitKey) -> bool {
        self.queues.lock().await.promote_if_needed(key)
    }

    pub async fn is_on_queue(&self, key: &CommitKey) -> bool {
        self.queues.lock().await.is_on_queue(key)
    }

    pub async fn is_commit_executing(&self, key: &CommitKey) -> bool {
        self.queues.lock().await.is_commit_executing(key)
    }

    pub async fn clear_execution(&self, key: &CommitKey) -> bool {
        let cleared = self.queues.lock().await.clear_execution(key);
        if !cleared {
            warn!(key = %key, "No executing entry to clear");
        }
        cleared
    }

    pub async fn status(&self) -> QueueStatus {
        self.queues.lock().await.status()
    }

    /// Start whatever fits, then persist. Returns the number of jobs launched.
    ///
    /// Never waits on a job.
    pub async fn tick(&self) -> usize {
        let (started, snapshot) = {
            let mut queues = self.queues.lock().await;
            let started = queues.tick();
            let snapshot = self.store.as_ref().map(|_| {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                (generation, queues.snapshot())
            });
            (started, snapshot)
        };

        let count = started.len();
        for job in started {
            info!(
                deliv = %job.deliv_id,
                repo = %job.target.repo_id,
                sha = %sha_human(&job.target.commit_sha),
                "Launching job"
            );
            self.launcher.launch(job);
        }

        if let (Some(store), Some((generation, snapshot))) = (&self.store, snapshot)
            && let Err(e) = store.save(generation, &snapshot).await
        {
            error!(error = %e, "Failed to persist queues");
        }
        count
    }

    /// Reload persisted queues. Returns the number of jobs restored.
    pub async fn restore(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let Some(snapshot) = store.load().await? else {
            return Ok(0);
        };
        let count = snapshot.express.len()
            + snapshot.standard.len()
            + snapshot.regression.len()
            + snapshot.executing.len();
        self.queues.lock().await.restore(snapshot);
        Ok(count)
    }
}
