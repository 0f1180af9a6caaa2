//! The three scheduling tiers and the tick algorithm.

use crate::config::SchedulerConfig;
use crate::queue::{PriorityQueue, QueueEntry};
use autotest_core::util::sha_human;
use autotest_core::{CommitKey, JobDescriptor, QueueStatus, Tier};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What `enqueue` did with a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Pulled out of a slower tier into the requested one.
    Moved,
    /// Already waiting on this tier or a faster one.
    AlreadyQueued,
    Executing,
}

/// Where a key currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Waiting { tier: Tier, index: usize },
    Executing { tier: Tier },
}

/// Serializable view of the tiers, used to survive restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    #[serde(default)]
    pub express: Vec<JobDescriptor>,
    #[serde(default)]
    pub standard: Vec<JobDescriptor>,
    #[serde(default)]
    pub regression: Vec<JobDescriptor>,
    #[serde(default)]
    pub executing: Vec<JobDescriptor>,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.express.is_empty()
            && self.standard.is_empty()
            && self.regression.is_empty()
            && self.executing.is_empty()
    }
}

pub struct QueueSet {
    express: PriorityQueue,
    standard: PriorityQueue,
    regression: PriorityQueue,
}

impl QueueSet {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            express: PriorityQueue::new(Tier::Express, config.express),
            standard: PriorityQueue::new(Tier::Standard, config.standard),
            regression: PriorityQueue::new(Tier::Regression, config.regression),
        }
    }

    pub fn queue(&self, tier: Tier) -> &PriorityQueue {
        match tier {
            Tier::Express => &self.express,
            Tier::Standard => &self.standard,
            Tier::Regression => &self.regression,
        }
    }

    fn queue_mut(&mut self, tier: Tier) -> &mut PriorityQueue {
        match tier {
            Tier::Express => &mut self.express,
            Tier::Standard => &mut self.standard,
            Tier::Regression => &mut self.regression,
        }
    }

    pub fn locate(&self, key: &CommitKey) -> Option<Placement> {
        for tier in Tier::ALL {
            let queue = self.queue(tier);
            if queue.is_commit_executing(&key.commit_url, &key.deliv_id) {
                return Some(Placement::Executing { tier });
            }
        }
        for tier in Tier::ALL {
            if let Some(index) = self.queue(tier).position(key) {
                return Some(Placement::Waiting { tier, index });
            }
        }
        None
    }

    pub fn is_commit_executing(&self, key: &CommitKey) -> bool {
        matches!(self.locate(key), Some(Placement::Executing { .. }))
    }

    /// Waiting or executing on any tier.
    pub fn is_on_queue(&self, key: &CommitKey) -> bool {
        self.locate(key).is_some()
    }

    /// Add a job to `tier`, keeping at most one entry per key across all tiers.
    ///
    /// A job already waiting on a slower tier is moved up. Admin requests go to
    /// the head of the queue.
    pub fn enqueue(&mut self, tier: Tier, job: JobDescriptor) -> EnqueueOutcome {
        let key = job.key();
        let mut outcome = EnqueueOutcome::Queued;
        match self.locate(&key) {
            Some(Placement::Executing { .. }) => {
                debug!(key = %key, "Not queued; commit already executing");
                return EnqueueOutcome::Executing;
            }
            Some(Placement::Waiting { tier: current, .. }) if current <= tier => {
                debug!(key = %key, tier = %current, "Not queued; already waiting");
                return EnqueueOutcome::AlreadyQueued;
            }
            Some(Placement::Waiting { tier: current, .. }) => {
                self.queue_mut(current).remove_key(&key);
                outcome = EnqueueOutcome::Moved;
            }
            None => {}
        }

        let admin = job.target.admin_request;
        let sha = sha_human(&job.target.commit_sha).to_string();
        let entry = QueueEntry::new(job, tier);
        let queue = self.queue_mut(tier);
        let len = if admin {
            queue.push_first(entry)
        } else {
            queue.push(entry)
        };

        info!(
            tier = %tier,
            deliv = %key.deliv_id,
            sha = %sha,
            admin,
            len,
            "Job queued"
        );
        outcome
    }

    /// Move a waiting commit to express when that would make it run sooner.
    ///
    /// Returns whether the entry moved. Executing or unknown keys are left alone.
    pub fn promote_if_needed(&mut self, key: &CommitKey) -> bool {
        let (tier, index) = match self.locate(key) {
            Some(Placement::Waiting { tier, index }) => (tier, index),
            Some(Placement::Executing { .. }) => {
                debug!(key = %key, "Promotion skipped; commit executing");
                return false;
            }
            None => {
                debug!(key = %key, "Promotion skipped; commit not queued");
                return false;
            }
        };
        if tier == Tier::Express {
            return false;
        }
        if self.express.len() >= index {
            debug!(
                key = %key,
                tier = %tier,
                index,
                express_len = self.express.len(),
                "Promotion skipped; current position is no slower"
            );
            return false;
        }

        match self.queue_mut(tier).remove_key(key) {
            Some(entry) => {
                let admin = entry.job.target.admin_request;
                if admin {
                    self.express.push_first(entry);
                } else {
                    self.express.push(entry);
                }
                info!(key = %key, from = %tier, index, "Job promoted to express");
                true
            }
            None => {
                warn!(key = %key, "Promotion failed; entry vanished");
                false
            }
        }
    }

    /// Start every job that fits, in priority order.
    ///
    /// Returns the jobs that were marked executing; the caller launches them.
    /// With no new entries and no freed slots this changes nothing.
    pub fn tick(&mut self) -> Vec<JobDescriptor> {
        let mut started = Vec::new();

        // 1. express
        Self::drain(&mut self.express, &mut started);
        // 2. standard and regression heads borrow express slots
        Self::promote_and_start(&mut self.standard, &mut self.express, &mut started);
        Self::promote_and_start(&mut self.regression, &mut self.express, &mut started);
        // 3. standard
        Self::drain(&mut self.standard, &mut started);
        // 4. regression heads borrow standard slots
        Self::promote_and_start(&mut self.regression, &mut self.standard, &mut started);
        // 5. regression
        Self::drain(&mut self.regression, &mut started);

        if !started.is_empty() {
            let status = self.status();
            info!(
                started = started.len(),
                express = status.express,
                standard = status.standard,
                regression = status.regression,
                running = status.running,
                "Tick started jobs"
            );
        }
        started
    }

    fn drain(queue: &mut PriorityQueue, started: &mut Vec<JobDescriptor>) {
        while let Some(job) = queue.start_next() {
            debug!(tier = %queue.tier(), deliv = %job.deliv_id, sha = %sha_human(&job.target.commit_sha), "Job start");
            started.push(job);
        }
    }

    fn promote_and_start(
        from: &mut PriorityQueue,
        into: &mut PriorityQueue,
        started: &mut Vec<JobDescriptor>,
    ) {
        while into.has_capacity() {
            let Some(entry) = from.pop() else {
                break;
            };
            debug!(
                from = %from.tier(),
                into = %into.tier(),
                deliv = %entry.job.deliv_id,
                "Borrowing slot"
            );
            into.push_first(entry);
            if let Some(job) = into.start_next() {
                started.push(job);
            }
        }
    }

    /// Release the slot held by a finished job, wherever it runs.
    pub fn clear_execution(&mut self, key: &CommitKey) -> bool {
        for tier in Tier::ALL {
            if self
                .queue_mut(tier)
                .clear_execution(&key.commit_url, &key.deliv_id)
            {
                return true;
            }
        }
        false
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            express: self.express.len(),
            standard: self.standard.len(),
            regression: self.regression.len(),
            running: Tier::ALL
                .iter()
                .map(|t| self.queue(*t).num_running())
                .sum(),
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let waiting = |tier: Tier| {
            self.queue(tier)
                .waiting()
                .map(|e| e.job.clone())
                .collect::<Vec<_>>()
        };
        QueueSnapshot {
            express: waiting(Tier::Express),
            standard: waiting(Tier::Standard),
            regression: waiting(Tier::Regression),
            executing: Tier::ALL
                .iter()
                .flat_map(|t| self.queue(*t).running())
                .map(|e| e.job.clone())
                .collect(),
        }
    }

    /// Load a snapshot. Jobs that were executing go to the head of express,
    /// in their original order, so they run first.
    pub fn restore(&mut self, snapshot: QueueSnapshot) {
        for job in snapshot.executing.into_iter().rev() {
            let key = job.key();
            if self.is_on_queue(&key) {
                continue;
            }
            info!(key = %key, "Restoring interrupted job to head of express");
            self.express.push_first(QueueEntry::new(job, Tier::Express));
        }
        for (tier, jobs) in [
            (Tier::Express, snapshot.express),
            (Tier::Standard, snapshot.standard),
            (Tier::Regression, snapshot.regression),
        ] {
            for job in jobs {
                let key = job.key();
                if self.is_on_queue(&key) {
                    continue;
                }
                self.queue_mut(tier).push(QueueEntry::new(job, tier));
            }
        }
    }
}
