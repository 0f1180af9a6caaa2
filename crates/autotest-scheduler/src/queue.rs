//! A single scheduling tier.

use autotest_core::{CommitKey, JobDescriptor, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A job waiting on (or executing from) one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub job: JobDescriptor,
    pub enqueued_at: DateTime<Utc>,
    pub tier: Tier,
    pub executing: bool,
}

impl QueueEntry {
    pub fn new(job: JobDescriptor, tier: Tier) -> Self {
        Self {
            job,
            enqueued_at: Utc::now(),
            tier,
            executing: false,
        }
    }

    pub fn matches(&self, key: &CommitKey) -> bool {
        key.matches(&self.job.target.commit_url, &self.job.deliv_id)
    }
}

/// FIFO of waiting entries plus the entries this tier is currently executing.
///
/// Not synchronized; callers serialize access through the scheduler.
#[derive(Debug)]
pub struct PriorityQueue {
    tier: Tier,
    capacity: usize,
    waiting: VecDeque<QueueEntry>,
    running: Vec<QueueEntry>,
}

impl PriorityQueue {
    pub fn new(tier: Tier, capacity: usize) -> Self {
        Self {
            tier,
            capacity,
            waiting: VecDeque::new(),
            running: Vec::new(),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append to the tail. Returns the new waiting length.
    pub fn push(&mut self, mut entry: QueueEntry) -> usize {
        entry.tier = self.tier;
        entry.executing = false;
        self.waiting.push_back(entry);
        self.waiting.len()
    }

    /// Insert at the head. Returns the new waiting length.
    pub fn push_first(&mut self, mut entry: QueueEntry) -> usize {
        entry.tier = self.tier;
        entry.executing = false;
        self.waiting.push_front(entry);
        self.waiting.len()
    }

    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.waiting.pop_front()
    }

    pub fn peek(&self) -> Option<&QueueEntry> {
        self.waiting.front()
    }

    /// Remove the first waiting entry for `commit_url`.
    pub fn remove(&mut self, commit_url: &str) -> Option<QueueEntry> {
        let idx = self.index_of(commit_url)?;
        self.waiting.remove(idx)
    }

    /// Remove the waiting entry with exactly this key.
    pub fn remove_key(&mut self, key: &CommitKey) -> Option<QueueEntry> {
        let idx = self.position(key)?;
        self.waiting.remove(idx)
    }

    pub fn index_of(&self, commit_url: &str) -> Option<usize> {
        self.waiting
            .iter()
            .position(|e| e.job.target.commit_url == commit_url)
    }

    /// Position of the waiting entry with exactly this key.
    pub fn position(&self, key: &CommitKey) -> Option<usize> {
        self.waiting.iter().position(|e| e.matches(key))
    }

    /// Number of waiting entries.
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn num_running(&self) -> usize {
        self.running.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.running.len() < self.capacity
    }

    pub fn is_commit_executing(&self, commit_url: &str, deliv_id: &str) -> bool {
        self.running
            .iter()
            .any(|e| e.executing && e.job.target.commit_url == commit_url && e.job.deliv_id == deliv_id)
    }

    /// Drop the finished entry for `(commit_url, deliv_id)`. Returns whether one was found.
    pub fn clear_execution(&mut self, commit_url: &str, deliv_id: &str) -> bool {
        let before = self.running.len();
        self.running
            .retain(|e| !(e.job.target.commit_url == commit_url && e.job.deliv_id == deliv_id));
        self.running.len() != before
    }

    /// Move the head entry into an execution slot and return its job.
    ///
    /// Returns `None` when nothing is waiting or every slot is taken; this is
    /// the only path that increases `num_running`.
    pub fn start_next(&mut self) -> Option<JobDescriptor> {
        if !self.has_capacity() {
            return None;
        }
        let mut entry = self.waiting.pop_front()?;
        entry.executing = true;
        let job = entry.job.clone();
        self.running.push(entry);
        Some(job)
    }

    pub fn waiting(&self) -> impl Iterator<Item = &QueueEntry> {
        self.waiting.iter()
    }

    pub fn running(&self) -> impl Iterator<Item = &QueueEntry> {
        self.running.iter()
    }
}
