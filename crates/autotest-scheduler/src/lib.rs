//! Grading job scheduling for AutoTest.
//!
//! Three tiers (express, standard, regression) each hold a FIFO of waiting
//! jobs and a bounded number of execution slots. `Scheduler` serializes all
//! queue mutation and launches started jobs without waiting on them.

pub mod config;
pub mod persist;
pub mod queue;
pub mod scheduler;
pub mod set;

#[cfg(test)]
mod test_support;

pub use config::SchedulerConfig;
pub use persist::QueueStore;
pub use queue::{PriorityQueue, QueueEntry};
pub use scheduler::{JobLauncher, Scheduler};
pub use set::{EnqueueOutcome, Placement, QueueSet, QueueSnapshot};
