//! The orchestrator: scheduler ownership and job completion.

use crate::launcher::ExecutorLauncher;
use autotest_core::ports::{CoursePortal, DataStore, ExecutionProcessor, GradingRunner};
use autotest_core::util::sha_human;
use autotest_core::{ExecutionResult, JobDescriptor, QueueStatus, Result, Tier};
use autotest_scheduler::{EnqueueOutcome, QueueStore, Scheduler, SchedulerConfig};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Services the orchestrator is built from.
pub struct Collaborators {
    pub runner: Arc<dyn GradingRunner>,
    pub store: Arc<dyn DataStore>,
    pub portal: Arc<dyn CoursePortal>,
    pub processor: Arc<dyn ExecutionProcessor>,
}

pub struct AutoTest {
    scheduler: Scheduler,
    store: Arc<dyn DataStore>,
    portal: Arc<dyn CoursePortal>,
    processor: Arc<dyn ExecutionProcessor>,
}

impl AutoTest {
    /// Build the orchestrator and spawn its completion loop.
    ///
    /// Must be called inside a Tokio runtime. The loop exits once the
    /// orchestrator is dropped and in-flight jobs have reported.
    pub fn start(
        config: SchedulerConfig,
        queue_store: Option<QueueStore>,
        collaborators: Collaborators,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let launcher = ExecutorLauncher::new(
            collaborators.runner,
            Arc::clone(&collaborators.portal),
            tx,
        );

        let mut scheduler = Scheduler::new(config, Arc::new(launcher));
        if let Some(queue_store) = queue_store {
            scheduler = scheduler.with_store(queue_store);
        }

        let autotest = Arc::new(Self {
            scheduler,
            store: collaborators.store,
            portal: collaborators.portal,
            processor: collaborators.processor,
        });

        tokio::spawn(completion_loop(Arc::downgrade(&autotest), rx));
        autotest
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    pub fn portal(&self) -> &Arc<dyn CoursePortal> {
        &self.portal
    }

    pub async fn enqueue(&self, tier: Tier, job: JobDescriptor) -> EnqueueOutcome {
        let key = job.key();
        let outcome = self.scheduler.enqueue(tier, job).await;
        debug!(key = %key, tier = %tier, outcome = ?outcome, "Enqueue");
        outcome
    }

    pub async fn tick(&self) -> usize {
        self.scheduler.tick().await
    }

    pub async fn status(&self) -> QueueStatus {
        self.scheduler.status().await
    }

    /// Reload persisted queues and start whatever fits.
    pub async fn restore(&self) -> Result<usize> {
        let restored = self.scheduler.restore().await?;
        if restored > 0 {
            info!(restored, "Queues restored");
            self.tick().await;
        }
        Ok(restored)
    }

    /// Record a finished job, notify, free its slot and admit the next job.
    ///
    /// Collaborator failures are logged; the slot is released regardless.
    pub async fn handle_execution_complete(&self, result: ExecutionResult) {
        let key = result.input.key();
        info!(
            deliv = %result.deliv_id,
            repo = %result.repo_id,
            sha = %sha_human(&result.commit_sha),
            state = %result.output.state,
            "Execution complete"
        );

        if let Err(e) = self.store.save_result(&result).await {
            error!(key = %key, error = %e, "Failed to save result");
        }
        if let Err(e) = self.processor.process_execution(&result).await {
            error!(key = %key, error = %e, "Failed to process execution");
        }

        self.scheduler.clear_execution(&key).await;
        self.tick().await;
    }
}

async fn completion_loop(autotest: Weak<AutoTest>, mut rx: mpsc::UnboundedReceiver<ExecutionResult>) {
    while let Some(result) = rx.recv().await {
        let Some(autotest) = autotest.upgrade() else {
            break;
        };
        autotest.handle_execution_complete(result).await;
    }
    debug!("Completion loop stopped");
}
