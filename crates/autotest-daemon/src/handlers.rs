//! Command handlers.

use crate::config::AutoTestConfig;
use crate::events::InboundEvent;
use anyhow::Context;
use autotest_core::ports::{CommentChannel, DataStore, GradingRunner};
use autotest_core::{GradeReport, JobDescriptor, QueueStatus};
use autotest_engine::{AutoTest, Collaborators, GitHubAutoTest, GitHubExecutionProcessor};
use autotest_notify::GitHubCommentChannel;
use autotest_runner::{DockerRuntime, GitClient, GradingJob};
use autotest_scheduler::QueueStore;
use autotest_store::{MemoryDataStore, StaticCoursePortal};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

const IDLE_POLL: Duration = Duration::from_millis(500);

fn grading_job(config: &AutoTestConfig) -> anyhow::Result<GradingJob> {
    let runtime = DockerRuntime::new().context("Docker unavailable")?;
    let git = GitClient::new(config.github_token.clone());
    Ok(GradingJob::new(
        Arc::new(runtime),
        Arc::new(git),
        config.runner_config(),
    ))
}

/// Construct every service once and wire them together.
fn build(config: &AutoTestConfig) -> anyhow::Result<GitHubAutoTest> {
    let runner: Arc<dyn GradingRunner> = Arc::new(grading_job(config)?);
    let store: Arc<dyn DataStore> = Arc::new(MemoryDataStore::new());
    let channel: Arc<dyn CommentChannel> = Arc::new(GitHubCommentChannel::new(
        config.github_token.clone(),
        config.postback,
    ));
    let processor = Arc::new(GitHubExecutionProcessor::new(
        Arc::clone(&store),
        Arc::clone(&channel),
    ));

    let autotest = AutoTest::start(
        config.capacities,
        Some(QueueStore::new(&config.persist_dir)),
        Collaborators {
            runner,
            store,
            portal: Arc::new(StaticCoursePortal::new(config.course.clone())),
            processor,
        },
    );
    Ok(GitHubAutoTest::new(autotest, channel, config.github_config()))
}

async fn dispatch(github: &GitHubAutoTest, line: &str) {
    let event = match serde_json::from_str::<InboundEvent>(line) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Malformed event skipped");
            return;
        }
    };
    let handled = match event {
        InboundEvent::Push(target) => github.handle_push_event(target).await,
        InboundEvent::Comment(target) => github.handle_comment_event(target).await,
    };
    if let Err(e) = handled {
        error!(error = %e, "Event rejected");
    }
}

async fn wait_idle(autotest: &AutoTest) {
    loop {
        let status = autotest.status().await;
        if status == QueueStatus::default() {
            return;
        }
        info!(
            express = status.express,
            standard = status.standard,
            regression = status.regression,
            running = status.running,
            "Waiting for queues to drain"
        );
        tokio::time::sleep(IDLE_POLL).await;
    }
}

pub async fn serve(config_path: &Path) -> anyhow::Result<()> {
    let config = AutoTestConfig::from_file(config_path)?;
    let github = build(&config)?;
    let autotest = Arc::clone(github.autotest());

    match autotest.restore().await {
        Ok(restored) => info!(restored, "AutoTest ready"),
        Err(e) => error!(error = %e, "Failed to restore queues; starting empty"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => dispatch(&github, &line).await,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; queues persisted for restart");
                return Ok(());
            }
        }
    }

    info!("Input closed");
    tokio::select! {
        _ = wait_idle(&autotest) => info!("All jobs finished"),
        _ = tokio::signal::ctrl_c() => info!("Interrupted; queues persisted for restart"),
    }
    Ok(())
}

pub async fn grade(config_path: &Path, job_path: &Path) -> anyhow::Result<()> {
    let config = AutoTestConfig::from_file(config_path)?;
    let content = std::fs::read_to_string(job_path)
        .with_context(|| format!("Failed to read job {}", job_path.display()))?;
    let job: JobDescriptor = serde_json::from_str(&content).context("Invalid job descriptor")?;
    job.target.validate()?;

    let result = grading_job(&config)?.execute(job).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub fn show_config(config_path: &Path) -> anyhow::Result<()> {
    let config = AutoTestConfig::from_file(config_path)?;
    print!("{}", serde_yaml::to_string(&config.redacted())?);
    Ok(())
}

pub fn schema() -> anyhow::Result<()> {
    let schema = schemars::schema_for!(GradeReport);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
