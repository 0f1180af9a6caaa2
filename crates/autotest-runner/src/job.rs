//! Runs one grading job to a terminal state.

use crate::config::RunnerConfig;
use crate::workspace::Workspace;
use async_trait::async_trait;
use autotest_core::ports::{
    ContainerHandle, ContainerRuntime, ContainerSpec, GradingRunner, SourceControl,
};
use autotest_core::result::FEEDBACK_NO_REPORT;
use autotest_core::util::sha_human;
use autotest_core::{
    ContainerOutput, ContainerState, Error, ExecutionResult, GradeReport, JobDescriptor, Result,
    TaskId,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const NANO_CPUS_PER_CORE: f64 = 1_000_000_000.0;

/// How the container run ended.
#[derive(Debug)]
pub enum RunExit {
    Exited(i64),
    TimedOut,
    Failed(Error),
}

pub fn timeout_feedback(deliv_id: &str) -> String {
    format!(
        "Container did not complete for **`#{}`** in the allotted time. \
         This likely means that _our_ tests exposed a slow or non-terminating path in _your_ implementation. \
         You should augment your tests; a comprehensive local suite will uncover the problem.",
        deliv_id
    )
}

pub fn container_failed_feedback(deliv_id: &str) -> String {
    format!("Container failed for `{}`.", deliv_id)
}

/// Fold the run outcome and the container's report into `output`.
///
/// A timeout wins over anything the container wrote. A clean exit with a
/// readable report is SUCCESS, posted back for free when the exit code is
/// non-zero.
pub fn classify(
    output: &mut ContainerOutput,
    deliv_id: &str,
    exit: &RunExit,
    report: Option<Result<GradeReport>>,
) {
    match exit {
        RunExit::TimedOut => {
            output.report = GradeReport::with_feedback(timeout_feedback(deliv_id), "TIMEOUT");
            output.state = ContainerState::Timeout;
            output.postback_on_complete = true;
        }
        RunExit::Failed(_) => {
            output.report = GradeReport::with_feedback(container_failed_feedback(deliv_id), "FAIL");
            output.state = ContainerState::Fail;
            output.postback_on_complete = true;
        }
        RunExit::Exited(code) => match report {
            Some(Ok(report)) => {
                output.report = report;
                output.state = ContainerState::Success;
                output.postback_on_complete = *code != 0;
            }
            Some(Err(e)) => {
                warn!(deliv = %deliv_id, error = %e, "Grade report rejected");
                no_report(output);
            }
            None => no_report(output),
        },
    }
}

fn no_report(output: &mut ContainerOutput) {
    output.report = GradeReport::with_feedback(FEEDBACK_NO_REPORT, "NO_REPORT");
    output.state = ContainerState::NoReport;
    output.postback_on_complete = true;
}

/// The grading executor: prepare, run, collect, clean up.
pub struct GradingJob {
    runtime: Arc<dyn ContainerRuntime>,
    git: Arc<dyn SourceControl>,
    config: RunnerConfig,
}

impl GradingJob {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        git: Arc<dyn SourceControl>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            runtime,
            git,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    async fn prepare(&self, job: &JobDescriptor, workspace: &Workspace) -> Result<()> {
        workspace.prepare().await?;
        let assn = workspace.assn_dir();
        self.git.clone_repo(&job.target.clone_url, &assn).await?;
        self.git.checkout(&assn, &job.target.commit_sha).await?;
        self.git
            .chown(workspace.root(), self.config.docker_uid)
            .await?;
        Ok(())
    }

    fn container_spec(&self, job: &JobDescriptor, task_id: &TaskId, workspace: &Workspace) -> ContainerSpec {
        let input = serde_json::to_string(job).unwrap_or_else(|_| "{}".to_string());
        let cpus = job.container.cpus.unwrap_or(self.config.default_cpus);
        ContainerSpec {
            name: format!("autotest-{}-{}", task_id, uuid::Uuid::new_v4().simple()),
            image: job.container.image.clone(),
            env: vec![
                format!("ASSIGNMENT={}", job.deliv_id),
                format!("EXEC_ID={}", task_id),
                format!("INPUT={}", input),
            ],
            binds: workspace.binds(),
            network: job
                .container
                .network
                .clone()
                .or_else(|| self.config.network.clone()),
            extra_hosts: self.config.extra_hosts.clone(),
            user: Some(self.config.docker_uid.to_string()),
            nano_cpus: (cpus > 0.0).then(|| (cpus * NANO_CPUS_PER_CORE) as i64),
            memory_bytes: job.container.memory_bytes,
        }
    }

    /// Start the container and wait for it, stopping it when `max_exec_time` runs out.
    async fn run_container(&self, handle: &ContainerHandle, max_exec_time: i64) -> RunExit {
        if let Err(e) = self.runtime.start(handle).await {
            return RunExit::Failed(e);
        }

        if max_exec_time <= 0 {
            return match self.runtime.wait(handle).await {
                Ok(code) => RunExit::Exited(code),
                Err(e) => RunExit::Failed(e),
            };
        }

        let limit = Duration::from_secs(max_exec_time as u64);
        match tokio::time::timeout(limit, self.runtime.wait(handle)).await {
            Ok(Ok(code)) => RunExit::Exited(code),
            Ok(Err(e)) => RunExit::Failed(e),
            Err(_) => {
                warn!(id = %handle.id, max_exec_time, "Container timed out; stopping");
                if let Err(e) = self.runtime.stop(handle, self.config.stop_grace_secs).await {
                    warn!(id = %handle.id, error = %e, "Failed to stop container");
                }
                if let Err(e) = self.runtime.wait(handle).await {
                    warn!(id = %handle.id, error = %e, "Wait after stop failed");
                }
                RunExit::TimedOut
            }
        }
    }

    async fn read_report(workspace: &Workspace) -> Option<Result<GradeReport>> {
        let path = workspace.report_path();
        match tokio::fs::read(&path).await {
            Ok(body) => Some(serde_json::from_slice(&body).map_err(|e| {
                Error::Report(format!("{} is not a grade report: {}", path.display(), e))
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => Some(Err(Error::Report(format!("{}: {}", path.display(), e)))),
        }
    }

    async fn run(
        &self,
        job: &JobDescriptor,
        task_id: &TaskId,
        workspace: &Workspace,
        output: &mut ContainerOutput,
    ) {
        let spec = self.container_spec(job, task_id, workspace);
        let handle = match self.runtime.create(&spec).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Failed to create container");
                classify(output, &job.deliv_id, &RunExit::Failed(e), None);
                return;
            }
        };

        let exit = self
            .run_container(&handle, job.container.max_exec_time)
            .await;

        match self.runtime.logs(&handle).await {
            Ok(logs) => {
                if let Err(e) = tokio::fs::write(workspace.stdio_path(), logs).await {
                    warn!(task_id = %task_id, error = %e, "Failed to write stdio");
                }
            }
            Err(e) => warn!(task_id = %task_id, error = %e, "Failed to collect container logs"),
        }

        if let Err(e) = self.runtime.remove(&handle).await {
            warn!(task_id = %task_id, error = %e, "Failed to remove container");
        }

        let report = match exit {
            RunExit::Exited(_) => Self::read_report(workspace).await,
            _ => None,
        };
        if let Some(Err(e)) = &report {
            warn!(task_id = %task_id, error = %e, "Problem reading report");
        }
        if let RunExit::Failed(e) = &exit {
            error!(task_id = %task_id, error = %e, "Container run failed");
        }
        classify(output, &job.deliv_id, &exit, report);

        if output.state != ContainerState::Success {
            info!(
                task_id = %task_id,
                repo = %job.target.repo_id,
                exit = ?exit,
                state = %output.state,
                "Job ended without a report"
            );
        }
    }
}

#[async_trait]
impl GradingRunner for GradingJob {
    async fn execute(&self, job: JobDescriptor) -> ExecutionResult {
        let start = Instant::now();
        let task_id = job.task_id();
        let workspace = Workspace::new(&self.config, &task_id);
        let mut output = ContainerOutput::default_fail(task_id.as_str());

        info!(
            task_id = %task_id,
            deliv = %job.deliv_id,
            repo = %job.target.repo_id,
            sha = %sha_human(&job.target.commit_sha),
            image = %job.container.image,
            "Grading job start"
        );

        match self.prepare(&job, &workspace).await {
            Ok(()) => self.run(&job, &task_id, &workspace, &mut output).await,
            Err(e) => error!(task_id = %task_id, error = %e, "Failed to prepare workspace"),
        }

        workspace.remove_checkout().await;
        output.timestamp = Utc::now();

        info!(
            task_id = %task_id,
            state = %output.state,
            postback = output.postback_on_complete,
            took_ms = start.elapsed().as_millis() as u64,
            "Grading job done"
        );
        ExecutionResult::new(job, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report(feedback: &str) -> GradeReport {
        GradeReport::with_feedback(feedback, "SUCCESS")
    }

    #[test]
    fn test_clean_exit_with_report_is_success() {
        let mut out = ContainerOutput::default_fail("t");
        classify(&mut out, "d1", &RunExit::Exited(0), Some(Ok(report("ok"))));
        assert_eq!(out.state, ContainerState::Success);
        assert!(!out.postback_on_complete);
        assert_eq!(out.report.feedback, "ok");
    }

    #[test]
    fn test_nonzero_exit_posts_back() {
        let mut out = ContainerOutput::default_fail("t");
        classify(&mut out, "d1", &RunExit::Exited(2), Some(Ok(report("lint"))));
        assert_eq!(out.state, ContainerState::Success);
        assert!(out.postback_on_complete);
    }

    #[test]
    fn test_missing_report_is_no_report() {
        let mut out = ContainerOutput::default_fail("t");
        classify(&mut out, "d1", &RunExit::Exited(0), None);
        assert_eq!(out.state, ContainerState::NoReport);
        assert!(out.postback_on_complete);
        assert_eq!(out.report.feedback, FEEDBACK_NO_REPORT);

        let mut out = ContainerOutput::default_fail("t");
        let bad = Err(Error::Report("eof".to_string()));
        classify(&mut out, "d1", &RunExit::Exited(0), Some(bad));
        assert_eq!(out.state, ContainerState::NoReport);
    }

    #[test]
    fn test_timeout_ignores_report() {
        let mut out = ContainerOutput::default_fail("t");
        classify(&mut out, "d1", &RunExit::TimedOut, Some(Ok(report("late"))));
        assert_eq!(out.state, ContainerState::Timeout);
        assert!(out.postback_on_complete);
        assert!(out.report.feedback.starts_with("Container did not complete for **`#d1`**"));
    }

    #[test]
    fn test_container_failure() {
        let mut out = ContainerOutput::default_fail("t");
        let exit = RunExit::Failed(Error::Container("boom".to_string()));
        classify(&mut out, "d1", &exit, None);
        assert_eq!(out.state, ContainerState::Fail);
        assert_eq!(out.report.feedback, "Container failed for `d1`.");
    }

    #[tokio::test]
    async fn test_read_report_rejects_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let ws = Workspace::new(&RunnerConfig::new(dir.path()), &TaskId::new("abc", "d1"));
        ws.prepare().await.unwrap();
        assert!(GradingJob::read_report(&ws).await.is_none());

        tokio::fs::write(ws.report_path(), b"{not json").await.unwrap();
        let report = GradingJob::read_report(&ws).await;
        assert!(matches!(report, Some(Err(Error::Report(_)))));
    }
}
