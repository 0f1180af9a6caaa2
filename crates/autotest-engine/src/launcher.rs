//! Background job launching.

use autotest_core::ports::{CoursePortal, GradingRunner};
use autotest_core::util::sha_human;
use autotest_core::{ContainerOutput, Error, ExecutionResult, JobDescriptor};
use autotest_scheduler::JobLauncher;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Runs each started job on its own task and reports the result on `completions`.
///
/// A result is sent on every exit path, including a panicking runner, so the
/// executing slot is always released.
pub struct ExecutorLauncher {
    runner: Arc<dyn GradingRunner>,
    portal: Arc<dyn CoursePortal>,
    completions: mpsc::UnboundedSender<ExecutionResult>,
}

impl ExecutorLauncher {
    pub fn new(
        runner: Arc<dyn GradingRunner>,
        portal: Arc<dyn CoursePortal>,
        completions: mpsc::UnboundedSender<ExecutionResult>,
    ) -> Self {
        Self {
            runner,
            portal,
            completions,
        }
    }
}

/// Swap in the current container configuration if the image changed while the job waited.
pub(crate) async fn refresh_container(portal: &dyn CoursePortal, mut job: JobDescriptor) -> JobDescriptor {
    match portal.container_config(&job.deliv_id).await {
        Ok(Some(current)) if current.image != job.container.image => {
            info!(
                deliv = %job.deliv_id,
                old = %job.container.image,
                new = %current.image,
                "Container image changed while queued; using current config"
            );
            job.container = current;
        }
        Ok(_) => {}
        Err(e) => warn!(deliv = %job.deliv_id, error = %e, "Failed to refresh container config"),
    }
    job
}

fn panic_error(payload: &(dyn Any + Send)) -> Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|m| m.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    Error::Internal(format!("grading task panicked: {}", message))
}

async fn run_job(runner: Arc<dyn GradingRunner>, portal: Arc<dyn CoursePortal>, job: JobDescriptor) -> ExecutionResult {
    let job = refresh_container(portal.as_ref(), job).await;
    let fallback = job.clone();

    match AssertUnwindSafe(runner.execute(job)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let task_id = fallback.task_id();
            error!(
                task_id = %task_id,
                sha = %sha_human(&fallback.target.commit_sha),
                error = %panic_error(payload.as_ref()),
                "Grading task panicked"
            );
            ExecutionResult::new(fallback, ContainerOutput::default_fail(task_id.as_str()))
        }
    }
}

impl JobLauncher for ExecutorLauncher {
    fn launch(&self, job: JobDescriptor) {
        let runner = Arc::clone(&self.runner);
        let portal = Arc::clone(&self.portal);
        let completions = self.completions.clone();

        tokio::spawn(async move {
            let key = job.key();
            let result = run_job(runner, portal, job).await;
            if completions.send(result).is_err() {
                warn!(key = %key, "Completion dropped; orchestrator gone");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use autotest_core::{CommitTarget, ContainerConfig, ContainerState};
    use autotest_store::{CourseConfig, StaticCoursePortal};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn container(image: &str) -> ContainerConfig {
        ContainerConfig {
            image: image.to_string(),
            max_exec_time: 60,
            student_delay: 0,
            open_timestamp: Utc::now(),
            close_timestamp: Utc::now(),
            late_autotest: true,
            regression_deliv_ids: Vec::new(),
            cpus: None,
            memory_bytes: None,
            network: None,
            custom: serde_json::Value::Null,
        }
    }

    fn job(image: &str) -> JobDescriptor {
        let target = CommitTarget {
            deliv_id: None,
            repo_id: "repo".to_string(),
            org_id: None,
            person_id: None,
            bot_mentioned: false,
            clone_url: "https://example.com/repo.git".to_string(),
            commit_sha: "abcdef123".to_string(),
            commit_url: "https://example.com/repo/commit/abcdef123".to_string(),
            postback_url: String::new(),
            timestamp: Utc::now(),
            ref_name: String::new(),
            flags: Vec::new(),
            admin_request: false,
        };
        JobDescriptor::new("d1", target, container(image))
    }

    fn portal(image: &str) -> StaticCoursePortal {
        let mut course = CourseConfig::default();
        course.deliverables.insert("d1".to_string(), container(image));
        StaticCoursePortal::new(course)
    }

    struct PanickingRunner;

    #[async_trait]
    impl GradingRunner for PanickingRunner {
        async fn execute(&self, _job: JobDescriptor) -> ExecutionResult {
            panic!("grader exploded");
        }
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_image() {
        let refreshed = refresh_container(&portal("grader:v2"), job("grader:v1")).await;
        assert_eq!(refreshed.container.image, "grader:v2");

        let unchanged = refresh_container(&portal("grader:v1"), job("grader:v1")).await;
        assert_eq!(unchanged.container.image, "grader:v1");
    }

    #[tokio::test]
    async fn test_panicking_runner_still_completes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let launcher = ExecutorLauncher::new(
            Arc::new(PanickingRunner),
            Arc::new(portal("grader:v1")),
            tx,
        );

        launcher.launch(job("grader:v1"));
        let result = rx.recv().await.unwrap();
        assert_eq!(result.output.state, ContainerState::Fail);
        assert!(result.output.postback_on_complete);
        assert_eq!(result.deliv_id, "d1");
    }

    #[test]
    fn test_panic_error_keeps_message() {
        let err = panic_error(&"index out of bounds");
        assert_eq!(err.to_string(), "Internal error: grading task panicked: index out of bounds");

        let owned: Box<dyn Any + Send> = Box::new(String::from("boom"));
        assert!(matches!(panic_error(owned.as_ref()), Error::Internal(m) if m.ends_with("boom")));

        let opaque: Box<dyn Any + Send> = Box::new(7_u8);
        assert!(panic_error(opaque.as_ref()).to_string().contains("non-string panic payload"));
    }
}
