//! `GradingJob` against fake Docker and git.

use autotest_core::ports::GradingRunner;
use autotest_core::result::{FEEDBACK_DEFAULT_FAIL, FEEDBACK_NO_REPORT};
use autotest_core::{ContainerConfig, ContainerState, TaskId};
use autotest_runner::{GradingJob, RunnerConfig, Workspace};
use autotest_tests::{
    ConfigFixture, ContainerBehavior, FakeRuntime, FakeSourceControl, TargetFixture,
    init_test_logging,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

const REPORT: &str = r###"{"scoreOverall": 87.5, "scoreTest": 90.0, "feedback": "## 87.5%\nGood work.", "result": "SUCCESS", "passNames": ["a", "b"]}"###;

struct Rig {
    dir: TempDir,
    runtime: Arc<FakeRuntime>,
    git: Arc<FakeSourceControl>,
    job: GradingJob,
}

fn rig(behavior: ContainerBehavior, git: FakeSourceControl) -> Rig {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(FakeRuntime::new(behavior));
    let git = Arc::new(git);
    let job = GradingJob::new(
        runtime.clone(),
        git.clone(),
        RunnerConfig::new(dir.path()),
    );
    Rig {
        dir,
        runtime,
        git,
        job,
    }
}

fn exit(code: i64, report: Option<&str>) -> ContainerBehavior {
    ContainerBehavior::Exit {
        code,
        report: report.map(str::to_string),
    }
}

fn workspace(rig: &Rig, sha: &str) -> Workspace {
    Workspace::new(&RunnerConfig::new(rig.dir.path()), &TaskId::new(sha, "d1"))
}

#[tokio::test]
async fn test_clean_exit_with_report() {
    let rig = rig(exit(0, Some(REPORT)), FakeSourceControl::new());
    let job = TargetFixture::job("repo1", "abc123", ConfigFixture::container(0));

    let result = rig.job.execute(job).await;

    assert_eq!(result.output.state, ContainerState::Success);
    assert!(!result.output.postback_on_complete);
    assert_eq!(result.output.report.score_overall, 87.5);
    assert_eq!(result.feedback(), "## 87.5%\nGood work.");
    assert_eq!(result.output.grader_task_id, "abc123-d1");
    assert_eq!(rig.git.checkouts(), vec!["abc123".to_string()]);
    assert_eq!(rig.runtime.removed(), 1);

    let ws = workspace(&rig, "abc123");
    assert!(!ws.assn_dir().exists());
    let stdio = std::fs::read_to_string(ws.stdio_path()).unwrap();
    assert_eq!(stdio, "running tests...\n");

    let spec = &rig.runtime.specs()[0];
    assert!(spec.env.contains(&"ASSIGNMENT=d1".to_string()));
    assert_eq!(spec.user.as_deref(), Some("1000"));
    assert_eq!(spec.nano_cpus, Some(1_000_000_000));
}

#[tokio::test]
async fn test_nonzero_exit_posts_back() {
    let rig = rig(exit(1, Some(REPORT)), FakeSourceControl::new());
    let result = rig
        .job
        .execute(TargetFixture::job("repo1", "abc123", ConfigFixture::container(0)))
        .await;

    assert_eq!(result.output.state, ContainerState::Success);
    assert!(result.output.postback_on_complete);
}

#[tokio::test]
async fn test_missing_report() {
    let rig = rig(exit(0, None), FakeSourceControl::new());
    let result = rig
        .job
        .execute(TargetFixture::job("repo1", "abc123", ConfigFixture::container(0)))
        .await;

    assert_eq!(result.output.state, ContainerState::NoReport);
    assert!(result.output.postback_on_complete);
    assert_eq!(result.feedback(), FEEDBACK_NO_REPORT);
}

#[tokio::test]
async fn test_unparseable_report() {
    let rig = rig(exit(0, Some("{not json")), FakeSourceControl::new());
    let result = rig
        .job
        .execute(TargetFixture::job("repo1", "abc123", ConfigFixture::container(0)))
        .await;

    assert_eq!(result.output.state, ContainerState::NoReport);
}

#[tokio::test]
async fn test_timeout_wins_over_report() {
    let rig = rig(
        ContainerBehavior::Hang {
            report: Some(REPORT.to_string()),
        },
        FakeSourceControl::new(),
    );
    let job = TargetFixture::job("repo1", "slow00", ConfigFixture::with_timeout(1));

    let result = rig.job.execute(job).await;

    assert_eq!(result.output.state, ContainerState::Timeout);
    assert!(result.output.postback_on_complete);
    assert!(result.feedback().contains("did not complete"));
    assert!(rig.runtime.was_stopped());
    assert_eq!(rig.runtime.removed(), 1);
}

#[tokio::test]
async fn test_create_failure_is_fail() {
    let rig = rig(ContainerBehavior::FailCreate, FakeSourceControl::new());
    let result = rig
        .job
        .execute(TargetFixture::job("repo1", "abc123", ConfigFixture::container(0)))
        .await;

    assert_eq!(result.output.state, ContainerState::Fail);
    assert!(result.output.postback_on_complete);
    assert!(!workspace(&rig, "abc123").assn_dir().exists());
}

#[tokio::test]
async fn test_clone_failure_never_starts_container() {
    let rig = rig(exit(0, Some(REPORT)), FakeSourceControl::failing());
    let result = rig
        .job
        .execute(TargetFixture::job("repo1", "abc123", ConfigFixture::container(0)))
        .await;

    assert_eq!(result.output.state, ContainerState::Fail);
    assert_eq!(result.feedback(), FEEDBACK_DEFAULT_FAIL);
    assert!(rig.runtime.specs().is_empty());
}

#[tokio::test]
async fn test_resource_limits_from_container_config() {
    let rig = rig(exit(0, Some(REPORT)), FakeSourceControl::new());
    let container = ContainerConfig {
        cpus: Some(2.0),
        memory_bytes: Some(512 * 1024 * 1024),
        network: Some("none".to_string()),
        ..ConfigFixture::container(0)
    };
    rig.job
        .execute(TargetFixture::job("repo1", "abc123", container))
        .await;

    let spec = &rig.runtime.specs()[0];
    assert_eq!(spec.nano_cpus, Some(2_000_000_000));
    assert_eq!(spec.memory_bytes, Some(512 * 1024 * 1024));
    assert_eq!(spec.network.as_deref(), Some("none"));
    assert_eq!(spec.image, "grader:d1");
}

#[tokio::test]
async fn test_concurrent_jobs_use_distinct_workspaces() {
    let dir = TempDir::new().unwrap();
    let config = RunnerConfig::new(dir.path());
    let a = Workspace::new(&config, &TaskId::new("aaa111", "d1"));
    let b = Workspace::new(&config, &TaskId::new("bbb222", "d1"));
    let c = Workspace::new(&config, &TaskId::new("aaa111", "d2"));

    assert_ne!(a.root(), b.root());
    assert_ne!(a.root(), c.root());
}
