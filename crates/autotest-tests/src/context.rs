//! A fully wired AutoTest over in-process fakes.

use crate::fakes::{RecordingChannel, ScriptedRunner};
use crate::fixtures::{BOT, ORG};
use crate::helpers::wait_for;
use autotest_core::ports::DataStore;
use autotest_core::{CommitTarget, QueueStatus};
use autotest_engine::{AutoTest, Collaborators, GitHubAutoTest, GitHubConfig, GitHubExecutionProcessor};
use autotest_scheduler::SchedulerConfig;
use autotest_store::{CourseConfig, MemoryDataStore, StaticCoursePortal};
use std::sync::Arc;
use std::time::Duration;

pub struct TestContext {
    pub github: GitHubAutoTest,
    pub store: Arc<MemoryDataStore>,
    pub channel: Arc<RecordingChannel>,
    pub runner: Arc<ScriptedRunner>,
}

impl TestContext {
    pub fn new(course: CourseConfig, capacities: SchedulerConfig, runner: ScriptedRunner) -> Self {
        crate::init_test_logging();
        let store = Arc::new(MemoryDataStore::new());
        let channel = Arc::new(RecordingChannel::new());
        let runner = Arc::new(runner);

        let autotest = AutoTest::start(
            capacities,
            None,
            Collaborators {
                runner: runner.clone(),
                store: store.clone(),
                portal: Arc::new(StaticCoursePortal::new(course)),
                processor: Arc::new(GitHubExecutionProcessor::new(store.clone(), channel.clone())),
            },
        );
        let github = GitHubAutoTest::new(
            autotest,
            channel.clone(),
            GitHubConfig {
                bot_name: BOT.to_string(),
                org: Some(ORG.to_string()),
            },
        );

        Self {
            github,
            store,
            channel,
            runner,
        }
    }

    pub fn with_course(course: CourseConfig) -> Self {
        Self::new(course, SchedulerConfig::default(), ScriptedRunner::new())
    }

    pub fn autotest(&self) -> &Arc<AutoTest> {
        self.github.autotest()
    }

    pub async fn status(&self) -> QueueStatus {
        self.autotest().status().await
    }

    pub async fn push_record(&self, commit_url: &str) -> Option<CommitTarget> {
        self.store.get_push_record(commit_url).await.unwrap()
    }

    /// Wait until nothing is queued or running.
    pub async fn wait_idle(&self) -> bool {
        wait_for(Duration::from_secs(5), Duration::from_millis(10), || async {
            self.status().await == QueueStatus::default()
        })
        .await
    }
}
