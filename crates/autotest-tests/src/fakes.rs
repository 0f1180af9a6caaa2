//! In-process stand-ins for the collaborator ports.

use async_trait::async_trait;
use autotest_core::ports::{
    CommentChannel, ContainerHandle, ContainerRuntime, ContainerSpec, GradingRunner, SourceControl,
};
use autotest_core::{
    CommitKey, ContainerOutput, ContainerState, Error, ExecutionResult, JobDescriptor, Result,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Comment channel that records every post.
#[derive(Default)]
pub struct RecordingChannel {
    posts: Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.posts().into_iter().map(|(_, m)| m).collect()
    }
}

#[async_trait]
impl CommentChannel for RecordingChannel {
    async fn post_message(&self, url: &str, markdown: &str) -> Result<bool> {
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), markdown.to_string()));
        Ok(true)
    }
}

/// What the fake grading container does.
#[derive(Debug, Clone)]
pub enum ContainerBehavior {
    /// Write `report` (if any) to the output mount and exit with `code`.
    Exit { code: i64, report: Option<String> },
    /// Write `report` (if any), then run until stopped.
    Hang { report: Option<String> },
    FailCreate,
}

/// Container runtime that acts out a `ContainerBehavior`.
pub struct FakeRuntime {
    behavior: ContainerBehavior,
    specs: Mutex<Vec<ContainerSpec>>,
    output_dir: Mutex<Option<PathBuf>>,
    stopped: AtomicBool,
    removed: AtomicUsize,
}

impl FakeRuntime {
    pub fn new(behavior: ContainerBehavior) -> Self {
        Self {
            behavior,
            specs: Mutex::new(Vec::new()),
            output_dir: Mutex::new(None),
            stopped: AtomicBool::new(false),
            removed: AtomicUsize::new(0),
        }
    }

    pub fn specs(&self) -> Vec<ContainerSpec> {
        self.specs.lock().unwrap().clone()
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }

    fn write_report(&self, report: &Option<String>) -> Result<()> {
        let Some(report) = report else {
            return Ok(());
        };
        let dir = self
            .output_dir
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Container("no /output mount".to_string()))?;
        std::fs::write(dir.join("staff").join("report.json"), report)?;
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        if matches!(self.behavior, ContainerBehavior::FailCreate) {
            return Err(Error::Container(format!("no such image: {}", spec.image)));
        }
        let output = spec
            .binds
            .iter()
            .find_map(|b| b.strip_suffix(":/output"))
            .map(PathBuf::from);
        *self.output_dir.lock().unwrap() = output;
        self.specs.lock().unwrap().push(spec.clone());
        Ok(ContainerHandle {
            id: format!("fake-{}", spec.name),
        })
    }

    async fn start(&self, _handle: &ContainerHandle) -> Result<()> {
        match &self.behavior {
            ContainerBehavior::Exit { report, .. } | ContainerBehavior::Hang { report } => {
                self.write_report(report)
            }
            ContainerBehavior::FailCreate => Ok(()),
        }
    }

    async fn stop(&self, _handle: &ContainerHandle, _grace_secs: i64) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&self, _handle: &ContainerHandle) -> Result<i64> {
        match &self.behavior {
            ContainerBehavior::Exit { code, .. } => Ok(*code),
            _ => {
                while !self.was_stopped() {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Ok(137)
            }
        }
    }

    async fn logs(&self, _handle: &ContainerHandle) -> Result<String> {
        Ok("running tests...\n".to_string())
    }

    async fn remove(&self, _handle: &ContainerHandle) -> Result<()> {
        self.removed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Git stand-in that fakes a checkout on disk.
#[derive(Default)]
pub struct FakeSourceControl {
    fail_clone: bool,
    checkouts: Mutex<Vec<String>>,
}

impl FakeSourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_clone: true,
            ..Default::default()
        }
    }

    pub fn checkouts(&self) -> Vec<String> {
        self.checkouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceControl for FakeSourceControl {
    async fn clone_repo(&self, clone_url: &str, dir: &Path) -> Result<()> {
        if self.fail_clone {
            return Err(Error::Git(format!("repository not found: {}", clone_url)));
        }
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(dir.join("README.md"), clone_url).await?;
        Ok(())
    }

    async fn checkout(&self, _dir: &Path, commit_sha: &str) -> Result<()> {
        self.checkouts.lock().unwrap().push(commit_sha.to_string());
        Ok(())
    }

    async fn chown(&self, _dir: &Path, _uid: u32) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Script {
    Output {
        feedback: String,
        postback: bool,
    },
    Panic,
}

/// Grading runner with canned results per commit.
///
/// Unscripted commits succeed with `Tests passed.` and no postback. A held
/// runner blocks every job until `release` is called.
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, Script>>,
    gate: Option<Semaphore>,
    executed: Mutex<Vec<CommitKey>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

pub const SCRIPTED_FEEDBACK: &str = "Tests passed.";

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        }
    }

    pub fn release(&self, jobs: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(jobs);
        }
    }

    pub fn with_output(self, commit_url: &str, feedback: &str, postback: bool) -> Self {
        self.scripts.lock().unwrap().insert(
            commit_url.to_string(),
            Script::Output {
                feedback: feedback.to_string(),
                postback,
            },
        );
        self
    }

    pub fn panicking_on(self, commit_url: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(commit_url.to_string(), Script::Panic);
        self
    }

    pub fn executed(&self) -> Vec<CommitKey> {
        self.executed.lock().unwrap().clone()
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Most jobs ever in flight at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GradingRunner for ScriptedRunner {
    async fn execute(&self, job: JobDescriptor) -> ExecutionResult {
        self.executed.lock().unwrap().push(job.key());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate
            && let Ok(permit) = gate.acquire().await
        {
            permit.forget();
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(job.commit_url())
            .cloned()
            .unwrap_or(Script::Output {
                feedback: SCRIPTED_FEEDBACK.to_string(),
                postback: false,
            });
        self.running.fetch_sub(1, Ordering::SeqCst);

        let (feedback, postback) = match script {
            Script::Output { feedback, postback } => (feedback, postback),
            Script::Panic => panic!("scripted grader panic"),
        };
        let mut output = ContainerOutput::default_fail(job.task_id().as_str());
        output.state = ContainerState::Success;
        output.postback_on_complete = postback;
        output.report.feedback = feedback;
        ExecutionResult::new(job, output)
    }
}
