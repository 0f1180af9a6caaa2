//! Per-job workspace on disk.

use crate::config::RunnerConfig;
use autotest_core::{Error, Result, TaskId};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

fn failed(path: &Path, err: std::io::Error) -> Error {
    Error::Workspace(format!("{}: {}", path.display(), err))
}

/// `<persist_dir>/runs/<sha>-<deliv>/` with `staff/`, `student/`, `admin/`
/// output dirs and the student checkout in `assn/`.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    host_root: PathBuf,
}

impl Workspace {
    pub fn new(config: &RunnerConfig, task_id: &TaskId) -> Self {
        Self {
            root: config.persist_dir.join("runs").join(task_id.as_str()),
            host_root: config.host_dir().join("runs").join(task_id.as_str()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn assn_dir(&self) -> PathBuf {
        self.root.join("assn")
    }

    pub fn staff_dir(&self) -> PathBuf {
        self.root.join("staff")
    }

    pub fn report_path(&self) -> PathBuf {
        self.staff_dir().join("report.json")
    }

    pub fn stdio_path(&self) -> PathBuf {
        self.staff_dir().join("stdio.txt")
    }

    /// Volume bindings for the grading container.
    pub fn binds(&self) -> Vec<String> {
        vec![
            format!("{}:/assn", self.host_root.join("assn").display()),
            format!("{}:/output", self.host_root.display()),
        ]
    }

    /// Start from an empty tree.
    pub async fn prepare(&self) -> Result<()> {
        if fs::try_exists(&self.root).await.map_err(|e| failed(&self.root, e))? {
            fs::remove_dir_all(&self.root)
                .await
                .map_err(|e| failed(&self.root, e))?;
        }
        for sub in ["staff", "student", "admin"] {
            let dir = self.root.join(sub);
            fs::create_dir_all(&dir).await.map_err(|e| failed(&dir, e))?;
        }
        debug!(path = %self.root.display(), "Workspace created");
        Ok(())
    }

    /// Drop the checkout; outputs stay for later inspection.
    pub async fn remove_checkout(&self) {
        let assn = self.assn_dir();
        match fs::try_exists(&assn).await {
            Ok(true) => {
                if let Err(e) = fs::remove_dir_all(&assn).await {
                    warn!(path = %assn.display(), error = %e, "Failed to remove checkout");
                }
            }
            Ok(false) => {}
            Err(e) => warn!(path = %assn.display(), error = %e, "Failed to stat checkout"),
        }
    }
}
