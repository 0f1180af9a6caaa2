//! Queue snapshots on disk.

use crate::set::QueueSnapshot;
use autotest_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

const SNAPSHOT_FILE: &str = "queues.json";

/// Reads and writes `<persist_dir>/queues/queues.json`.
///
/// Writes are serialized, and each carries the generation of the snapshot it
/// holds; clones share the last generation written.
#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
    written: Arc<Mutex<Option<u64>>>,
}

fn queue_io(action: &str, path: &Path, err: std::io::Error) -> Error {
    Error::Queue(format!("Failed to {} {}: {}", action, path.display(), err))
}

impl QueueStore {
    pub fn new(persist_dir: impl AsRef<Path>) -> Self {
        Self {
            path: persist_dir.as_ref().join("queues").join(SNAPSHOT_FILE),
            written: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot through a temp file so readers never see a partial file.
    ///
    /// Returns `Ok(false)` without writing when a newer generation is already
    /// on disk.
    pub async fn save(&self, generation: u64, snapshot: &QueueSnapshot) -> Result<bool> {
        let mut written = self.written.lock().await;
        if written.is_some_and(|last| last >= generation) {
            debug!(generation, last = ?*written, "Stale queue snapshot skipped");
            return Ok(false);
        }

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| queue_io("create", dir, e))?;
        }
        let body = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| queue_io("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| queue_io("rename", &tmp, e))?;

        *written = Some(generation);
        debug!(path = %self.path.display(), generation, "Queues persisted");
        Ok(true)
    }

    /// `Ok(None)` when nothing has been persisted yet.
    pub async fn load(&self) -> Result<Option<QueueSnapshot>> {
        let body = match tokio::fs::read(&self.path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(queue_io("read", &self.path, e)),
        };
        let snapshot: QueueSnapshot = serde_json::from_slice(&body)?;
        info!(
            path = %self.path.display(),
            express = snapshot.express.len(),
            standard = snapshot.standard.len(),
            regression = snapshot.regression.len(),
            executing = snapshot.executing.len(),
            "Queues loaded"
        );
        Ok(Some(snapshot))
    }
}
