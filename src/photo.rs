//! Asynchronous photo capture.
//!
//! Proof photos are read from disk off the command path: each selected
//! file becomes one cancellable read task, and completions append to an
//! in-memory list that is handed to a phase commit. Reads may be in
//! flight in any number and resolve in any order; only final list
//! membership matters to validation.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use uuid::Uuid;

/// Handle to one captured photo. The bytes themselves stay with the
/// surrounding application; the workflow only carries provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoHandle {
    pub id: String,
    pub file_name: String,
    pub byte_len: u64,
}

impl PhotoHandle {
    /// Handle for a photo that exists only in memory. Used by the demo
    /// and by tests that do not touch the filesystem.
    pub fn synthetic(file_name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            byte_len: 0,
        }
    }
}

/// Collects in-flight photo reads for one phase of one job.
#[derive(Default)]
pub struct PhotoTray {
    tasks: JoinSet<io::Result<PhotoHandle>>,
}

impl PhotoTray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start reading one file. Returns immediately; the handle becomes
    /// available through [`PhotoTray::collect`].
    pub fn capture(&mut self, path: impl AsRef<Path>) {
        let path: PathBuf = path.as_ref().to_path_buf();
        self.tasks.spawn(async move {
            let bytes = tokio::fs::read(&path).await?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(PhotoHandle {
                id: Uuid::new_v4().to_string(),
                file_name,
                byte_len: bytes.len() as u64,
            })
        });
    }

    /// Number of reads still pending.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Abort every read that has not yet resolved.
    pub fn cancel_pending(&mut self) {
        self.tasks.abort_all();
    }

    /// Await all outstanding reads and return the captured handles.
    /// Aborted reads are dropped silently; a failed read fails the whole
    /// collection so the operator can re-select the file.
    pub async fn collect(&mut self) -> io::Result<Vec<PhotoHandle>> {
        let mut handles = Vec::new();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(read) => handles.push(read?),
                Err(e) if e.is_cancelled() => continue,
                Err(e) => return Err(io::Error::other(e)),
            }
        }
        Ok(handles)
    }
}
