//! Single-flight run lock.
//!
//! At most one build runs against a target at a time. The guard writes a
//! marker file containing the acquisition timestamp; a marker already on
//! disk is a fatal precondition failure — the new run aborts before
//! touching any output, it does not queue or wait.
//!
//! The marker is removed on drop, so every exit path (success, error
//! return, panic unwind) releases the lock. A marker that survives a
//! SIGKILL must be removed by hand; its timestamp says how stale it is.

use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOCK_FILENAME: &str = ".linotype-lock";

#[derive(Error, Debug)]
pub enum LockError {
    #[error("another build is running (lock file {0} exists)")]
    AlreadyLocked(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// RAII guard over the run lock marker.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Acquire the lock in `dir`, failing fast if it is already held.
    pub fn acquire(dir: &Path) -> Result<Self, LockError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILENAME);
        if path.exists() {
            return Err(LockError::AlreadyLocked(path));
        }
        std::fs::write(&path, Utc::now().to_rfc3339())?;
        Ok(Self { path })
    }

    /// Path of the marker file (for diagnostics).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            // Nothing sane to do here but say so.
            tracing::warn!(path = %self.path.display(), %err, "failed to remove run lock");
        }
    }
}
