//! Short-lived on-disk copies of uploaded images.
//!
//! Every `/classify` request writes its upload to its own uuid-named file and holds a
//! [`ScratchFile`] guard for as long as the classifier needs it. Dropping the guard deletes the
//! file, which covers early returns, errors, panics and handler futures cancelled by a client
//! disconnect alike.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory that scratch files are created in.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    base_path: PathBuf,
}

impl ScratchDir {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    /// Create the directory if it does not exist yet.
    pub async fn ensure_exists(&self) -> io::Result<()> {
        fs::create_dir_all(&self.base_path).await
    }

    /// Write `content` to a fresh file named `<uuid>.<extension>`.
    ///
    /// On failure nothing is left behind.
    pub async fn write(&self, content: &[u8], extension: &str) -> io::Result<ScratchFile> {
        let path = self.base_path.join(format!("{}.{}", Uuid::new_v4(), extension));

        // Created synchronously so no await point sits between the file appearing on disk and
        // the guard owning it. create_new: a collision would mean two requests sharing a file.
        let file = std::fs::OpenOptions::new().write(true).create_new(true).open(&path)?;
        let guard = ScratchFile { path };
        let mut file = fs::File::from_std(file);
        file.write_all(content).await?;
        file.sync_all().await?;

        debug!(path = %guard.path.display(), bytes = content.len(), "Wrote scratch file");
        Ok(guard)
    }
}

/// Owns a scratch file on disk; the file is removed when this is dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        self.path.file_name().and_then(|name| name.to_str()).unwrap_or_default()
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // Drop may run outside a runtime, so this is a blocking unlink
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed scratch file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file"),
        }
    }
}
