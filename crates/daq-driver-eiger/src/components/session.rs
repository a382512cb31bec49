//! File session for acquired image files.
//!
//! The detector writes each acquisition to a remote data file. After
//! download, the local copy is opened through an [`ImageFileOpener`] and
//! frames are pulled one at a time.
//!
//! # Ownership
//!
//! A session holds at most one decoded-image handle. Opening a new file
//! drops the previous handle *before* the new one is opened, and a failed
//! open leaves the session empty. Frames are borrowed from the handle, so a
//! frame cannot outlive the next `next_frame`, `replace` or `release` call.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A decoded image file yielding frames on demand.
pub trait ImageFile: Send {
    /// Next frame in the file, `None` once exhausted.
    ///
    /// The returned slice is valid until the next call on this handle.
    fn next_image(&mut self) -> Result<Option<&[u8]>>;
}

/// Opens downloaded files for decoding.
pub trait ImageFileOpener: Send + Sync {
    /// Open the file at `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn ImageFile>>;
}

/// Single optional, exclusively owned decoded-image handle.
pub struct FileSession {
    opener: Arc<dyn ImageFileOpener>,
    current: Option<Box<dyn ImageFile>>,
    path: Option<PathBuf>,
}

impl FileSession {
    /// Empty session using `opener` for every file.
    pub fn new(opener: Arc<dyn ImageFileOpener>) -> Self {
        Self {
            opener,
            current: None,
            path: None,
        }
    }

    /// Release the open handle (if any) and open `path` in its place.
    pub fn replace(&mut self, path: &Path) -> Result<()> {
        self.release();
        let file = self
            .opener
            .open(path)
            .with_context(|| format!("Failed to open image file {}", path.display()))?;
        tracing::debug!("Opened image file {}", path.display());
        self.current = Some(file);
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Drop the open handle. No-op on an empty session.
    pub fn release(&mut self) {
        if let Some(path) = self.path.take() {
            tracing::debug!("Releasing image file {}", path.display());
        }
        self.current = None;
    }

    /// Next frame of the open file; `None` when nothing is open or the file
    /// is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<&[u8]>> {
        match self.current.as_mut() {
            Some(file) => file.next_image(),
            None => Ok(None),
        }
    }

    /// Whether a decoded handle is currently held.
    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Path of the open file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl std::fmt::Debug for FileSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSession")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
