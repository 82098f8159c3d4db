//! Scoped local archive files.

use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::error::FileSystemError;

/// A freshly built archive in a temporary location.
///
/// The file is removed when the value is dropped, so callers that
/// propagate an error (including a failed distribution) never leak it.
#[derive(Debug)]
pub struct LocalArchive {
    path: TempPath,
    size: u64,
    entry_count: usize,
}

impl LocalArchive {
    pub(crate) fn new(path: TempPath, size: u64, entry_count: usize) -> Self {
        Self {
            path,
            size,
            entry_count,
        }
    }

    /// Location of the archive on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archive size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of entries written to the archive.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Move the archive to a permanent location instead of deleting it.
    ///
    /// # Arguments
    /// * `destination` - Target path; overwritten if it exists
    ///
    /// # Errors
    /// Returns `FileSystemError::IoError` if the file cannot be moved.
    pub fn persist(self, destination: impl AsRef<Path>) -> Result<PathBuf, FileSystemError> {
        let destination: &Path = destination.as_ref();
        self.path
            .persist(destination)
            .map_err(|e| FileSystemError::io_error(destination.display().to_string(), e.error))?;
        Ok(destination.to_path_buf())
    }

    /// Remove the archive now, reporting any error.
    ///
    /// # Errors
    /// Returns `FileSystemError::IoError` if the file cannot be removed.
    pub fn close(self) -> Result<(), FileSystemError> {
        let display: String = self.path.display().to_string();
        self.path
            .close()
            .map_err(|e| FileSystemError::io_error(display, e))
    }
}
