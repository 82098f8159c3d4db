//! Canonical artifact filenames.
//!
//! Two filename grammars are understood by job-side retrieval scripts:
//!
//! - `{logical_name}.{checksum_hex}.tgz` for content-addressed artifacts
//! - `{logical_name}.tgz` for fixed-name artifacts

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::hash::DigestAlgorithm;

/// File extension of every bundled archive.
pub const ARCHIVE_EXTENSION: &str = "tgz";

/// How an artifact's canonical filename is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    /// Name carries the archive digest; identical content yields identical names.
    #[default]
    ContentAddressed,
    /// Name is fixed; the remote copy is replaced on every run.
    Fixed,
}

/// Derives content identifiers and canonical filenames for archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChecksumNamer {
    algorithm: DigestAlgorithm,
}

impl ChecksumNamer {
    /// Create a namer using the given digest algorithm.
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    /// The digest algorithm in use.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Compute the content checksum of an archive.
    ///
    /// # Arguments
    /// * `archive` - Path to the archive file
    ///
    /// # Returns
    /// Lowercase hex digest of the archive bytes.
    ///
    /// # Errors
    /// Returns `ModelError::IoError` if the archive cannot be read.
    pub fn checksum(&self, archive: &Path) -> Result<String, ModelError> {
        self.algorithm.digest_file(archive)
    }

    /// Compute the canonical content-addressed filename of an archive.
    ///
    /// # Arguments
    /// * `archive` - Path to the archive file
    /// * `logical_name` - Logical artifact name (e.g. the repository directory name)
    ///
    /// # Returns
    /// `{logical_name}.{checksum}.tgz`
    ///
    /// # Errors
    /// Returns `ModelError::InvalidName` for unusable names or
    /// `ModelError::IoError` if the archive cannot be read.
    pub fn name_for(&self, archive: &Path, logical_name: &str) -> Result<String, ModelError> {
        validate_logical_name(logical_name)?;
        let checksum: String = self.checksum(archive)?;
        Ok(content_addressed_name(logical_name, &checksum))
    }
}

/// Format a content-addressed filename.
pub fn content_addressed_name(logical_name: &str, checksum: &str) -> String {
    format!("{}.{}.{}", logical_name, checksum, ARCHIVE_EXTENSION)
}

/// Format a fixed filename.
pub fn fixed_name(logical_name: &str) -> String {
    format!("{}.{}", logical_name, ARCHIVE_EXTENSION)
}

/// Check that a logical name can be embedded in a filename.
///
/// # Errors
/// Returns `ModelError::InvalidName` if the name is empty, a dot path,
/// or contains a path separator.
pub fn validate_logical_name(logical_name: &str) -> Result<(), ModelError> {
    let invalid: bool = logical_name.is_empty()
        || logical_name == "."
        || logical_name == ".."
        || logical_name.contains('/')
        || logical_name.contains('\\');
    if invalid {
        return Err(ModelError::InvalidName {
            name: logical_name.to_string(),
        });
    }
    Ok(())
}
