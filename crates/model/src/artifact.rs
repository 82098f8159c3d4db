//! Built artifacts with lazily computed, cached checksums.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

use crate::error::ModelError;
use crate::naming::{
    content_addressed_name, fixed_name, validate_logical_name, ChecksumNamer, NamingStrategy,
};

/// A single named archive produced by one build invocation.
///
/// The checksum is computed on first request and cached, so every consumer
/// holding a shared reference (`Arc<Artifact>`) sees the same value without
/// re-hashing the archive.
#[derive(Debug)]
pub struct Artifact {
    name: String,
    source_path: PathBuf,
    archive_path: PathBuf,
    naming: NamingStrategy,
    namer: ChecksumNamer,
    checksum: OnceCell<String>,
}

impl Artifact {
    /// Create an artifact for an archive that has already been built.
    ///
    /// # Arguments
    /// * `name` - Logical artifact name
    /// * `source_path` - Directory the archive was built from
    /// * `archive_path` - Location of the local archive
    /// * `naming` - How the canonical filename is derived
    ///
    /// # Errors
    /// Returns `ModelError::InvalidName` if the name cannot be used in a filename.
    pub fn new(
        name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        archive_path: impl Into<PathBuf>,
        naming: NamingStrategy,
    ) -> Result<Self, ModelError> {
        let name: String = name.into();
        validate_logical_name(&name)?;
        Ok(Self {
            name,
            source_path: source_path.into(),
            archive_path: archive_path.into(),
            naming,
            namer: ChecksumNamer::default(),
            checksum: OnceCell::new(),
        })
    }

    /// Use a specific namer instead of the default.
    pub fn with_namer(mut self, namer: ChecksumNamer) -> Self {
        self.namer = namer;
        self
    }

    /// Logical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source directory.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Local archive location.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Naming strategy.
    pub fn naming(&self) -> NamingStrategy {
        self.naming
    }

    /// Content checksum of the archive, computed once.
    ///
    /// # Errors
    /// Returns `ModelError::IoError` if the archive cannot be read on first access.
    pub fn checksum(&self) -> Result<&str, ModelError> {
        self.checksum
            .get_or_try_init(|| self.namer.checksum(&self.archive_path))
            .map(String::as_str)
    }

    /// Checksum if it has already been computed.
    pub fn cached_checksum(&self) -> Option<&str> {
        self.checksum.get().map(String::as_str)
    }

    /// Canonical filename according to the naming strategy.
    ///
    /// Fixed-name artifacts never hash their archive.
    ///
    /// # Errors
    /// Returns `ModelError::IoError` if a needed checksum cannot be computed.
    pub fn canonical_filename(&self) -> Result<String, ModelError> {
        match self.naming {
            NamingStrategy::ContentAddressed => {
                Ok(content_addressed_name(&self.name, self.checksum()?))
            }
            NamingStrategy::Fixed => Ok(fixed_name(&self.name)),
        }
    }
}
