//! Digest algorithm definitions.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ModelError;

/// Read buffer size used while hashing archives (1MB).
pub const HASH_BUFFER_SIZE: usize = 1024 * 1024;

/// Supported digest algorithms for archive content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    #[default]
    #[serde(rename = "sha256")]
    Sha256,
}

impl DigestAlgorithm {
    /// Get the string representation of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
        }
    }

    /// Length of the lowercase hex digest.
    pub fn hex_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 64,
        }
    }

    /// Compute the lowercase hex digest of everything `reader` yields.
    ///
    /// # Arguments
    /// * `reader` - Byte source to consume
    ///
    /// # Errors
    /// Returns the reader's IO error.
    pub fn digest_reader<R: Read>(&self, mut reader: R) -> std::io::Result<String> {
        match self {
            DigestAlgorithm::Sha256 => {
                let mut hasher: Sha256 = Sha256::new();
                let mut buffer: Vec<u8> = vec![0u8; HASH_BUFFER_SIZE];
                loop {
                    let read: usize = reader.read(&mut buffer)?;
                    if read == 0 {
                        break;
                    }
                    hasher.update(&buffer[..read]);
                }
                Ok(format!("{:x}", hasher.finalize()))
            }
        }
    }

    /// Compute the lowercase hex digest of a file's bytes.
    ///
    /// Only the content is hashed; timestamps and other metadata never
    /// influence the result.
    ///
    /// # Arguments
    /// * `path` - File to hash
    ///
    /// # Errors
    /// Returns `ModelError::IoError` if the file cannot be read.
    pub fn digest_file(&self, path: &Path) -> Result<String, ModelError> {
        let file: File =
            File::open(path).map_err(|e| ModelError::io_error(path.display().to_string(), e))?;
        self.digest_reader(BufReader::new(file))
            .map_err(|e| ModelError::io_error(path.display().to_string(), e))
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
