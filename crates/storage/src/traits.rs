//! Transport interface for remote storage.

use std::path::Path;

use async_trait::async_trait;

use crate::error::TransportError;

/// Remote blob operations - implemented by each storage backend.
///
/// Authentication and protocol details belong to the implementation; the
/// distributor only needs these three operations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Upload a local file to a remote URI, replacing any existing object.
    async fn upload(&self, local_path: &Path, remote_uri: &str) -> Result<(), TransportError>;

    /// Check if a remote object exists.
    async fn exists(&self, remote_uri: &str) -> Result<bool, TransportError>;

    /// Size of a remote object in bytes.
    ///
    /// Returns `TransportError::NotFound` if the object doesn't exist.
    async fn size_of(&self, remote_uri: &str) -> Result<u64, TransportError>;
}
