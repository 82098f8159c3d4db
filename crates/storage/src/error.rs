//! Error types for storage operations.

use thiserror::Error;

use crate::types::FailedUpload;

/// Errors reported by a transport for a single remote operation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Remote object does not exist.
    #[error("Not found: {uri}")]
    NotFound {
        /// The remote URI.
        uri: String,
    },

    /// Access was refused.
    #[error("Permission denied: {uri}")]
    PermissionDenied {
        /// The remote URI.
        uri: String,
    },

    /// The URI scheme is not handled by this transport.
    #[error("Unsupported URI: {uri}")]
    UnsupportedUri {
        /// The remote URI.
        uri: String,
    },

    /// Transient IO or network failure.
    #[error("IO error for {uri}: {message}")]
    Io {
        /// The remote URI.
        uri: String,
        /// Error message.
        message: String,
    },

    /// Any other failure.
    #[error("Transfer failed for {uri}: {message}")]
    Other {
        /// The remote URI.
        uri: String,
        /// Error message.
        message: String,
        /// Whether repeating the operation may succeed.
        retryable: bool,
    },
}

impl TransportError {
    /// Whether repeating the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Io { .. } => true,
            TransportError::Other { retryable, .. } => *retryable,
            TransportError::NotFound { .. }
            | TransportError::PermissionDenied { .. }
            | TransportError::UnsupportedUri { .. } => false,
        }
    }
}

/// Errors that can occur while distributing an archive.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Some replica uploads failed after exhausting their retries.
    #[error("Partial distribution failure: {}", summarize_partial(.succeeded, .failed))]
    PartialDistributionFailure {
        /// URIs written successfully, in replica order.
        succeeded: Vec<String>,
        /// URIs that could not be written.
        failed: Vec<FailedUpload>,
    },

    /// Uploaded object does not match the local archive.
    #[error("Verification failed for {uri}: expected {expected} bytes, found {actual:?}")]
    VerificationFailed {
        /// The remote URI.
        uri: String,
        /// Local archive size.
        expected: u64,
        /// Remote size, if the object exists.
        actual: Option<u64>,
    },

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Local IO error.
    #[error("IO error at {path}: {source}")]
    IoError {
        /// Local path.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Transport error outside of a retried upload.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Format a partial distribution failure for display.
///
/// # Arguments
/// * `succeeded` - URIs written successfully
/// * `failed` - Uploads that could not be completed
fn summarize_partial(succeeded: &[String], failed: &[FailedUpload]) -> String {
    let failures: String = failed
        .iter()
        .map(|f| format!("{} ({})", f.uri, f.reason))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} of {} replicas uploaded; failed: {}",
        succeeded.len(),
        succeeded.len() + failed.len(),
        failures
    )
}
