//! Replica distribution.
//!
//! Uploads one local archive to every location of a `ReplicaSet`. Each
//! upload is verified against the archive size and retried with backoff on
//! transient failures. The run either reports every replica as written or
//! fails with the list of replicas that did succeed.

use std::path::Path;

use futures::stream::{self, StreamExt};
use rusty_bundles_model::ReplicaSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::traits::Transport;
use crate::types::{
    DistributeOptions, DistributionResult, FailedUpload, RemoteLocation, UploadOutcome,
};

/// Uploads archives to all planned replica locations.
pub struct Distributor<'a, T: Transport> {
    transport: &'a T,
    location: RemoteLocation,
    options: DistributeOptions,
    cancel: CancellationToken,
}

impl<'a, T: Transport> Distributor<'a, T> {
    /// Create a new distributor with default options.
    ///
    /// # Arguments
    /// * `transport` - Remote storage transport
    /// * `location` - Base URI that replica paths are joined onto
    pub fn new(transport: &'a T, location: RemoteLocation) -> Self {
        Self {
            transport,
            location,
            options: DistributeOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the distribution options.
    pub fn with_options(mut self, options: DistributeOptions) -> Self {
        self.options = options;
        self
    }

    /// Abandon in-flight uploads when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Remote location in use.
    pub fn location(&self) -> &RemoteLocation {
        &self.location
    }

    /// Concrete URIs of every replica, in replica order.
    pub fn uris_for(&self, replicas: &ReplicaSet) -> Vec<String> {
        replicas
            .locations()
            .iter()
            .map(|path| self.location.uri_for(path))
            .collect()
    }

    /// Upload an archive to every location in the replica set.
    ///
    /// Uploads run concurrently up to `options.concurrency`. Results are
    /// aggregated by the single consuming stream, so no state is shared
    /// between uploads.
    ///
    /// # Arguments
    /// * `local_archive` - Archive to upload; only read
    /// * `replicas` - Planned replica locations
    ///
    /// # Returns
    /// The URIs written (or already present) and the archive size.
    ///
    /// # Errors
    /// - `StorageError::PartialDistributionFailure` if any replica failed after retries
    /// - `StorageError::Cancelled` if the cancellation token fired
    /// - `StorageError::IoError` if the local archive cannot be read
    pub async fn distribute(
        &self,
        local_archive: &Path,
        replicas: &ReplicaSet,
    ) -> Result<DistributionResult, StorageError> {
        if self.cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        let total_bytes: u64 = tokio::fs::metadata(local_archive)
            .await
            .map_err(|e| StorageError::IoError {
                path: local_archive.display().to_string(),
                source: e,
            })?
            .len();

        let uris: Vec<String> = self.uris_for(replicas);
        let concurrency: usize = self.options.concurrency.max(1);
        debug!(
            replicas = uris.len(),
            concurrency,
            bytes = total_bytes,
            "distributing archive"
        );

        let uploads = stream::iter(uris.iter().enumerate())
            .map(|(index, uri)| async move {
                let outcome: Result<UploadOutcome, FailedUpload> =
                    self.upload_replica(local_archive, total_bytes, uri).await;
                (index, outcome)
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>();

        let mut results: Vec<(usize, Result<UploadOutcome, FailedUpload>)> = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!(replicas = uris.len(), "distribution cancelled, abandoning uploads");
                return Err(StorageError::Cancelled);
            }
            results = uploads => results,
        };
        results.sort_by_key(|(index, _)| *index);

        let mut succeeded: Vec<String> = Vec::new();
        let mut failed: Vec<FailedUpload> = Vec::new();
        let mut uploaded: usize = 0;
        let mut skipped: usize = 0;

        for (index, outcome) in results {
            match outcome {
                Ok(UploadOutcome::Uploaded { attempts }) => {
                    if attempts > 1 {
                        debug!(uri = %uris[index], attempts, "replica needed retries");
                    }
                    uploaded += 1;
                    succeeded.push(uris[index].clone());
                }
                Ok(UploadOutcome::Skipped) => {
                    skipped += 1;
                    succeeded.push(uris[index].clone());
                }
                Err(failure) => failed.push(failure),
            }
        }

        if !failed.is_empty() {
            warn!(
                succeeded = succeeded.len(),
                failed = failed.len(),
                "replica distribution incomplete"
            );
            return Err(StorageError::PartialDistributionFailure { succeeded, failed });
        }

        info!(
            replicas = succeeded.len(),
            uploaded,
            skipped,
            bytes = total_bytes,
            "distributed archive"
        );

        Ok(DistributionResult {
            uris: succeeded,
            total_bytes,
            uploaded,
            skipped,
        })
    }

    /// Upload one replica with retries.
    async fn upload_replica(
        &self,
        local_archive: &Path,
        expected: u64,
        uri: &str,
    ) -> Result<UploadOutcome, FailedUpload> {
        if self.options.skip_existing {
            match self.existing_size(uri).await {
                Ok(Some(size)) if size == expected => {
                    debug!(uri, "replica already present, skipping upload");
                    return Ok(UploadOutcome::Skipped);
                }
                Ok(_) => {}
                Err(e) => debug!(uri, error = %e, "existence check failed, uploading"),
            }
        }

        let max_attempts: u32 = self.options.retry.attempts();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result: Result<(), StorageError> =
                match self.transport.upload(local_archive, uri).await {
                    Ok(()) => self.verify(uri, expected).await,
                    Err(e) => Err(StorageError::Transport(e)),
                };

            let error: StorageError = match result {
                Ok(()) => {
                    debug!(uri, attempt, "replica uploaded");
                    return Ok(UploadOutcome::Uploaded { attempts: attempt });
                }
                Err(e) => e,
            };

            if !is_retryable(&error) || attempt >= max_attempts {
                warn!(uri, attempt, error = %error, "replica upload failed");
                return Err(FailedUpload {
                    uri: uri.to_string(),
                    reason: error.to_string(),
                    attempts: attempt,
                });
            }

            let delay = self.options.retry.delay_after(attempt);
            warn!(uri, attempt, ?delay, error = %error, "replica upload failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }

    /// Check that a written replica exists with the expected size.
    async fn verify(&self, uri: &str, expected: u64) -> Result<(), StorageError> {
        let actual: Option<u64> = self.existing_size(uri).await?;
        if actual == Some(expected) {
            Ok(())
        } else {
            Err(StorageError::VerificationFailed {
                uri: uri.to_string(),
                expected,
                actual,
            })
        }
    }

    async fn existing_size(&self, uri: &str) -> Result<Option<u64>, StorageError> {
        if !self.transport.exists(uri).await? {
            return Ok(None);
        }
        Ok(Some(self.transport.size_of(uri).await?))
    }
}

fn is_retryable(error: &StorageError) -> bool {
    match error {
        StorageError::Transport(e) => e.is_retryable(),
        StorageError::VerificationFailed { .. } => true,
        _ => false,
    }
}
