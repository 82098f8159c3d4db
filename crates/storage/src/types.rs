//! Storage configuration and result types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of concurrent replica uploads.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 5;

/// Base URI under which artifact paths are stored.
///
/// Artifact paths are relative (e.g. `BundleRepo/analysis.abc.0.tgz`) and are
/// joined onto the base with a single `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLocation {
    /// Base URI, e.g. `root://eosuser.cern.ch//eos/user/j/jdoe/store`.
    pub base_uri: String,
}

impl RemoteLocation {
    /// Create a new remote location.
    ///
    /// # Arguments
    /// * `base_uri` - Base URI; a trailing `/` is ignored
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
        }
    }

    /// Full URI of a relative artifact path.
    ///
    /// # Arguments
    /// * `path` - Path relative to the base
    ///
    /// # Returns
    /// `{base_uri}/{path}`
    pub fn uri_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_uri.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Retry policy for individual replica uploads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per upload, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff multiplier applied per further retry.
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            multiplier: 2.0,
        }
    }
}

impl RetrySettings {
    /// No retries; each upload is attempted once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Attempts per upload, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after a failed attempt.
    ///
    /// Exponential backoff: `base_delay * multiplier^(attempt - 1)`.
    ///
    /// # Arguments
    /// * `attempt` - Number of the attempt that just failed (1-indexed)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent: i32 = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis: f64 = self.base_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_secs_f64((millis / 1000.0).min(u32::MAX as f64))
    }
}

/// Options for a distribution run.
#[derive(Debug, Clone)]
pub struct DistributeOptions {
    /// Maximum concurrent uploads.
    pub concurrency: usize,
    /// Retry policy per upload.
    pub retry: RetrySettings,
    /// Skip replicas that already exist remotely with the archive's size.
    /// Only sensible for content-addressed artifacts.
    pub skip_existing: bool,
}

impl Default for DistributeOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            retry: RetrySettings::default(),
            skip_existing: false,
        }
    }
}

/// A replica that could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    /// The remote URI.
    pub uri: String,
    /// Last error seen.
    pub reason: String,
    /// Attempts made.
    pub attempts: u32,
}

/// Result of a successful distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionResult {
    /// Every replica URI, in replica order.
    pub uris: Vec<String>,
    /// Size of the archive in bytes.
    pub total_bytes: u64,
    /// Replicas written during this run.
    pub uploaded: usize,
    /// Replicas already present and left untouched.
    pub skipped: usize,
}

/// Outcome of one replica upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UploadOutcome {
    Uploaded { attempts: u32 },
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_for() {
        let location: RemoteLocation = RemoteLocation::new("file:///data/store/");
        assert_eq!(
            location.uri_for("BundleRepo/repo.abc.0.tgz"),
            "file:///data/store/BundleRepo/repo.abc.0.tgz"
        );
        assert_eq!(
            location.uri_for("/software.tgz"),
            "file:///data/store/software.tgz"
        );
    }

    #[test]
    fn test_retry_backoff() {
        let retry: RetrySettings = RetrySettings {
            max_attempts: 4,
            base_delay_ms: 500,
            multiplier: 2.0,
        };
        assert_eq!(retry.delay_after(1), Duration::from_millis(500));
        assert_eq!(retry.delay_after(2), Duration::from_millis(1000));
        assert_eq!(retry.delay_after(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_attempts_never_zero() {
        let retry: RetrySettings = RetrySettings {
            max_attempts: 0,
            ..RetrySettings::default()
        };
        assert_eq!(retry.attempts(), 1);
        assert_eq!(RetrySettings::no_retry().attempts(), 1);
    }

    #[test]
    fn test_retry_settings_deserialize_defaults() {
        let retry: RetrySettings = serde_json::from_str(r#"{"max_attempts": 7}"#).unwrap();
        assert_eq!(retry.max_attempts, 7);
        assert_eq!(retry.base_delay_ms, 1000);
    }
}
