//! Resource requests and their conversion to backend units.

use serde::{Deserialize, Serialize};

/// Resources requested for every job of a batch.
///
/// Absent or non-positive values leave the backend default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRequest {
    /// Memory in megabytes.
    pub memory_mb: Option<f64>,
    /// Wall time ceiling in hours.
    pub max_runtime_hours: Option<f64>,
}

impl ResourceRequest {
    /// Request with no resource limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the memory request in megabytes.
    pub fn with_memory_mb(mut self, memory_mb: f64) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }

    /// Set the runtime ceiling in hours.
    pub fn with_max_runtime_hours(mut self, hours: f64) -> Self {
        self.max_runtime_hours = Some(hours);
        self
    }

    /// Memory rounded half-up to whole megabytes.
    ///
    /// # Returns
    /// `None` when no positive, finite memory was requested.
    pub fn memory_mb_rounded(&self) -> Option<u64> {
        self.memory_mb
            .filter(|mb| mb.is_finite() && *mb > 0.0)
            .map(|mb| (mb + 0.5).floor() as u64)
            .filter(|mb| *mb > 0)
    }

    /// Runtime ceiling in whole seconds, kept one second under the request.
    ///
    /// Computed as `floor(hours * 3600) - 1`.
    ///
    /// # Returns
    /// `None` when no positive, finite runtime was requested or the result
    /// would not be positive.
    pub fn runtime_ceiling_secs(&self) -> Option<u64> {
        let hours: f64 = self.max_runtime_hours.filter(|h| h.is_finite() && *h > 0.0)?;
        let secs: u64 = (hours * 3600.0).floor() as u64;
        secs.checked_sub(1).filter(|s| *s > 0)
    }

    /// Runtime ceiling in whole minutes, derived from [`Self::runtime_ceiling_secs`].
    pub fn runtime_ceiling_mins(&self) -> Option<u64> {
        self.runtime_ceiling_secs()
            .map(|secs| secs / 60)
            .filter(|mins| *mins > 0)
    }
}
