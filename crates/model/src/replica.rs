//! Replica planning.
//!
//! A replicated artifact `dir/name.abc.tgz` is stored as `dir/name.abc.0.tgz`,
//! `dir/name.abc.1.tgz`, ... and advertised to jobs with the retrieval
//! pattern `dir/name.abc.[^\.]+.tgz`. Job-side code picks any file matching
//! the pattern, so it never needs to know how many replicas exist.

use std::num::NonZeroU32;

use crate::error::ModelError;

/// Placeholder substituted for the replica index in retrieval patterns.
pub const REPLICA_INDEX_PATTERN: &str = r"[^\.]+";

/// Sentinel replica count requesting a single unreplicated copy.
pub const UNREPLICATED: i64 = -1;

/// Validated replica count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaCount {
    /// One copy stored at the canonical path.
    Unreplicated,
    /// N numbered copies, even when N is 1.
    Replicated(NonZeroU32),
}

impl ReplicaCount {
    /// Number of concrete locations this count produces.
    pub fn width(&self) -> usize {
        match self {
            ReplicaCount::Unreplicated => 1,
            ReplicaCount::Replicated(n) => n.get() as usize,
        }
    }

    /// True for the numbered-copies form.
    pub fn is_replicated(&self) -> bool {
        matches!(self, ReplicaCount::Replicated(_))
    }
}

impl TryFrom<i64> for ReplicaCount {
    type Error = ModelError;

    fn try_from(count: i64) -> Result<Self, Self::Error> {
        if count == 0 || count == UNREPLICATED {
            return Ok(ReplicaCount::Unreplicated);
        }
        u32::try_from(count)
            .ok()
            .and_then(NonZeroU32::new)
            .map(ReplicaCount::Replicated)
            .ok_or(ModelError::InvalidReplicaCount { count })
    }
}

/// Ordered storage locations of one artifact plus its retrieval pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSet {
    canonical_path: String,
    count: ReplicaCount,
    locations: Vec<String>,
    pattern: String,
}

impl ReplicaSet {
    /// Canonical (unreplicated) path the set was planned from.
    pub fn canonical_path(&self) -> &str {
        &self.canonical_path
    }

    /// Replica count fixed at planning time.
    pub fn count(&self) -> ReplicaCount {
        self.count
    }

    /// Concrete locations, in replica index order.
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// Number of concrete locations.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Always false; a planned set has at least one location.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Retrieval pattern. Equal to the canonical path when unreplicated.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Final path component of the retrieval pattern.
    pub fn pattern_basename(&self) -> &str {
        basename(&self.pattern)
    }

    /// Substitute `index` for the placeholder in the retrieval pattern.
    ///
    /// Unreplicated sets have no placeholder, so the pattern is returned as-is.
    pub fn location_for(&self, index: &str) -> String {
        self.pattern.replacen(REPLICA_INDEX_PATTERN, index, 1)
    }

    /// Check whether a concrete path matches the retrieval pattern.
    ///
    /// The placeholder matches one or more characters other than `.` and `/`.
    pub fn matches(&self, path: &str) -> bool {
        if !self.count.is_replicated() {
            return path == self.pattern;
        }
        let Some((prefix, suffix)) = self.pattern.split_once(REPLICA_INDEX_PATTERN) else {
            return false;
        };
        if path.len() <= prefix.len() + suffix.len() {
            return false;
        }
        match path
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
        {
            Some(index) => !index.is_empty() && !index.contains(['.', '/']),
            None => false,
        }
    }
}

/// Plans replica locations for canonical artifact paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicaPlanner;

impl ReplicaPlanner {
    /// Plan the storage locations of an artifact.
    ///
    /// # Arguments
    /// * `canonical_path` - Path of the artifact relative to the remote base
    /// * `replica_count` - Positive count, or `0` / [`UNREPLICATED`] for a single copy
    ///
    /// # Returns
    /// A `ReplicaSet` whose every location matches its retrieval pattern.
    ///
    /// # Errors
    /// - `ModelError::InvalidReplicaCount` for other negative counts
    /// - `ModelError::InvalidPath` if the path has no file name
    pub fn plan(canonical_path: &str, replica_count: i64) -> Result<ReplicaSet, ModelError> {
        let count: ReplicaCount = ReplicaCount::try_from(replica_count)?;
        Self::plan_count(canonical_path, count)
    }

    /// Plan with an already validated count.
    ///
    /// # Errors
    /// Returns `ModelError::InvalidPath` if the path has no file name.
    pub fn plan_count(canonical_path: &str, count: ReplicaCount) -> Result<ReplicaSet, ModelError> {
        if basename(canonical_path).is_empty() {
            return Err(ModelError::InvalidPath {
                path: canonical_path.to_string(),
            });
        }

        let (locations, pattern): (Vec<String>, String) = match count {
            ReplicaCount::Unreplicated => {
                (vec![canonical_path.to_string()], canonical_path.to_string())
            }
            ReplicaCount::Replicated(n) => (
                (0..n.get())
                    .map(|i| replicated_path(canonical_path, &i.to_string()))
                    .collect(),
                replicated_path(canonical_path, REPLICA_INDEX_PATTERN),
            ),
        };

        Ok(ReplicaSet {
            canonical_path: canonical_path.to_string(),
            count,
            locations,
            pattern,
        })
    }
}

/// Insert a replica token before the final extension of a path's basename.
///
/// `dir/name.abc.tgz` with token `3` becomes `dir/name.abc.3.tgz`.
/// Basenames without an extension get the token appended.
pub fn replicated_path(path: &str, token: &str) -> String {
    let split: usize = path.rfind('/').map(|p| p + 1).unwrap_or(0);
    let (dir, base): (&str, &str) = path.split_at(split);
    match base.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}.{}{}", dir, &base[..dot], token, &base[dot..]),
        _ => format!("{}.{}", path, token),
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
