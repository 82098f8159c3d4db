//! Exclusion rules applied while walking a source tree.

use crate::error::FileSystemError;

/// Entries whose `/`-prefixed relative path ends with one of these suffixes
/// are never archived: compiled Python caches, version control metadata,
/// and pre-existing archives.
pub const DEFAULT_DENYLIST: &[&str] = &[".pyc", "/.git", ".tgz", "__pycache__"];

/// Path-based include/exclude predicate for archive entries.
///
/// Rules are evaluated against paths relative to the source root with `/`
/// separators. An excluded directory is pruned together with its contents.
#[derive(Debug, Clone)]
pub struct ExcludeRules {
    denylist: Vec<String>,
    patterns: Vec<glob::Pattern>,
}

impl Default for ExcludeRules {
    fn default() -> Self {
        Self::denylist_only()
    }
}

impl ExcludeRules {
    /// Create rules from glob patterns on top of the fixed denylist.
    ///
    /// # Arguments
    /// * `patterns` - Glob patterns matched against root-relative paths (e.g. `data`, `**/*.log`)
    ///
    /// # Errors
    /// Returns `FileSystemError::InvalidGlobPattern` if any pattern is invalid.
    pub fn new(patterns: &[String]) -> Result<Self, FileSystemError> {
        let compiled: Vec<glob::Pattern> = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| FileSystemError::InvalidGlobPattern {
                    pattern: p.clone(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            patterns: compiled,
        })
    }

    /// Only the fixed denylist.
    pub fn denylist_only() -> Self {
        Self {
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            patterns: Vec::new(),
        }
    }

    /// No rules at all; every entry is archived.
    pub fn none() -> Self {
        Self {
            denylist: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// Glob patterns in addition to the denylist.
    pub fn patterns(&self) -> Vec<String> {
        self.patterns.iter().map(|p| p.as_str().to_string()).collect()
    }

    /// Check if an entry should be left out of the archive.
    ///
    /// # Arguments
    /// * `relative` - Root-relative path with `/` separators, without a leading slash
    ///
    /// # Returns
    /// True if the entry matches the denylist or any glob pattern.
    pub fn is_excluded(&self, relative: &str) -> bool {
        let rooted: String = format!("/{}", relative);
        if self.denylist.iter().any(|suffix| rooted.ends_with(suffix.as_str())) {
            return true;
        }

        let options: glob::MatchOptions = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(relative, options))
    }
}
