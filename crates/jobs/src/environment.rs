//! Environment values consumed by bundling and rendering.
//!
//! The values are captured once into a `WorkflowEnvironment` and passed
//! around explicitly, so nothing below reads process state directly.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::JobsError;

/// Named environment inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnvVar {
    /// Repository root (`ANALYSIS_PATH`).
    AnalysisPath,
    /// Software root (`SOFTWARE_PATH`).
    SoftwarePath,
    /// Grid proxy certificate used as the batch identity (`X509_USER_PROXY`).
    GridIdentity,
    /// Shared library root (`LCG_DIR`).
    LcgDir,
}

impl EnvVar {
    /// Every known variable.
    pub const ALL: [EnvVar; 4] = [
        EnvVar::AnalysisPath,
        EnvVar::SoftwarePath,
        EnvVar::GridIdentity,
        EnvVar::LcgDir,
    ];

    /// Process environment name.
    pub fn name(&self) -> &'static str {
        match self {
            EnvVar::AnalysisPath => "ANALYSIS_PATH",
            EnvVar::SoftwarePath => "SOFTWARE_PATH",
            EnvVar::GridIdentity => "X509_USER_PROXY",
            EnvVar::LcgDir => "LCG_DIR",
        }
    }
}

impl fmt::Display for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of the environment values a workflow depends on.
///
/// Values are optional here; they become mandatory only where used, via
/// [`WorkflowEnvironment::require`]. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowEnvironment {
    values: BTreeMap<EnvVar, String>,
}

impl WorkflowEnvironment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the known variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Capture the known variables through a lookup function.
    ///
    /// # Arguments
    /// * `lookup` - Returns the value for a process environment name
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let values: BTreeMap<EnvVar, String> = EnvVar::ALL
            .iter()
            .filter_map(|var| {
                lookup(var.name())
                    .filter(|v| !v.is_empty())
                    .map(|v| (*var, v))
            })
            .collect();
        Self { values }
    }

    /// Set a value.
    pub fn with(mut self, var: EnvVar, value: impl Into<String>) -> Self {
        let value: String = value.into();
        if value.is_empty() {
            self.values.remove(&var);
        } else {
            self.values.insert(var, value);
        }
        self
    }

    /// Value of a variable, if present.
    pub fn get(&self, var: EnvVar) -> Option<&str> {
        self.values.get(&var).map(String::as_str)
    }

    /// Value of a variable that must be present.
    ///
    /// # Errors
    /// Returns `JobsError::MissingEnvironment` if the variable is absent.
    pub fn require(&self, var: EnvVar) -> Result<&str, JobsError> {
        self.get(var).ok_or_else(|| JobsError::MissingEnvironment {
            variable: var.name().to_string(),
        })
    }
}
