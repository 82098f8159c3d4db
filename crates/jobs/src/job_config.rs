//! Backend-agnostic job submission configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::JobsError;
use crate::profile::BackendKind;
use crate::resources::ResourceRequest;

/// A file shipped with every job of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInputFile {
    /// Local path of the file.
    pub path: PathBuf,
    /// Copy the file into the submission directory.
    pub copy: bool,
    /// Send one instance for the whole batch instead of one per job.
    pub share: bool,
    /// Substitute render variables into the file before sending it.
    pub render: bool,
}

impl JobInputFile {
    /// Input file that is copied, per job, and rendered.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            copy: true,
            share: false,
            render: true,
        }
    }

    /// Set whether the file is copied into the submission directory.
    pub fn with_copy(mut self, copy: bool) -> Self {
        self.copy = copy;
        self
    }

    /// Set whether one instance is shared by the whole batch.
    pub fn with_share(mut self, share: bool) -> Self {
        self.share = share;
        self
    }

    /// Set whether render variables are substituted into the file.
    pub fn with_render(mut self, render: bool) -> Self {
        self.render = render;
        self
    }
}

/// A backend-native `key = value` setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    /// Backend key, e.g. `request_memory` or `JobType.maxMemoryMB`.
    pub key: String,
    /// Value in the backend's syntax.
    pub value: String,
}

impl Directive {
    /// Create a directive, formatting `value` with `ToString`.
    pub fn new(key: impl Into<String>, value: impl ToString) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// Submission configuration for one batch of jobs.
///
/// Built up by successive contributors (framework defaults, workflow code,
/// then a backend profile) and handed to the backend adapter when complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Backend the configuration was rendered for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
    /// Requested resources, translated into directives when rendered.
    pub resources: ResourceRequest,
    /// Files shipped with each job, by name.
    pub input_files: BTreeMap<String, JobInputFile>,
    /// Values substituted into rendered input files.
    pub render_variables: BTreeMap<String, String>,
    /// Backend directives in emission order.
    pub directives: Vec<Directive>,
}

impl JobConfig {
    /// Empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resource request.
    pub fn with_resources(mut self, resources: ResourceRequest) -> Self {
        self.resources = resources;
        self
    }

    /// Add or replace an input file.
    pub fn add_input_file(&mut self, name: impl Into<String>, file: JobInputFile) {
        self.input_files.insert(name.into(), file);
    }

    /// Add or replace a render variable.
    pub fn set_render_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.render_variables.insert(name.into(), value.into());
    }

    /// Append a directive.
    pub fn push_directive(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    /// Value of the last directive with `key`.
    pub fn directive(&self, key: &str) -> Option<&str> {
        self.directives
            .iter()
            .rev()
            .find(|d| d.key == key)
            .map(|d| d.value.as_str())
    }

    /// Parse a base configuration written by workflow code.
    ///
    /// Missing fields take their empty defaults.
    ///
    /// # Errors
    /// Returns `JobsError::Json` if the input is not a valid configuration.
    pub fn from_json(json: &str) -> Result<Self, JobsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to JSON for the backend adapter.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON for debugging.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
