//! Backend submission profiles.
//!
//! Each batch system gets one `BackendProfile` implementation. The renderer
//! only talks to the trait, so adding a backend means adding a variant to
//! [`BackendKind`] and one implementation here.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::environment::EnvVar;
use crate::error::JobsError;
use crate::job_config::{Directive, JobInputFile};
use crate::resources::ResourceRequest;
use crate::settings::{CrabSettings, HtcondorSettings};

/// Supported batch backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// HTCondor pools.
    Htcondor,
    /// CMS Crab.
    Crab,
}

impl BackendKind {
    /// Lowercase backend name, as used in settings and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Htcondor => "htcondor",
            BackendKind::Crab => "crab",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = JobsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "htcondor" | "condor" => Ok(BackendKind::Htcondor),
            "crab" => Ok(BackendKind::Crab),
            _ => Err(JobsError::UnknownBackend {
                name: s.to_string(),
            }),
        }
    }
}

/// Render variable name and the environment value it passes through.
pub type Passthrough = (&'static str, EnvVar);

/// Backend-specific rules for building a job configuration.
pub trait BackendProfile: Send + Sync {
    /// Backend this profile renders for.
    fn kind(&self) -> BackendKind;

    /// Resource limits in the backend's native units.
    ///
    /// Requests that are absent or not positive produce no directive.
    fn resource_directives(&self, request: &ResourceRequest) -> Vec<Directive>;

    /// Fixed backend directives added to every batch.
    fn custom_directives(&self) -> Vec<Directive>;

    /// Script run before the payload; one rendered copy shared by the batch.
    fn bootstrap_reference(&self) -> JobInputFile;

    /// Environment values exposed to jobs as render variables.
    fn passthrough_variables(&self) -> &'static [Passthrough];

    /// Additional files shipped with every job, by name.
    fn input_files(&self) -> Vec<(String, JobInputFile)> {
        Vec::new()
    }
}

fn bootstrap_file(path: &Path) -> JobInputFile {
    JobInputFile::new(path)
        .with_copy(false)
        .with_share(true)
        .with_render(true)
}

/// HTCondor submit-file profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtcondorProfile {
    bootstrap: PathBuf,
    settings: HtcondorSettings,
}

impl HtcondorProfile {
    const PASSTHROUGH: &'static [Passthrough] = &[
        ("lcg_dir", EnvVar::LcgDir),
        ("x509_user_proxy", EnvVar::GridIdentity),
    ];

    /// Create a profile using `bootstrap` as the shared bootstrap script.
    pub fn new(bootstrap: impl Into<PathBuf>, settings: HtcondorSettings) -> Self {
        Self {
            bootstrap: bootstrap.into(),
            settings,
        }
    }
}

impl BackendProfile for HtcondorProfile {
    fn kind(&self) -> BackendKind {
        BackendKind::Htcondor
    }

    fn resource_directives(&self, request: &ResourceRequest) -> Vec<Directive> {
        let mut directives: Vec<Directive> = Vec::new();
        if let Some(mb) = request.memory_mb_rounded() {
            directives.push(Directive::new("request_memory", mb));
        }
        if let Some(secs) = request.runtime_ceiling_secs() {
            directives.push(Directive::new("+MaxRuntime", secs));
        }
        directives
    }

    fn custom_directives(&self) -> Vec<Directive> {
        vec![
            Directive::new(
                "requirements",
                format!("(OpSysAndVer =?= \"{}\")", self.settings.operating_system),
            ),
            Directive::new("log", "/dev/null"),
            Directive::new("getenv", "true"),
        ]
    }

    fn bootstrap_reference(&self) -> JobInputFile {
        bootstrap_file(&self.bootstrap)
    }

    fn passthrough_variables(&self) -> &'static [Passthrough] {
        Self::PASSTHROUGH
    }
}

/// Crab configuration profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrabProfile {
    bootstrap: PathBuf,
    settings: CrabSettings,
}

impl CrabProfile {
    const PASSTHROUGH: &'static [Passthrough] = &[("lcg_dir", EnvVar::LcgDir)];

    /// Create a profile using `bootstrap` as the shared bootstrap script.
    pub fn new(bootstrap: impl Into<PathBuf>, settings: CrabSettings) -> Self {
        Self {
            bootstrap: bootstrap.into(),
            settings,
        }
    }
}

impl BackendProfile for CrabProfile {
    fn kind(&self) -> BackendKind {
        BackendKind::Crab
    }

    fn resource_directives(&self, request: &ResourceRequest) -> Vec<Directive> {
        let mut directives: Vec<Directive> = Vec::new();
        if let Some(mb) = request.memory_mb_rounded() {
            directives.push(Directive::new("JobType.maxMemoryMB", mb));
        }
        if let Some(mins) = request.runtime_ceiling_mins() {
            directives.push(Directive::new("JobType.maxJobRuntimeMin", mins));
        }
        directives
    }

    fn custom_directives(&self) -> Vec<Directive> {
        // Crab configs are Python, hence the capitalised booleans.
        let transfer_logs: &str = if self.settings.transfer_logs {
            "True"
        } else {
            "False"
        };
        vec![
            Directive::new("Site.storageSite", &self.settings.storage_site),
            Directive::new("Data.outLFNDirBase", &self.settings.output_lfn_base),
            Directive::new("General.transferLogs", transfer_logs),
        ]
    }

    fn bootstrap_reference(&self) -> JobInputFile {
        bootstrap_file(&self.bootstrap)
    }

    fn passthrough_variables(&self) -> &'static [Passthrough] {
        Self::PASSTHROUGH
    }

    fn input_files(&self) -> Vec<(String, JobInputFile)> {
        vec![(
            "wlcg_tools".to_string(),
            JobInputFile::new(self.settings.wlcg_tools_file.clone())
                .with_share(true)
                .with_render(false),
        )]
    }
}
