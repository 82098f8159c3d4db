//! Workflow bundling settings.
//!
//! Settings are plain serde structs with defaults for every field, so a
//! settings file only needs to name what differs.

use std::path::{Path, PathBuf};

use rusty_bundles_storage::{
    DistributeOptions, RemoteLocation, RetrySettings, DEFAULT_UPLOAD_CONCURRENCY,
};
use serde::{Deserialize, Serialize};

use crate::error::JobsError;

/// Default number of replicas per artifact.
pub const DEFAULT_REPLICAS: i64 = 5;

/// Per-artifact overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Replica count; `0` or `-1` for a single unreplicated copy.
    pub replicas: i64,
    /// Remote directory, relative to the base URI.
    pub remote_dir: Option<String>,
    /// Extra exclude globs, added to the artifact's defaults.
    pub exclude: Vec<String>,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            replicas: DEFAULT_REPLICAS,
            remote_dir: None,
            exclude: Vec::new(),
        }
    }
}

/// HTCondor profile settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtcondorSettings {
    /// Value matched against the `OpSysAndVer` machine attribute.
    pub operating_system: String,
}

impl Default for HtcondorSettings {
    fn default() -> Self {
        Self {
            operating_system: "CentOS7".into(),
        }
    }
}

/// Crab profile settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrabSettings {
    /// Site that receives job outputs.
    pub storage_site: String,
    /// Base LFN directory for outputs.
    pub output_lfn_base: String,
    /// Transfer job logs to the storage site.
    pub transfer_logs: bool,
    /// WLCG helper script shipped with every job.
    pub wlcg_tools_file: PathBuf,
}

impl Default for CrabSettings {
    fn default() -> Self {
        Self {
            storage_site: "T2_DE_DESY".into(),
            output_lfn_base: "/store/user/law_crab_outputs".into(),
            transfer_logs: false,
            wlcg_tools_file: PathBuf::from("law_wlcg_tools.sh"),
        }
    }
}

/// Settings for bundling workflow artifacts and rendering job configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleSettings {
    /// Base URI that artifact paths are stored under.
    pub remote_base_uri: String,
    /// Repository bundle settings.
    pub repository: ArtifactSettings,
    /// Software bundle settings.
    pub software: ArtifactSettings,
    /// Maximum concurrent replica uploads.
    pub upload_concurrency: usize,
    /// Retry policy per replica upload.
    pub retry: RetrySettings,
    /// Bootstrap script run before the job payload.
    pub bootstrap_file: PathBuf,
    /// HTCondor profile settings.
    pub htcondor: HtcondorSettings,
    /// Crab profile settings.
    pub crab: CrabSettings,
}

impl Default for BundleSettings {
    fn default() -> Self {
        Self {
            remote_base_uri: String::new(),
            repository: ArtifactSettings::default(),
            software: ArtifactSettings::default(),
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            retry: RetrySettings::default(),
            bootstrap_file: PathBuf::from("bootstrap.sh"),
            htcondor: HtcondorSettings::default(),
            crab: CrabSettings::default(),
        }
    }
}

impl BundleSettings {
    /// Load settings from a JSON file.
    ///
    /// # Errors
    /// Returns `JobsError::Settings` if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self, JobsError> {
        let display: String = path.display().to_string();
        let content: String = std::fs::read_to_string(path)
            .map_err(|e| JobsError::settings(display.clone(), e.to_string()))?;
        Self::parse(&content, &display)
    }

    /// Parse settings from a JSON string.
    ///
    /// # Errors
    /// Returns `JobsError::Settings` if the JSON is invalid.
    pub fn from_json_str(json: &str) -> Result<Self, JobsError> {
        Self::parse(json, "<string>")
    }

    fn parse(json: &str, source: &str) -> Result<Self, JobsError> {
        serde_json::from_str(json).map_err(|e| JobsError::settings(source, e.to_string()))
    }

    /// Remote location of the bundles.
    ///
    /// # Errors
    /// Returns `JobsError::Settings` if no base URI is configured.
    pub fn remote_location(&self) -> Result<RemoteLocation, JobsError> {
        if self.remote_base_uri.trim().is_empty() {
            return Err(JobsError::settings(
                "remote_base_uri",
                "no remote base URI configured",
            ));
        }
        Ok(RemoteLocation::new(self.remote_base_uri.clone()))
    }

    /// Distribution options for replica uploads.
    pub fn distribute_options(&self) -> DistributeOptions {
        DistributeOptions {
            concurrency: self.upload_concurrency,
            retry: self.retry.clone(),
            ..DistributeOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings: BundleSettings = BundleSettings::from_json_str("{}").unwrap();
        assert_eq!(settings.repository.replicas, 5);
        assert_eq!(settings.software.replicas, 5);
        assert_eq!(settings.upload_concurrency, 5);
        assert_eq!(settings.htcondor.operating_system, "CentOS7");
        assert!(!settings.crab.transfer_logs);
    }

    #[test]
    fn test_partial_override() {
        let settings: BundleSettings = BundleSettings::from_json_str(
            r#"{
                "remote_base_uri": "file:///eos/store",
                "repository": {"replicas": 2, "exclude": ["data"]},
                "retry": {"max_attempts": 1},
                "crab": {"transfer_logs": true}
            }"#,
        )
        .unwrap();

        assert_eq!(settings.repository.replicas, 2);
        assert_eq!(settings.repository.exclude, vec!["data".to_string()]);
        assert_eq!(settings.repository.remote_dir, None);
        assert_eq!(settings.retry.max_attempts, 1);
        assert_eq!(settings.retry.base_delay_ms, 1000);
        assert!(settings.crab.transfer_logs);
        assert_eq!(settings.crab.storage_site, "T2_DE_DESY");
        assert_eq!(
            settings.remote_location().unwrap().uri_for("a.tgz"),
            "file:///eos/store/a.tgz"
        );
    }

    #[test]
    fn test_missing_remote_base() {
        let settings: BundleSettings = BundleSettings::default();
        assert!(matches!(
            settings.remote_location(),
            Err(JobsError::Settings { .. })
        ));
    }

    #[test]
    fn test_from_json_file() {
        let dir: TempDir = TempDir::new().unwrap();
        let path: PathBuf = dir.path().join("bundles.json");
        std::fs::write(&path, r#"{"upload_concurrency": 2}"#).unwrap();

        let settings: BundleSettings = BundleSettings::from_json_file(&path).unwrap();
        assert_eq!(settings.distribute_options().concurrency, 2);

        std::fs::write(&path, "{ not json").unwrap();
        let err: JobsError = BundleSettings::from_json_file(&path).unwrap_err();
        match err {
            JobsError::Settings { path: source, .. } => assert!(source.ends_with("bundles.json")),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(BundleSettings::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
