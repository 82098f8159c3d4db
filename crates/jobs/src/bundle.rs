//! Bundle orchestration: archive, name, plan and distribute one artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusty_bundles_filesystem::{human_bytes, Archiver, ExcludeRules, LocalArchive};
use rusty_bundles_model::{
    validate_logical_name, Artifact, ModelError, NamingStrategy, ReplicaCount, ReplicaPlanner,
    ReplicaSet,
};
use rusty_bundles_storage::{
    DistributeOptions, DistributionResult, Distributor, RemoteLocation, StorageError, Transport,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::environment::{EnvVar, WorkflowEnvironment};
use crate::error::JobsError;
use crate::settings::{ArtifactSettings, BundleSettings, DEFAULT_REPLICAS};

/// Remote directory of repository bundles.
pub const REPOSITORY_REMOTE_DIR: &str = "BundleRepo";

/// Remote directory of software bundles.
pub const SOFTWARE_REMOTE_DIR: &str = "BundleSoftware";

/// Paths excluded from repository bundles on top of the fixed denylist.
pub const REPOSITORY_EXCLUDES: &[&str] = &["data", ".law"];

/// What to bundle and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// Logical artifact name, used in the canonical filename.
    pub name: String,
    /// Prefix of the render variables advertising this artifact.
    pub variable: String,
    /// Directory to archive.
    pub source: PathBuf,
    /// How the canonical filename is derived.
    pub naming: NamingStrategy,
    /// Remote directory, relative to the base URI.
    pub remote_dir: String,
    /// Replica count; `0` or `-1` for a single unreplicated copy.
    pub replicas: i64,
    /// Exclude globs on top of the fixed denylist.
    pub exclude: Vec<String>,
}

impl ArtifactSpec {
    /// Content-addressed bundle of a repository checkout.
    ///
    /// Named after the repository directory, e.g. `analysis.{checksum}.tgz`.
    ///
    /// # Errors
    /// Returns `JobsError::Model` if the path has no usable directory name.
    pub fn repository(repo_path: impl Into<PathBuf>) -> Result<Self, JobsError> {
        let source: PathBuf = repo_path.into();
        let name: String = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| ModelError::InvalidName {
                name: source.display().to_string(),
            })?;
        validate_logical_name(&name)?;

        Ok(Self {
            name,
            variable: "repo".into(),
            source,
            naming: NamingStrategy::ContentAddressed,
            remote_dir: REPOSITORY_REMOTE_DIR.into(),
            replicas: DEFAULT_REPLICAS,
            exclude: REPOSITORY_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Fixed-name `software.tgz` bundle, replaced on every run.
    pub fn software(software_path: impl Into<PathBuf>) -> Self {
        Self {
            name: "software".into(),
            variable: "software".into(),
            source: software_path.into(),
            naming: NamingStrategy::Fixed,
            remote_dir: SOFTWARE_REMOTE_DIR.into(),
            replicas: DEFAULT_REPLICAS,
            exclude: Vec::new(),
        }
    }

    /// Set the replica count.
    pub fn with_replicas(mut self, replicas: i64) -> Self {
        self.replicas = replicas;
        self
    }

    /// Set the remote directory, relative to the base URI.
    pub fn with_remote_dir(mut self, remote_dir: impl Into<String>) -> Self {
        self.remote_dir = remote_dir.into();
        self
    }

    /// Replace the exclude globs, defaults included.
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Apply per-artifact settings.
    ///
    /// Unset fields keep the current values. Configured exclude globs are
    /// appended, so the defaults always stay excluded.
    pub fn with_settings(mut self, settings: &ArtifactSettings) -> Self {
        self.replicas = settings.replicas;
        if let Some(dir) = &settings.remote_dir {
            self.remote_dir = dir.clone();
        }
        for pattern in &settings.exclude {
            if !self.exclude.contains(pattern) {
                self.exclude.push(pattern.clone());
            }
        }
        self
    }

    /// Remote path of a canonical filename.
    fn remote_path(&self, filename: &str) -> String {
        let dir: &str = self.remote_dir.trim_matches('/');
        if dir.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", dir, filename)
        }
    }
}

/// What jobs need to fetch one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    /// Render variable prefix.
    pub name: String,
    /// Every replica URI.
    pub uris: Vec<String>,
    /// Retrieval pattern, relative to the base URI.
    pub pattern: String,
}

impl BundleInfo {
    /// Name of the URI list variable, `{name}_uris`.
    pub fn uris_variable(&self) -> String {
        format!("{}_uris", self.name)
    }

    /// Name of the pattern variable, `{name}_pattern`.
    pub fn pattern_variable(&self) -> String {
        format!("{}_pattern", self.name)
    }

    /// Final path component of the retrieval pattern.
    pub fn pattern_basename(&self) -> &str {
        self.pattern.rsplit('/').next().unwrap_or(&self.pattern)
    }
}

/// Result of bundling one artifact.
#[derive(Debug, Clone)]
pub struct BundleResult {
    /// The artifact, with its checksum cached for later consumers.
    ///
    /// Its local archive has been removed by the time this is returned.
    pub artifact: Arc<Artifact>,
    /// Planned replica locations.
    pub replicas: ReplicaSet,
    /// Upload outcome.
    pub distribution: DistributionResult,
    /// Render variable prefix.
    pub variable: String,
}

impl BundleResult {
    /// Information handed to the job config renderer.
    pub fn info(&self) -> BundleInfo {
        BundleInfo {
            name: self.variable.clone(),
            uris: self.distribution.uris.clone(),
            pattern: self.replicas.pattern().to_string(),
        }
    }
}

/// Archive an artifact and distribute it to all its replica locations.
///
/// This function:
/// 1. Validates the replica count and exclude rules before any IO
/// 2. Archives the source tree and computes the canonical filename
/// 3. Plans the replica locations
/// 4. Uploads every replica; content-addressed artifacts skip replicas that already exist
///
/// The temporary archive is removed on every exit path.
///
/// # Arguments
/// * `transport` - Remote storage transport
/// * `location` - Base URI of the bundles
/// * `spec` - What to bundle
/// * `options` - Concurrency and retry settings for uploads
/// * `cancel` - Abandons the bundle when cancelled
///
/// # Errors
/// - `JobsError::Model` for an invalid replica count or artifact name
/// - `JobsError::FileSystem` if the source is unavailable or archiving fails
/// - `JobsError::Storage` with `PartialDistributionFailure` if some replicas failed
/// - `JobsError::Cancelled` if `cancel` fired
pub async fn bundle_artifact<T: Transport>(
    transport: &T,
    location: &RemoteLocation,
    spec: &ArtifactSpec,
    options: &DistributeOptions,
    cancel: &CancellationToken,
) -> Result<BundleResult, JobsError> {
    let count: ReplicaCount = ReplicaCount::try_from(spec.replicas)?;
    let rules: ExcludeRules = ExcludeRules::new(&spec.exclude)?;

    let name: String = spec.name.clone();
    let source: PathBuf = spec.source.clone();
    let naming: NamingStrategy = spec.naming;
    let (archive, artifact, filename): (LocalArchive, Artifact, String) =
        tokio::task::spawn_blocking(move || build_and_name(name, &source, naming, &rules))
            .await
            .map_err(|e| JobsError::Task {
                message: e.to_string(),
            })??;

    if cancel.is_cancelled() {
        return Err(JobsError::Cancelled);
    }

    let replicas: ReplicaSet = ReplicaPlanner::plan_count(&spec.remote_path(&filename), count)?;

    info!(
        artifact = %spec.name,
        file = %filename,
        entries = archive.entry_count(),
        size = %human_bytes(archive.size()),
        "bundled archive"
    );

    let options: DistributeOptions = DistributeOptions {
        skip_existing: naming == NamingStrategy::ContentAddressed,
        ..options.clone()
    };
    let distribution: DistributionResult = match Distributor::new(transport, location.clone())
        .with_options(options)
        .with_cancellation(cancel.clone())
        .distribute(archive.path(), &replicas)
        .await
    {
        Ok(distribution) => distribution,
        Err(StorageError::Cancelled) => return Err(JobsError::Cancelled),
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = archive.close() {
        warn!(artifact = %spec.name, error = %e, "failed to remove temporary archive");
    }

    Ok(BundleResult {
        artifact: Arc::new(artifact),
        replicas,
        distribution,
        variable: spec.variable.clone(),
    })
}

fn build_and_name(
    name: String,
    source: &Path,
    naming: NamingStrategy,
    rules: &ExcludeRules,
) -> Result<(LocalArchive, Artifact, String), JobsError> {
    let archive: LocalArchive = Archiver::new().build(source, rules)?;
    let artifact: Artifact = Artifact::new(name, source, archive.path(), naming)?;
    let filename: String = artifact.canonical_filename()?;
    Ok((archive, artifact, filename))
}

/// The two artifacts every workflow ships to its jobs.
#[derive(Debug, Clone)]
pub struct WorkflowBundles {
    /// Repository bundle.
    pub repository: BundleResult,
    /// Software bundle.
    pub software: BundleResult,
}

impl WorkflowBundles {
    /// Bundle information for the renderer.
    pub fn infos(&self) -> Vec<BundleInfo> {
        vec![self.repository.info(), self.software.info()]
    }
}

/// Bundle the repository and software trees named by the environment.
///
/// # Errors
/// - `JobsError::MissingEnvironment` if `ANALYSIS_PATH` or `SOFTWARE_PATH` is unset
/// - `JobsError::Settings` if no remote base URI is configured
/// - Any error of [`bundle_artifact`]
pub async fn bundle_workflow_artifacts<T: Transport>(
    transport: &T,
    settings: &BundleSettings,
    environment: &WorkflowEnvironment,
    cancel: &CancellationToken,
) -> Result<WorkflowBundles, JobsError> {
    let repository_spec: ArtifactSpec =
        ArtifactSpec::repository(environment.require(EnvVar::AnalysisPath)?)?
            .with_settings(&settings.repository);
    let software_spec: ArtifactSpec =
        ArtifactSpec::software(environment.require(EnvVar::SoftwarePath)?)
            .with_settings(&settings.software);
    let location: RemoteLocation = settings.remote_location()?;
    let options: DistributeOptions = settings.distribute_options();

    let repository: BundleResult =
        bundle_artifact(transport, &location, &repository_spec, &options, cancel).await?;
    let software: BundleResult =
        bundle_artifact(transport, &location, &software_spec, &options, cancel).await?;

    Ok(WorkflowBundles {
        repository,
        software,
    })
}
