//! Bundling and batch job configuration for analysis workflows.
//!
//! This crate composes the archive, model and storage crates into the two
//! steps a workflow runs before dispatching jobs:
//!
//! - **Bundling** - Archive the repository and software trees, name them,
//!   and distribute every replica
//! - **Rendering** - Build the backend submission configuration that tells
//!   each job where to fetch the bundles
//!
//! # Example
//!
//! ```ignore
//! use rusty_bundles_jobs::{
//!     bundle_workflow_artifacts, BackendKind, BundleSettings, JobConfig, JobConfigRenderer,
//!     WorkflowEnvironment,
//! };
//! use rusty_bundles_storage::LocalTransport;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn prepare() -> Result<(), rusty_bundles_jobs::JobsError> {
//!     let settings = BundleSettings::from_json_file("bundles.json".as_ref())?;
//!     let environment = WorkflowEnvironment::from_env();
//!
//!     let bundles = bundle_workflow_artifacts(
//!         &LocalTransport::new(),
//!         &settings,
//!         &environment,
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//!
//!     let config = JobConfigRenderer::new(&settings, environment).render(
//!         BackendKind::Htcondor,
//!         JobConfig::new(),
//!         &bundles.infos(),
//!     )?;
//!     println!("{}", config.to_json_pretty()?);
//!     Ok(())
//! }
//! ```

mod bundle;
mod environment;
mod error;
mod job_config;
mod profile;
mod render;
mod resources;
mod settings;

pub use bundle::{
    bundle_artifact, bundle_workflow_artifacts, ArtifactSpec, BundleInfo, BundleResult,
    WorkflowBundles, REPOSITORY_EXCLUDES, REPOSITORY_REMOTE_DIR, SOFTWARE_REMOTE_DIR,
};
pub use environment::{EnvVar, WorkflowEnvironment};
pub use error::JobsError;
pub use job_config::{Directive, JobConfig, JobInputFile};
pub use profile::{BackendKind, BackendProfile, CrabProfile, HtcondorProfile, Passthrough};
pub use render::{JobConfigRenderer, BOOTSTRAP_INPUT};
pub use resources::ResourceRequest;
pub use settings::{
    ArtifactSettings, BundleSettings, CrabSettings, HtcondorSettings, DEFAULT_REPLICAS,
};
