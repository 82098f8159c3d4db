//! Bundle the workflow artifacts into a local store and print the job config.
//!
//! Usage: `bundle_and_render <store-dir> [htcondor|crab] [settings.json]`
//!
//! Reads `ANALYSIS_PATH`, `SOFTWARE_PATH`, `LCG_DIR` and (for HTCondor)
//! `X509_USER_PROXY` from the environment. Ctrl-C abandons the uploads.

use std::path::{Path, PathBuf};

use rusty_bundles_jobs::{
    bundle_workflow_artifacts, BackendKind, BundleSettings, JobConfig, JobConfigRenderer,
    ResourceRequest, WorkflowEnvironment,
};
use rusty_bundles_storage::LocalTransport;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("rusty_bundles=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let store: PathBuf = args
        .next()
        .map(PathBuf::from)
        .ok_or("usage: bundle_and_render <store-dir> [htcondor|crab] [settings.json]")?;
    let backend: BackendKind = args
        .next()
        .as_deref()
        .unwrap_or("htcondor")
        .parse()?;
    let mut settings: BundleSettings = match args.next() {
        Some(path) => BundleSettings::from_json_file(Path::new(&path))?,
        None => BundleSettings::default(),
    };

    std::fs::create_dir_all(&store)?;
    settings.remote_base_uri = LocalTransport::uri_for_path(&std::fs::canonicalize(&store)?);
    let environment: WorkflowEnvironment = WorkflowEnvironment::from_env();

    let cancel: CancellationToken = CancellationToken::new();
    let on_signal: CancellationToken = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let bundles = bundle_workflow_artifacts(
        &LocalTransport::new(),
        &settings,
        &environment,
        &cancel,
    )
    .await?;
    info!(
        repository = %bundles.repository.replicas.canonical_path(),
        software = %bundles.software.replicas.canonical_path(),
        "bundles distributed"
    );

    let base: JobConfig = JobConfig::new().with_resources(
        ResourceRequest::new()
            .with_memory_mb(2000.0)
            .with_max_runtime_hours(2.0),
    );
    let config: JobConfig = JobConfigRenderer::new(&settings, environment).render(
        backend,
        base,
        &bundles.infos(),
    )?;

    println!("{}", config.to_json_pretty()?);
    Ok(())
}
