//! End-to-end tests for bundling workflow artifacts and rendering job configs.
//!
//! Bundles are distributed through `LocalTransport` into a temporary store,
//! so every replica can be inspected on disk.

use std::path::{Path, PathBuf};

use rusty_bundles_filesystem::{list_entries, FileSystemError};
use rusty_bundles_jobs::{
    bundle_artifact, bundle_workflow_artifacts, ArtifactSpec, BackendKind, BundleSettings,
    EnvVar, JobConfig, JobConfigRenderer, JobsError, ResourceRequest, WorkflowBundles,
    WorkflowEnvironment,
};
use rusty_bundles_model::ModelError;
use rusty_bundles_storage::{LocalTransport, RemoteLocation, RetrySettings};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Fixture {
    _root: TempDir,
    repo: PathBuf,
    software: PathBuf,
    store: PathBuf,
}

fn fixture() -> Fixture {
    let root: TempDir = TempDir::new().unwrap();

    let repo: PathBuf = root.path().join("analysis");
    std::fs::create_dir_all(repo.join(".git")).unwrap();
    std::fs::create_dir_all(repo.join("data")).unwrap();
    std::fs::create_dir_all(repo.join(".law")).unwrap();
    std::fs::write(repo.join("a.py"), b"print('analysis')\n").unwrap();
    std::fs::write(repo.join("a.pyc"), b"\x00compiled").unwrap();
    std::fs::write(repo.join(".git/config"), b"[core]\n").unwrap();
    std::fs::write(repo.join("data/events.root"), vec![0u8; 4096]).unwrap();
    std::fs::write(repo.join(".law/index"), b"tasks").unwrap();

    let software: PathBuf = root.path().join("software");
    std::fs::create_dir_all(software.join("lib")).unwrap();
    std::fs::write(software.join("lib/module.py"), b"VERSION = 1\n").unwrap();

    let store: PathBuf = root.path().join("store");
    std::fs::create_dir_all(&store).unwrap();

    Fixture {
        _root: root,
        repo,
        software,
        store,
    }
}

fn settings(store: &Path) -> BundleSettings {
    BundleSettings {
        remote_base_uri: LocalTransport::uri_for_path(store),
        retry: RetrySettings {
            max_attempts: 2,
            base_delay_ms: 1,
            multiplier: 2.0,
        },
        ..BundleSettings::default()
    }
}

fn environment(fixture: &Fixture) -> WorkflowEnvironment {
    WorkflowEnvironment::new()
        .with(EnvVar::AnalysisPath, fixture.repo.display().to_string())
        .with(EnvVar::SoftwarePath, fixture.software.display().to_string())
        .with(EnvVar::LcgDir, "/cvmfs/sft.cern.ch/lcg/views/LCG_105")
        .with(EnvVar::GridIdentity, "/tmp/x509up_u1000")
}

fn stored_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn test_bundle_and_render_workflow() {
    let fixture: Fixture = fixture();
    let settings: BundleSettings = settings(&fixture.store);
    let env: WorkflowEnvironment = environment(&fixture);

    let bundles: WorkflowBundles = bundle_workflow_artifacts(
        &LocalTransport::new(),
        &settings,
        &env,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    // Repository: five content-addressed replicas containing only a.py.
    let checksum: String = bundles.repository.artifact.checksum().unwrap().to_string();
    assert_eq!(checksum.len(), 64);
    let repo_files: Vec<String> = stored_files(&fixture.store.join("BundleRepo"));
    assert_eq!(
        repo_files,
        (0..5)
            .map(|i| format!("analysis.{}.{}.tgz", checksum, i))
            .collect::<Vec<_>>()
    );
    let first_replica: PathBuf = fixture.store.join("BundleRepo").join(&repo_files[0]);
    assert_eq!(list_entries(&first_replica).unwrap(), vec!["a.py".to_string()]);
    for location in bundles.repository.replicas.locations() {
        assert!(bundles.repository.replicas.matches(location));
    }

    // Software: fixed name, never hashed.
    assert!(bundles.software.artifact.cached_checksum().is_none());
    assert_eq!(
        stored_files(&fixture.store.join("BundleSoftware")),
        (0..5)
            .map(|i| format!("software.{}.tgz", i))
            .collect::<Vec<_>>()
    );

    let base: JobConfig = JobConfig::new().with_resources(
        ResourceRequest::new()
            .with_memory_mb(2048.4)
            .with_max_runtime_hours(1.0),
    );
    let config: JobConfig = JobConfigRenderer::new(&settings, env)
        .render(BackendKind::Htcondor, base, &bundles.infos())
        .unwrap();

    assert_eq!(config.directive("request_memory"), Some("2048"));
    assert_eq!(config.directive("+MaxRuntime"), Some("3599"));
    assert_eq!(
        config.render_variables["repo_pattern"],
        format!(r"analysis.{}.[^\.]+.tgz", checksum)
    );
    assert_eq!(config.render_variables["software_pattern"], r"software.[^\.]+.tgz");
    let repo_uris: Vec<&str> = config.render_variables["repo_uris"].split(',').collect();
    assert_eq!(repo_uris.len(), 5);
    assert!(repo_uris[0].starts_with("file://"));
    assert!(repo_uris[0].ends_with(&format!("BundleRepo/analysis.{}.0.tgz", checksum)));
}

#[tokio::test]
async fn test_unchanged_repository_is_not_reuploaded() {
    let fixture: Fixture = fixture();
    let settings: BundleSettings = settings(&fixture.store);
    let env: WorkflowEnvironment = environment(&fixture);
    let transport: LocalTransport = LocalTransport::new();
    let cancel: CancellationToken = CancellationToken::new();

    let first: WorkflowBundles = bundle_workflow_artifacts(&transport, &settings, &env, &cancel)
        .await
        .unwrap();
    assert_eq!(first.repository.distribution.uploaded, 5);

    // Touch the tree without changing content.
    std::fs::write(fixture.repo.join("a.py"), b"print('analysis')\n").unwrap();

    let second: WorkflowBundles = bundle_workflow_artifacts(&transport, &settings, &env, &cancel)
        .await
        .unwrap();
    assert_eq!(
        second.repository.artifact.checksum().unwrap(),
        first.repository.artifact.checksum().unwrap()
    );
    assert_eq!(second.repository.distribution.skipped, 5);
    assert_eq!(second.repository.distribution.uploaded, 0);

    // Fixed-name artifacts are always replaced.
    assert_eq!(second.software.distribution.uploaded, 5);
    assert_eq!(second.software.distribution.skipped, 0);
}

#[tokio::test]
async fn test_configured_excludes_keep_repository_defaults() {
    let fixture: Fixture = fixture();
    std::fs::write(fixture.repo.join("run.log"), b"stdout").unwrap();
    let mut settings: BundleSettings = settings(&fixture.store);
    settings.repository.exclude = vec!["*.log".to_string()];

    let bundles: WorkflowBundles = bundle_workflow_artifacts(
        &LocalTransport::new(),
        &settings,
        &environment(&fixture),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let checksum: String = bundles.repository.artifact.checksum().unwrap().to_string();
    let first_replica: PathBuf = fixture
        .store
        .join("BundleRepo")
        .join(format!("analysis.{}.0.tgz", checksum));
    assert_eq!(list_entries(&first_replica).unwrap(), vec!["a.py".to_string()]);
}

#[tokio::test]
async fn test_unreplicated_software_bundle() {
    let fixture: Fixture = fixture();
    let mut settings: BundleSettings = settings(&fixture.store);
    settings.software.replicas = -1;

    let bundles: WorkflowBundles = bundle_workflow_artifacts(
        &LocalTransport::new(),
        &settings,
        &environment(&fixture),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        stored_files(&fixture.store.join("BundleSoftware")),
        vec!["software.tgz".to_string()]
    );
    assert_eq!(bundles.software.info().pattern_basename(), "software.tgz");
}

#[tokio::test]
async fn test_invalid_replica_count_fails_before_io() {
    let fixture: Fixture = fixture();
    let spec: ArtifactSpec = ArtifactSpec::repository(&fixture.repo)
        .unwrap()
        .with_replicas(-3);
    let location: RemoteLocation = settings(&fixture.store).remote_location().unwrap();

    let err: JobsError = bundle_artifact(
        &LocalTransport::new(),
        &location,
        &spec,
        &settings(&fixture.store).distribute_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        JobsError::Model(ModelError::InvalidReplicaCount { count: -3 })
    ));
    assert!(stored_files(&fixture.store).is_empty());
}

#[tokio::test]
async fn test_missing_source_is_unavailable() {
    let fixture: Fixture = fixture();
    let spec: ArtifactSpec = ArtifactSpec::software(fixture.software.join("missing"));
    let location: RemoteLocation = settings(&fixture.store).remote_location().unwrap();

    let err: JobsError = bundle_artifact(
        &LocalTransport::new(),
        &location,
        &spec,
        &settings(&fixture.store).distribute_options(),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        JobsError::FileSystem(FileSystemError::SourceUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_missing_environment() {
    let fixture: Fixture = fixture();
    let env: WorkflowEnvironment = WorkflowEnvironment::new()
        .with(EnvVar::SoftwarePath, fixture.software.display().to_string());

    let err: JobsError = bundle_workflow_artifacts(
        &LocalTransport::new(),
        &settings(&fixture.store),
        &env,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match err {
        JobsError::MissingEnvironment { variable } => assert_eq!(variable, "ANALYSIS_PATH"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancelled_bundle() {
    let fixture: Fixture = fixture();
    let cancel: CancellationToken = CancellationToken::new();
    cancel.cancel();

    let err: JobsError = bundle_workflow_artifacts(
        &LocalTransport::new(),
        &settings(&fixture.store),
        &environment(&fixture),
        &cancel,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, JobsError::Cancelled));
    assert!(stored_files(&fixture.store).is_empty());
}
