//! `file://` transport backed by the local filesystem.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::traits::Transport;

const FILE_SCHEME: &str = "file://";

/// Transport that stores objects on a locally mounted filesystem.
///
/// Useful for shared cluster filesystems and for tests. Uploads are written
/// to a sibling temporary file and renamed into place, so a reader never
/// observes a partially written replica.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

impl LocalTransport {
    /// Create a new local transport.
    pub fn new() -> Self {
        Self
    }

    /// Resolve a `file://` URI to an absolute path.
    ///
    /// # Errors
    /// Returns `TransportError::UnsupportedUri` for other schemes or relative paths.
    pub fn resolve(uri: &str) -> Result<PathBuf, TransportError> {
        let path: PathBuf = uri
            .strip_prefix(FILE_SCHEME)
            .map(PathBuf::from)
            .ok_or_else(|| TransportError::UnsupportedUri {
                uri: uri.to_string(),
            })?;
        if !path.is_absolute() {
            return Err(TransportError::UnsupportedUri {
                uri: uri.to_string(),
            });
        }
        Ok(path)
    }

    /// Format a `file://` URI for an absolute path.
    pub fn uri_for_path(path: &Path) -> String {
        format!("{}{}", FILE_SCHEME, path.display())
    }
}

fn map_io_error(uri: &str, error: std::io::Error) -> TransportError {
    match error.kind() {
        ErrorKind::NotFound => TransportError::NotFound {
            uri: uri.to_string(),
        },
        ErrorKind::PermissionDenied => TransportError::PermissionDenied {
            uri: uri.to_string(),
        },
        _ => TransportError::Io {
            uri: uri.to_string(),
            message: error.to_string(),
        },
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn upload(&self, local_path: &Path, remote_uri: &str) -> Result<(), TransportError> {
        let destination: PathBuf = Self::resolve(remote_uri)?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error(remote_uri, e))?;
        }

        let mut partial: PathBuf = destination.clone();
        partial.as_mut_os_string().push(".partial");

        if let Err(e) = tokio::fs::copy(local_path, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(TransportError::Io {
                uri: remote_uri.to_string(),
                message: format!("copy from {} failed: {}", local_path.display(), e),
            });
        }
        tokio::fs::rename(&partial, &destination)
            .await
            .map_err(|e| map_io_error(remote_uri, e))
    }

    async fn exists(&self, remote_uri: &str) -> Result<bool, TransportError> {
        let path: PathBuf = Self::resolve(remote_uri)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| map_io_error(remote_uri, e))
    }

    async fn size_of(&self, remote_uri: &str) -> Result<u64, TransportError> {
        let path: PathBuf = Self::resolve(remote_uri)?;
        let metadata: std::fs::Metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| map_io_error(remote_uri, e))?;
        Ok(metadata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_exists_size() {
        let src: TempDir = TempDir::new().unwrap();
        let store: TempDir = TempDir::new().unwrap();
        let local: PathBuf = src.path().join("bundle.tgz");
        std::fs::write(&local, b"twelve bytes").unwrap();

        let transport: LocalTransport = LocalTransport::new();
        let uri: String = LocalTransport::uri_for_path(&store.path().join("nested/dir/b.0.tgz"));

        assert!(!transport.exists(&uri).await.unwrap());
        transport.upload(&local, &uri).await.unwrap();
        assert!(transport.exists(&uri).await.unwrap());
        assert_eq!(transport.size_of(&uri).await.unwrap(), 12);
        assert!(!store.path().join("nested/dir/b.0.tgz.partial").exists());
    }

    #[tokio::test]
    async fn test_size_of_missing() {
        let store: TempDir = TempDir::new().unwrap();
        let uri: String = LocalTransport::uri_for_path(&store.path().join("missing.tgz"));
        let result = LocalTransport::new().size_of(&uri).await;
        assert!(matches!(result, Err(TransportError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_upload_missing_local_file() {
        let store: TempDir = TempDir::new().unwrap();
        let uri: String = LocalTransport::uri_for_path(&store.path().join("x.tgz"));
        let result = LocalTransport::new()
            .upload(Path::new("/nonexistent/bundle.tgz"), &uri)
            .await;
        assert!(matches!(result, Err(TransportError::Io { .. })));
        assert!(!store.path().join("x.tgz.partial").exists());
    }

    #[test]
    fn test_resolve_rejects_other_schemes() {
        assert!(matches!(
            LocalTransport::resolve("root://eos.cern.ch//eos/x.tgz"),
            Err(TransportError::UnsupportedUri { .. })
        ));
        assert!(matches!(
            LocalTransport::resolve("file://relative/x.tgz"),
            Err(TransportError::UnsupportedUri { .. })
        ));
        assert_eq!(
            LocalTransport::resolve("file:///data/x.tgz").unwrap(),
            PathBuf::from("/data/x.tgz")
        );
    }
}
