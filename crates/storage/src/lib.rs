//! Distribution of bundled archives to remote storage.
//!
//! This crate uploads one local archive to every location planned for it,
//! through a pluggable transport:
//!
//! - **Transport** - `upload`, `exists` and `size_of` on remote URIs
//! - **LocalTransport** - `file://` implementation for shared filesystems and tests
//! - **Distributor** - Concurrent, verified, retried replica uploads
//!
//! # Example
//!
//! ```ignore
//! use rusty_bundles_model::ReplicaPlanner;
//! use rusty_bundles_storage::{Distributor, LocalTransport, RemoteLocation};
//!
//! async fn ship(archive: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = LocalTransport::new();
//!     let replicas = ReplicaPlanner::plan("BundleRepo/analysis.abc123.tgz", 5)?;
//!     let result = Distributor::new(&transport, RemoteLocation::new("file:///store"))
//!         .distribute(archive, &replicas)
//!         .await?;
//!     println!("wrote {} replicas", result.uris.len());
//!     Ok(())
//! }
//! ```

mod distributor;
mod error;
mod local;
mod traits;
mod types;

pub use distributor::Distributor;
pub use error::{StorageError, TransportError};
pub use local::LocalTransport;
pub use traits::Transport;
pub use types::{
    DistributeOptions, DistributionResult, FailedUpload, RemoteLocation, RetrySettings,
    DEFAULT_UPLOAD_CONCURRENCY,
};
