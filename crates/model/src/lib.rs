//! Artifact model for bundled job inputs.
//!
//! This crate names and plans the artifacts that batch jobs fetch before
//! running their payload:
//!
//! - `hash` - Digest algorithms over archive bytes
//! - `naming` - Content-addressed and fixed canonical filenames
//! - `artifact` - Built archives with a lazily cached checksum
//! - `replica` - Replica locations and the job-side retrieval pattern

pub mod artifact;
pub mod error;
pub mod hash;
pub mod naming;
pub mod replica;

pub use artifact::Artifact;
pub use error::ModelError;
pub use hash::{DigestAlgorithm, HASH_BUFFER_SIZE};
pub use naming::{
    content_addressed_name, fixed_name, validate_logical_name, ChecksumNamer, NamingStrategy,
    ARCHIVE_EXTENSION,
};
pub use replica::{
    replicated_path, ReplicaCount, ReplicaPlanner, ReplicaSet, REPLICA_INDEX_PATTERN,
    UNREPLICATED,
};
