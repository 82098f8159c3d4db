//! Source-tree archiving for bundled job inputs.
//!
//! - `filter` - Fixed denylist plus glob exclusion rules
//! - `archive` - Deterministic `.tgz` archives of a directory
//! - `temp` - Scoped temporary archive files
//! - `size` - Human readable sizes for logging

pub mod archive;
mod error;
pub mod filter;
mod size;
mod temp;

pub use archive::{list_entries, Archiver, SymlinkPolicy, DEFAULT_COMPRESSION_LEVEL};
pub use error::FileSystemError;
pub use filter::{ExcludeRules, DEFAULT_DENYLIST};
pub use size::human_bytes;
pub use temp::LocalArchive;
