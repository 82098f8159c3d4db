//! Deterministic gzip-compressed tar archives of source trees.
//!
//! Entries are written in sorted order with zeroed timestamps and ownership
//! and normalized permissions, and the gzip header carries no mtime. Two
//! builds of byte-identical trees therefore produce byte-identical archives,
//! which is what makes content addressing of the result meaningful.

use std::fs::{File, Metadata};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use tempfile::{NamedTempFile, TempPath};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::FileSystemError;
use crate::filter::ExcludeRules;
use crate::temp::LocalArchive;

/// Default gzip compression level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// How symlinks inside the source tree are archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymlinkPolicy {
    /// Keep relative symlinks that stay inside the source tree; skip the rest.
    #[default]
    PreserveInternal,
    /// Skip all symlinks.
    ExcludeAll,
}

/// Builds a single compressed archive from a source directory.
#[derive(Debug, Clone)]
pub struct Archiver {
    compression_level: u32,
    symlink_policy: SymlinkPolicy,
    temp_dir: Option<PathBuf>,
}

impl Default for Archiver {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            symlink_policy: SymlinkPolicy::default(),
            temp_dir: None,
        }
    }
}

impl Archiver {
    /// Create an archiver with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gzip compression level (0-9).
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Set the symlink policy.
    pub fn with_symlink_policy(mut self, policy: SymlinkPolicy) -> Self {
        self.symlink_policy = policy;
        self
    }

    /// Place temporary archives in `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Archive a source tree into a temporary file.
    ///
    /// # Arguments
    /// * `source` - Directory to archive; entries are stored relative to it
    /// * `rules` - Exclusion rules applied to every entry
    ///
    /// # Returns
    /// The temporary archive. It is deleted when dropped.
    ///
    /// # Errors
    /// - `FileSystemError::SourceUnavailable` if `source` is missing, not a directory, or unreadable
    /// - `FileSystemError::IoError` if an entry cannot be read or the archive cannot be written
    pub fn build(
        &self,
        source: &Path,
        rules: &ExcludeRules,
    ) -> Result<LocalArchive, FileSystemError> {
        check_source(source)?;

        let mut temp_builder = tempfile::Builder::new();
        temp_builder.prefix("bundle-").suffix(".tgz");
        let temp: NamedTempFile = match &self.temp_dir {
            Some(dir) => temp_builder.tempfile_in(dir),
            None => temp_builder.tempfile(),
        }
        .map_err(|e| FileSystemError::io_error("temporary archive", e))?;

        let (file, temp_path): (File, TempPath) = temp.into_parts();
        let archive_name: String = temp_path.display().to_string();

        let (writer, entry_count): (BufWriter<File>, usize) =
            self.write_archive(source, rules, BufWriter::new(file))?;
        let file: File = writer
            .into_inner()
            .map_err(|e| FileSystemError::io_error(archive_name.clone(), e.into_error()))?;
        file.sync_all()
            .map_err(|e| FileSystemError::io_error(archive_name.clone(), e))?;
        let size: u64 = file
            .metadata()
            .map_err(|e| FileSystemError::io_error(archive_name.clone(), e))?
            .len();

        debug!(
            source = %source.display(),
            archive = %archive_name,
            entries = entry_count,
            size,
            "built archive"
        );

        Ok(LocalArchive::new(temp_path, size, entry_count))
    }

    /// Write the archive of `source` to an arbitrary writer.
    ///
    /// # Arguments
    /// * `source` - Directory to archive
    /// * `rules` - Exclusion rules applied to every entry
    /// * `writer` - Destination of the compressed bytes
    ///
    /// # Returns
    /// The writer (flushed by the gzip trailer) and the number of entries written.
    ///
    /// # Errors
    /// Same as [`Archiver::build`].
    pub fn write_archive<W: Write>(
        &self,
        source: &Path,
        rules: &ExcludeRules,
        writer: W,
    ) -> Result<(W, usize), FileSystemError> {
        check_source(source)?;

        let encoder = GzBuilder::new()
            .mtime(0)
            .write(writer, Compression::new(self.compression_level));
        let mut builder: tar::Builder<_> = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        let mut entry_count: usize = 0;
        let walker = WalkDir::new(source)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_excluded_entry(source, entry, rules));

        for entry in walker {
            let entry: DirEntry = entry.map_err(|e| FileSystemError::IoError {
                path: e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                source: e.into(),
            })?;
            if self.append_entry(&mut builder, source, &entry)? {
                entry_count += 1;
            }
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| FileSystemError::io_error(source.display().to_string(), e))?;
        let writer: W = encoder
            .finish()
            .map_err(|e| FileSystemError::io_error(source.display().to_string(), e))?;

        Ok((writer, entry_count))
    }

    /// Append one walked entry. Returns false if the entry was skipped.
    fn append_entry<W: Write>(
        &self,
        builder: &mut tar::Builder<W>,
        source: &Path,
        entry: &DirEntry,
    ) -> Result<bool, FileSystemError> {
        let path: &Path = entry.path();
        let path_str = || path.display().to_string();
        let relative: &Path = relative_path(source, path)?;
        let metadata: Metadata = entry
            .metadata()
            .map_err(|e| FileSystemError::io_error(path_str(), e.into()))?;
        let file_type = metadata.file_type();

        let mut header: tar::Header = tar::Header::new_gnu();
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        if file_type.is_dir() {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder
                .append_data(&mut header, relative, std::io::empty())
                .map_err(|e| FileSystemError::io_error(path_str(), e))?;
        } else if file_type.is_file() {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_mode(if is_executable(&metadata) { 0o755 } else { 0o644 });
            header.set_size(metadata.len());
            let file: File = File::open(path).map_err(|e| FileSystemError::io_error(path_str(), e))?;
            builder
                .append_data(&mut header, relative, file)
                .map_err(|e| FileSystemError::io_error(path_str(), e))?;
        } else if file_type.is_symlink() {
            if self.symlink_policy == SymlinkPolicy::ExcludeAll {
                debug!(path = %path.display(), "skipping symlink");
                return Ok(false);
            }
            let target: PathBuf =
                std::fs::read_link(path).map_err(|e| FileSystemError::io_error(path_str(), e))?;
            if escapes_root(relative, &target) {
                debug!(
                    path = %path.display(),
                    target = %target.display(),
                    "skipping symlink that escapes the source tree"
                );
                return Ok(false);
            }
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_mode(0o777);
            header.set_size(0);
            builder
                .append_link(&mut header, relative, &target)
                .map_err(|e| FileSystemError::io_error(path_str(), e))?;
        } else {
            debug!(path = %path.display(), "skipping special file");
            return Ok(false);
        }

        Ok(true)
    }
}

/// List the entry names of a gzip-compressed tar archive.
///
/// Directory entries are reported without a trailing slash.
///
/// # Errors
/// Returns `FileSystemError::IoError` if the archive cannot be read.
pub fn list_entries(archive: &Path) -> Result<Vec<String>, FileSystemError> {
    let archive_str = || archive.display().to_string();
    let file: File = File::open(archive).map_err(|e| FileSystemError::io_error(archive_str(), e))?;
    let mut reader: tar::Archive<GzDecoder<BufReader<File>>> =
        tar::Archive::new(GzDecoder::new(BufReader::new(file)));

    let mut names: Vec<String> = Vec::new();
    for entry in reader
        .entries()
        .map_err(|e| FileSystemError::io_error(archive_str(), e))?
    {
        let entry = entry.map_err(|e| FileSystemError::io_error(archive_str(), e))?;
        let path: PathBuf = entry
            .path()
            .map_err(|e| FileSystemError::io_error(archive_str(), e))?
            .into_owned();
        names.push(
            path.to_string_lossy()
                .trim_end_matches('/')
                .to_string(),
        );
    }
    Ok(names)
}

fn check_source(source: &Path) -> Result<(), FileSystemError> {
    let source_str: String = source.display().to_string();
    let metadata: Metadata = std::fs::metadata(source)
        .map_err(|e| FileSystemError::source_unavailable(source_str.clone(), e.to_string()))?;
    if !metadata.is_dir() {
        return Err(FileSystemError::source_unavailable(source_str, "not a directory"));
    }
    std::fs::read_dir(source)
        .map_err(|e| FileSystemError::source_unavailable(source_str, e.to_string()))?;
    Ok(())
}

fn is_excluded_entry(source: &Path, entry: &DirEntry, rules: &ExcludeRules) -> bool {
    match relative_path(source, entry.path()) {
        Ok(relative) => {
            let name: String = match_name(relative);
            let excluded: bool = rules.is_excluded(&name);
            if excluded {
                debug!(path = %name, "excluded from archive");
            }
            excluded
        }
        Err(_) => false,
    }
}

/// Root-relative path of a walked entry, stored verbatim in the archive.
fn relative_path<'a>(source: &Path, path: &'a Path) -> Result<&'a Path, FileSystemError> {
    let relative: &Path = path
        .strip_prefix(source)
        .map_err(|_| FileSystemError::InvalidPath {
            path: path.display().to_string(),
        })?;
    if relative.as_os_str().is_empty() || relative.has_root() {
        return Err(FileSystemError::InvalidPath {
            path: path.display().to_string(),
        });
    }
    Ok(relative)
}

/// Lossy `/`-separated form of a relative path, used only for exclusion matching.
fn match_name(relative: &Path) -> String {
    relative.to_string_lossy().replace('\\', "/")
}

/// True if a symlink at `relative` pointing to `target` resolves outside the root.
fn escapes_root(relative: &Path, target: &Path) -> bool {
    let mut depth: usize = relative
        .parent()
        .map(|p| p.components().count())
        .unwrap_or(0);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}

#[cfg(unix)]
fn is_executable(metadata: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_structure(dir: &Path) {
        std::fs::write(dir.join("a.py"), b"print('a')").unwrap();
        std::fs::write(dir.join("a.pyc"), b"\x00compiled").unwrap();
        std::fs::create_dir(dir.join(".git")).unwrap();
        std::fs::write(dir.join(".git/config"), b"[core]").unwrap();
    }

    #[test]
    fn test_denylist_scenario() {
        let dir: TempDir = TempDir::new().unwrap();
        create_test_structure(dir.path());

        let archive: LocalArchive = Archiver::new()
            .build(dir.path(), &ExcludeRules::default())
            .unwrap();

        assert_eq!(list_entries(archive.path()).unwrap(), vec!["a.py".to_string()]);
        assert_eq!(archive.entry_count(), 1);
        assert!(archive.size() > 0);
    }

    #[test]
    fn test_nested_directories_and_patterns() {
        let dir: TempDir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg/__pycache__")).unwrap();
        std::fs::write(dir.path().join("pkg/__pycache__/m.cpython-311.pyc"), b"x").unwrap();
        std::fs::write(dir.path().join("pkg/m.py"), b"x = 1").unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join("data/big.root"), b"payload").unwrap();

        let rules: ExcludeRules = ExcludeRules::new(&["data".to_string()]).unwrap();
        let archive: LocalArchive = Archiver::new().build(dir.path(), &rules).unwrap();

        assert_eq!(
            list_entries(archive.path()).unwrap(),
            vec!["pkg".to_string(), "pkg/m.py".to_string()]
        );
    }

    #[test]
    fn test_missing_source() {
        let result = Archiver::new().build(Path::new("/nonexistent/source"), &ExcludeRules::default());
        assert!(matches!(result, Err(FileSystemError::SourceUnavailable { .. })));
    }

    #[test]
    fn test_file_as_source() {
        let dir: TempDir = TempDir::new().unwrap();
        let file: PathBuf = dir.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();

        let result = Archiver::new().build(&file, &ExcludeRules::default());
        assert!(matches!(result, Err(FileSystemError::SourceUnavailable { .. })));
    }

    #[test]
    fn test_archive_removed_on_drop() {
        let dir: TempDir = TempDir::new().unwrap();
        create_test_structure(dir.path());

        let archive: LocalArchive = Archiver::new()
            .with_temp_dir(dir.path())
            .build(dir.path().join(".git").as_path(), &ExcludeRules::none())
            .unwrap();
        let path: PathBuf = archive.path().to_path_buf();
        assert!(path.exists());

        drop(archive);
        assert!(!path.exists());
    }

    #[test]
    fn test_persist_keeps_file() {
        let src: TempDir = TempDir::new().unwrap();
        let out: TempDir = TempDir::new().unwrap();
        create_test_structure(src.path());

        let archive: LocalArchive = Archiver::new()
            .build(src.path(), &ExcludeRules::default())
            .unwrap();
        let kept: PathBuf = archive.persist(out.path().join("kept.tgz")).unwrap();
        assert!(kept.exists());
    }

    #[test]
    fn test_identical_trees_produce_identical_bytes() {
        let first: TempDir = TempDir::new().unwrap();
        let second: TempDir = TempDir::new().unwrap();
        // Create in different orders.
        std::fs::write(first.path().join("b.txt"), b"bee").unwrap();
        std::fs::write(first.path().join("a.txt"), b"ay").unwrap();
        std::fs::write(second.path().join("a.txt"), b"ay").unwrap();
        std::fs::write(second.path().join("b.txt"), b"bee").unwrap();

        let archiver: Archiver = Archiver::new();
        let (one, _) = archiver
            .write_archive(first.path(), &ExcludeRules::default(), Vec::new())
            .unwrap();
        let (two, _) = archiver
            .write_archive(second.path(), &ExcludeRules::default(), Vec::new())
            .unwrap();
        assert_eq!(one, two);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks() {
        let dir: TempDir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("real.txt"), b"x").unwrap();
        std::os::unix::fs::symlink("real.txt", dir.path().join("inside")).unwrap();
        std::os::unix::fs::symlink("../outside.txt", dir.path().join("escaping")).unwrap();
        std::os::unix::fs::symlink("/etc/hosts", dir.path().join("absolute")).unwrap();

        let archive: LocalArchive = Archiver::new()
            .build(dir.path(), &ExcludeRules::default())
            .unwrap();
        assert_eq!(
            list_entries(archive.path()).unwrap(),
            vec!["inside".to_string(), "real.txt".to_string()]
        );

        let none: LocalArchive = Archiver::new()
            .with_symlink_policy(SymlinkPolicy::ExcludeAll)
            .build(dir.path(), &ExcludeRules::default())
            .unwrap();
        assert_eq!(list_entries(none.path()).unwrap(), vec!["real.txt".to_string()]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_are_stored_verbatim() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir: TempDir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"\xff.py")), b"one").unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"\xfe.py")), b"two").unwrap();

        let (bytes, count) = Archiver::new()
            .write_archive(dir.path(), &ExcludeRules::default(), Vec::new())
            .unwrap();
        assert_eq!(count, 2);

        let mut reader = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
        let names: Vec<Vec<u8>> = reader
            .entries()
            .unwrap()
            .map(|entry| entry.unwrap().path_bytes().into_owned())
            .collect();
        assert_eq!(names, vec![b"\xfe.py".to_vec(), b"\xff.py".to_vec()]);
    }

    #[test]
    fn test_escapes_root() {
        assert!(!escapes_root(Path::new("a/link"), Path::new("../b.txt")));
        assert!(escapes_root(Path::new("link"), Path::new("../b.txt")));
        assert!(escapes_root(Path::new("link"), Path::new("/abs")));
        assert!(!escapes_root(Path::new("link"), Path::new("./sub/../x")));
    }
}
