//! Durable writes for rewritten sources and the catalog

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Sink for rewritten source files
///
/// The instrumentor writes every rewritten file through this trait, which
/// keeps the filesystem side effect in one place.
pub trait SourceWriter: Sync {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// Writes files with temp-file-and-rename semantics
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicWriter;

impl SourceWriter for AtomicWriter {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        atomic_write(path, contents)
    }
}

/// Temp file next to `path`, so the final rename stays on one filesystem
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("functrace"));
    name.push(".functrace.tmp");
    path.with_file_name(name)
}

/// Atomically replace `path` with `contents`
///
/// A reader sees either the old file or the complete new one, never a
/// partial write. The temp file is removed if any step fails.
pub fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    let temp_path = temp_path_for(path);

    let result = write_and_rename(&temp_path, path, contents);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_and_rename(temp_path: &Path, path: &Path, contents: &str) -> io::Result<()> {
    let mut file = fs::File::create(temp_path)?;
    // Keep the replaced file's mode
    if let Ok(metadata) = fs::metadata(path) {
        file.set_permissions(metadata.permissions())?;
    }
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Main.swift");
        fs::write(&path, "old").unwrap();

        atomic_write(&path, "new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!temp_path_for(&path).exists(), "temp file should be renamed away");
    }

    #[test]
    fn test_atomic_write_missing_parent_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("Main.swift");

        assert!(atomic_write(&path, "x").is_err());
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_temp_path_keeps_directory() {
        let path = Path::new("/tmp/project/App.swift");
        assert_eq!(
            temp_path_for(path),
            PathBuf::from("/tmp/project/App.swift.functrace.tmp")
        );
    }
}
