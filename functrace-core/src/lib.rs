//! functrace core library - function timing instrumentation for Swift source trees

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Classification is strictly per-line; the only carried state is the block-comment flag
// - No global mutable state; the catalog is folded on one thread
// - A file carrying the marker is never touched again
// - One bad file never aborts a walk
// - The sidecar catalog is written at most once

pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod instrument;
pub mod progress;
pub mod tracker;
pub mod writer;

pub use catalog::{Catalog, CatalogPersistence, FunctionRecord};
pub use classify::{LineClassifier, SwiftLineClassifier};
pub use config::ResolvedConfig;
pub use error::{InstrumentError, InstrumentResult};
pub use instrument::{
    instrument, instrument_with, spawn_instrument, InstrumentOptions, InstrumentOutcome,
    Instrumentor,
};
pub use progress::{ProcessingState, ProgressSignal};

use std::path::{Path, PathBuf};
use tracing::warn;

/// Extension of the files the instrumentor rewrites
pub const SOURCE_EXTENSION: &str = "swift";

/// Check if a file is a supported source file
fn is_supported_source_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION)
}

/// Collect all `.swift` files under `root`
///
/// Every directory is descended into; narrowing the set is left to the
/// include/exclude globs of [`config::ResolvedConfig`]. Failing to read `root`
/// itself is an error. Unreadable subdirectories are logged and skipped.
/// Symlinks are not followed. Files are returned sorted.
pub fn collect_source_files(root: &Path) -> InstrumentResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(root).map_err(|source| InstrumentError::DirectoryUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    collect_entries(entries, &mut files);

    // Sort files for deterministic order
    files.sort();

    Ok(files)
}

/// Recursively collect source files from a subdirectory, logging failures
fn collect_source_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    match std::fs::read_dir(dir) {
        Ok(entries) => collect_entries(entries, files),
        Err(source) => {
            let err = InstrumentError::DirectoryUnreadable {
                path: dir.to_path_buf(),
                source,
            };
            warn!("skipping directory: {}", err);
        }
    }
}

/// Process directory entries, pushing source files or recursing into dirs
fn collect_entries(entries: std::fs::ReadDir, files: &mut Vec<PathBuf>) {
    for entry_result in entries {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable directory entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        let metadata = match std::fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("failed to read metadata for {}: {}", path.display(), e);
                continue;
            }
        };

        if metadata.is_symlink() {
            continue;
        }

        if metadata.is_dir() {
            collect_source_files_recursive(&path, files);
        } else if metadata.is_file() && is_supported_source_file(&path) {
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collects_only_swift_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("App/Views")).unwrap();
        fs::write(dir.path().join("App/Main.swift"), "").unwrap();
        fs::write(dir.path().join("App/Views/Row.swift"), "").unwrap();
        fs::write(dir.path().join("App/Info.plist"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();

        let files = collect_source_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("App/Main.swift"),
                dir.path().join("App/Views/Row.swift"),
            ]
        );
    }

    #[test]
    fn test_descends_into_hidden_and_dependency_dirs() {
        let dir = tempfile::tempdir().unwrap();
        for sub in [".hidden", "Pods/Lib", "Carthage", "DerivedData"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
            fs::write(dir.path().join(sub).join("Dep.swift"), "").unwrap();
        }
        fs::write(dir.path().join("Kept.swift"), "").unwrap();

        let files = collect_source_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join(".hidden/Dep.swift"),
                dir.path().join("Carthage/Dep.swift"),
                dir.path().join("DerivedData/Dep.swift"),
                dir.path().join("Kept.swift"),
                dir.path().join("Pods/Lib/Dep.swift"),
            ]
        );
    }

    #[test]
    fn test_directory_with_swift_extension_is_traversed() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Odd.swift")).unwrap();
        fs::write(dir.path().join("Odd.swift/Inner.swift"), "").unwrap();

        let files = collect_source_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("Odd.swift/Inner.swift")]);
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = collect_source_files(&dir.path().join("absent"));
        assert!(matches!(
            result,
            Err(InstrumentError::DirectoryUnreadable { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("Elsewhere.swift"), "").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let files = collect_source_files(dir.path()).unwrap();
        assert!(files.is_empty());
    }
}
