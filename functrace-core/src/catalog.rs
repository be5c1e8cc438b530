//! Function catalog: records, sidecar persistence, and rendering
//!
//! Global invariants enforced:
//! - Record order is insertion order (never sorted)
//! - The sidecar catalog is written at most once; an existing file is never replaced

use crate::error::{InstrumentError, InstrumentResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default sidecar directory, relative to the instrumented root
pub const DEFAULT_SIDECAR_DIR: &str = ".devtools";

/// Catalog file name inside the sidecar directory
pub const CATALOG_FILE_NAME: &str = "swiftFuncs";

/// One detected function declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRecord {
    pub function_name: String,
    pub file_path: String,
}

impl FunctionRecord {
    pub fn new(function_name: impl Into<String>, file_path: &Path) -> Self {
        FunctionRecord {
            function_name: function_name.into(),
            file_path: file_path.to_string_lossy().into_owned(),
        }
    }
}

/// Ordered list of function records from one walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    records: Vec<FunctionRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: FunctionRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = FunctionRecord>) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[FunctionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records declared in `file_path`, in catalog order
    pub fn for_file<'a>(&'a self, file_path: &'a str) -> impl Iterator<Item = &'a FunctionRecord> {
        self.records.iter().filter(move |r| r.file_path == file_path)
    }

    /// Pretty-printed JSON array, fields in `functionName`, `filePath` order
    pub fn to_json(&self) -> InstrumentResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<Vec<FunctionRecord>> for Catalog {
    fn from(records: Vec<FunctionRecord>) -> Self {
        Catalog { records }
    }
}

impl IntoIterator for Catalog {
    type Item = FunctionRecord;
    type IntoIter = std::vec::IntoIter<FunctionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// What happened to the catalog at the end of a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogPersistence {
    /// Catalog written to this path
    Written(PathBuf),
    /// A catalog was already present; the new one was discarded
    AlreadyExists(PathBuf),
    /// Nothing was persisted because the walk never enumerated the root
    Skipped,
    /// Serialization or the write failed (already logged)
    Failed(PathBuf),
}

/// Path of the catalog file inside a sidecar directory
pub fn catalog_path(sidecar_dir: &Path) -> PathBuf {
    sidecar_dir.join(CATALOG_FILE_NAME)
}

/// Default sidecar directory for an instrumented root
pub fn default_sidecar_dir(root: &Path) -> PathBuf {
    root.join(DEFAULT_SIDECAR_DIR)
}

/// Persist `catalog` unless a catalog already exists in `sidecar_dir`
///
/// Creates the sidecar directory when missing. The existence check and the
/// write are not locked against a concurrent walk on the same directory.
pub fn persist_catalog(sidecar_dir: &Path, catalog: &Catalog) -> InstrumentResult<CatalogPersistence> {
    let path = catalog_path(sidecar_dir);
    if path.exists() {
        return Ok(CatalogPersistence::AlreadyExists(path));
    }

    let json = catalog.to_json()?;

    std::fs::create_dir_all(sidecar_dir)
        .and_then(|_| crate::writer::atomic_write(&path, &json))
        .map_err(|source| InstrumentError::CatalogWriteFailed {
            path: path.clone(),
            source,
        })?;

    Ok(CatalogPersistence::Written(path))
}

/// Load a persisted catalog
///
/// Returns `None` when no catalog has been written yet.
pub fn load_catalog(sidecar_dir: &Path) -> Result<Option<Catalog>> {
    let path = catalog_path(sidecar_dir);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read catalog: {}", path.display()))?;
    let catalog: Catalog = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse catalog: {}", path.display()))?;

    Ok(Some(catalog))
}

/// Render a catalog as an aligned text table
pub fn render_text(catalog: &Catalog) -> String {
    let mut output = String::new();
    output.push_str(&format!("{:<40} {}\n", "Function", "File"));

    for record in catalog.records() {
        let name = if record.function_name.is_empty() {
            "<unnamed>"
        } else {
            record.function_name.as_str()
        };
        output.push_str(&format!("{} {}\n", truncate_or_pad(name, 40), record.file_path));
    }

    output
}

/// Render a catalog as JSON output
pub fn render_json(catalog: &Catalog) -> String {
    serde_json::to_string_pretty(catalog).unwrap_or_else(|_| "[]".to_string())
}

/// Truncate or pad string to fixed width (in characters)
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample() -> Catalog {
        Catalog::from(vec![
            FunctionRecord::new("load", Path::new("/p/Store.swift")),
            FunctionRecord::new("load", Path::new("/p/Cache.swift")),
            FunctionRecord::new("", Path::new("/p/Odd.swift")),
        ])
    }

    #[test]
    fn test_json_field_names_and_order() {
        let json = Catalog::from(vec![FunctionRecord::new("doWork", Path::new("/a/B.swift"))])
            .to_json()
            .unwrap();
        let name_pos = json.find("\"functionName\"").unwrap();
        let path_pos = json.find("\"filePath\"").unwrap();
        assert!(name_pos < path_pos, "functionName must precede filePath");
        assert!(json.starts_with('['), "catalog is a bare JSON array");
        assert!(json.contains('\n'), "catalog is pretty-printed");
    }

    #[test]
    fn test_duplicates_preserved_in_order() {
        let catalog = sample();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.records()[0].file_path, "/p/Store.swift");
        assert_eq!(catalog.records()[1].file_path, "/p/Cache.swift");
    }

    #[test]
    fn test_persist_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join(".devtools");

        let outcome = persist_catalog(&sidecar, &sample()).unwrap();
        assert_eq!(outcome, CatalogPersistence::Written(catalog_path(&sidecar)));

        let loaded = load_catalog(&sidecar).unwrap().unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_persist_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().to_path_buf();
        persist_catalog(&sidecar, &sample()).unwrap();
        let before = fs::read(catalog_path(&sidecar)).unwrap();

        let replacement = Catalog::from(vec![FunctionRecord::new("other", Path::new("/x.swift"))]);
        let outcome = persist_catalog(&sidecar, &replacement).unwrap();

        assert!(matches!(outcome, CatalogPersistence::AlreadyExists(_)));
        assert_eq!(fs::read(catalog_path(&sidecar)).unwrap(), before);
    }

    #[test]
    fn test_load_missing_catalog() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_catalog(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_catalog_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(catalog_path(dir.path()), "not json").unwrap();
        assert!(load_catalog(dir.path()).is_err());
    }

    #[test]
    fn test_render_text_marks_unnamed() {
        let text = render_text(&sample());
        assert!(text.contains("<unnamed>"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_for_file() {
        let catalog = sample();
        let names: Vec<_> = catalog
            .for_file("/p/Store.swift")
            .map(|r| r.function_name.as_str())
            .collect();
        assert_eq!(names, vec!["load"]);
    }
}
