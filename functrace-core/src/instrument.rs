//! Tree instrumentor
//!
//! Walks a directory of Swift sources, injects timing probes after every
//! detected function declaration, and persists the resulting catalog once.
//!
//! Global invariants enforced:
//! - One file's failure never aborts the walk
//! - Files already carrying the marker are neither rewritten nor cataloged
//! - Per-file work shares no mutable state; outcomes are folded on the calling thread
//! - Lines that are not declarations are copied byte-for-byte, terminators included

use crate::catalog::{self, Catalog, CatalogPersistence, FunctionRecord};
use crate::classify::{LineClassifier, SwiftLineClassifier};
use crate::config::ResolvedConfig;
use crate::error::InstrumentError;
use crate::progress::{ProgressSignal, DEFAULT_RESET_DELAY};
use crate::tracker::{self, Boilerplate, MARKER};
use crate::writer::{AtomicWriter, SourceWriter};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options for one walk
#[derive(Debug)]
pub struct InstrumentOptions {
    /// Directory receiving the catalog file
    pub sidecar_dir: PathBuf,
    /// Source of the trailer appended after an entry point
    pub boilerplate: Boilerplate,
    /// Process files on the rayon pool
    pub parallel: bool,
    /// Delay before the progress signal returns to idle
    pub reset_delay: Duration,
    /// Include/exclude filter matched against root-relative paths
    pub filter: Option<ResolvedConfig>,
}

impl InstrumentOptions {
    pub fn new(sidecar_dir: impl Into<PathBuf>) -> Self {
        InstrumentOptions {
            sidecar_dir: sidecar_dir.into(),
            boilerplate: Boilerplate::Embedded,
            parallel: true,
            reset_delay: DEFAULT_RESET_DELAY,
            filter: None,
        }
    }
}

/// Summary of a completed walk
#[derive(Debug)]
pub struct InstrumentOutcome {
    /// Every record found in this walk, whether or not it was persisted
    pub catalog: Catalog,
    pub persistence: CatalogPersistence,
    /// Files written back with probes or a trailer
    pub files_instrumented: usize,
    /// Files that needed no change
    pub files_unchanged: usize,
    /// Files skipped because they already carry the marker
    pub files_already_instrumented: usize,
    /// Files that could not be read or written
    pub files_failed: usize,
}

impl InstrumentOutcome {
    /// Nothing scanned, nothing persisted
    fn empty() -> Self {
        InstrumentOutcome {
            catalog: Catalog::new(),
            persistence: CatalogPersistence::Skipped,
            files_instrumented: 0,
            files_unchanged: 0,
            files_already_instrumented: 0,
            files_failed: 0,
        }
    }
}

/// Per-file scan state, carried line to line
#[derive(Debug, Default)]
pub struct ScanState {
    pub inside_block_comment: bool,
    pub found_entry_point: bool,
    pub output: String,
    pub records: Vec<FunctionRecord>,
}

/// Result of what a single file contributes to the walk
#[derive(Debug)]
enum FileOutcome {
    Rewritten(Vec<FunctionRecord>),
    Unchanged,
    /// Records are kept even though the rewrite never reached disk
    WriteFailed(Vec<FunctionRecord>),
    AlreadyInstrumented,
    Unreadable,
}

/// Rewrite one file's text, returning the final scan state
///
/// The trailer is not appended here; see [`Instrumentor`].
pub fn rewrite_source(source: &str, path: &Path, classifier: &dyn LineClassifier) -> ScanState {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut state = ScanState {
        output: String::with_capacity(source.len()),
        ..ScanState::default()
    };

    for line in source.split_inclusive('\n') {
        scan_line(line, path, &file_name, classifier, &mut state);
    }

    state
}

fn scan_line(
    line: &str,
    path: &Path,
    file_name: &str,
    classifier: &dyn LineClassifier,
    state: &mut ScanState,
) {
    let comment = classifier.comment_state(line, state.inside_block_comment);
    state.inside_block_comment = comment.inside_block_comment;
    if comment.is_comment_line {
        state.output.push_str(line);
        return;
    }

    let trimmed = line.trim();

    if classifier.is_entry_point(trimmed) {
        state.found_entry_point = true;
    }

    if !classifier.is_function_declaration(trimmed) {
        state.output.push_str(line);
        return;
    }

    let function_name = classifier.function_name(trimmed);

    state.output.push_str(MARKER);
    state.output.push('\n');
    state.output.push_str(line);
    if !line.ends_with('\n') {
        state.output.push('\n');
    }
    state
        .output
        .push_str(&tracker::injected_statements(&function_name, file_name));

    state.records.push(FunctionRecord::new(function_name, path));
}

/// Drives a walk with a pluggable classifier and writer
#[derive(Debug, Default)]
pub struct Instrumentor<C = SwiftLineClassifier, W = AtomicWriter> {
    classifier: C,
    writer: W,
}

impl Instrumentor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: LineClassifier, W: SourceWriter> Instrumentor<C, W> {
    pub fn with_classifier<C2: LineClassifier>(self, classifier: C2) -> Instrumentor<C2, W> {
        Instrumentor {
            classifier,
            writer: self.writer,
        }
    }

    pub fn with_writer<W2: SourceWriter>(self, writer: W2) -> Instrumentor<C, W2> {
        Instrumentor {
            classifier: self.classifier,
            writer,
        }
    }

    /// Instrument every eligible file under `root` and persist the catalog
    ///
    /// Never fails: per-file errors are logged and counted, and an
    /// unreadable root yields an empty, unpersisted catalog.
    pub fn run(
        &self,
        root: &Path,
        options: &InstrumentOptions,
        progress: &ProgressSignal,
    ) -> InstrumentOutcome {
        progress.begin();

        // Records carry absolute paths whatever form the caller used
        let root = match absolute_root(root) {
            Ok(root) => root,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "cannot resolve root; nothing instrumented");
                progress.complete(options.reset_delay);
                return InstrumentOutcome::empty();
            }
        };
        let root = root.as_path();

        let files = match crate::collect_source_files(root) {
            Ok(files) => files,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "cannot enumerate root; nothing instrumented");
                progress.complete(options.reset_delay);
                return InstrumentOutcome::empty();
            }
        };

        let files: Vec<PathBuf> = match &options.filter {
            Some(filter) => files
                .into_iter()
                .filter(|path| {
                    let relative = path.strip_prefix(root).unwrap_or(path);
                    filter.should_include(relative)
                })
                .collect(),
            None => files,
        };

        progress.set_total(files.len());
        debug!(root = %root.display(), files = files.len(), "instrumenting");

        let process = |path: &PathBuf| {
            let outcome = self.process_file(path, &options.boilerplate);
            progress.file_finished();
            outcome
        };
        let outcomes: Vec<FileOutcome> = if options.parallel {
            files.par_iter().map(process).collect()
        } else {
            files.iter().map(process).collect()
        };

        let mut summary = InstrumentOutcome::empty();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Rewritten(records) => {
                    summary.files_instrumented += 1;
                    summary.catalog.extend(records);
                }
                FileOutcome::Unchanged => summary.files_unchanged += 1,
                FileOutcome::WriteFailed(records) => {
                    summary.files_failed += 1;
                    summary.catalog.extend(records);
                }
                FileOutcome::AlreadyInstrumented => summary.files_already_instrumented += 1,
                FileOutcome::Unreadable => summary.files_failed += 1,
            }
        }

        summary.persistence = persist(&options.sidecar_dir, &summary.catalog);

        if summary.files_failed > 0 {
            warn!("{} file(s) could not be instrumented", summary.files_failed);
        }
        progress.complete(options.reset_delay);
        summary
    }

    fn process_file(&self, path: &Path, boilerplate: &Boilerplate) -> FileOutcome {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(source) => {
                let err = InstrumentError::FileUnreadable {
                    path: path.to_path_buf(),
                    source,
                };
                warn!("skipping file: {}", err);
                return FileOutcome::Unreadable;
            }
        };

        if source.contains(MARKER) {
            debug!(path = %path.display(), "already instrumented");
            return FileOutcome::AlreadyInstrumented;
        }

        let mut state = rewrite_source(&source, path, &self.classifier);

        if state.found_entry_point {
            match boilerplate.load() {
                Ok(Some(code)) => state.output.push_str(&tracker::trailer(&code)),
                Ok(None) => {}
                Err(e) => warn!("omitting trailer for {}: {}", path.display(), e),
            }
        }

        if state.output == source {
            return FileOutcome::Unchanged;
        }

        match self.writer.write(path, &state.output) {
            Ok(()) => FileOutcome::Rewritten(state.records),
            Err(source) => {
                let err = InstrumentError::FileUnwritable {
                    path: path.to_path_buf(),
                    source,
                };
                warn!("{}", err);
                FileOutcome::WriteFailed(state.records)
            }
        }
    }
}

fn absolute_root(root: &Path) -> std::io::Result<PathBuf> {
    if root.is_absolute() {
        Ok(root.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(root))
    }
}

fn persist(sidecar_dir: &Path, catalog: &Catalog) -> CatalogPersistence {
    match catalog::persist_catalog(sidecar_dir, catalog) {
        Ok(CatalogPersistence::Written(path)) => {
            info!("saved {} function(s) to {}", catalog.len(), path.display());
            CatalogPersistence::Written(path)
        }
        Ok(CatalogPersistence::AlreadyExists(path)) => {
            info!("catalog already exists at {}, not overwriting", path.display());
            CatalogPersistence::AlreadyExists(path)
        }
        Ok(other) => other,
        Err(e) => {
            warn!("{}", e);
            CatalogPersistence::Failed(catalog::catalog_path(sidecar_dir))
        }
    }
}

/// Instrument `root` with default options and return the in-memory catalog
pub fn instrument(root: &Path, sidecar_dir: &Path) -> Catalog {
    instrument_with(root, &InstrumentOptions::new(sidecar_dir), &ProgressSignal::new()).catalog
}

/// Instrument `root` with the default classifier and atomic writer
pub fn instrument_with(
    root: &Path,
    options: &InstrumentOptions,
    progress: &ProgressSignal,
) -> InstrumentOutcome {
    Instrumentor::new().run(root, options, progress)
}

/// Run a walk on a background thread; observe it through `progress`
pub fn spawn_instrument(
    root: PathBuf,
    options: InstrumentOptions,
    progress: ProgressSignal,
) -> JoinHandle<InstrumentOutcome> {
    // Enter Processing before returning so observers never see a stale Idle
    progress.begin();
    std::thread::spawn(move || instrument_with(&root, &options, &progress))
}
