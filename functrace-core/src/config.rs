//! Configuration file support for functrace
//!
//! Loads project-specific configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.functracerc.json` in the instrumented root
//! 3. `functrace.config.json` in the instrumented root
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::catalog::DEFAULT_SIDECAR_DIR;
use crate::instrument::InstrumentOptions;
use crate::progress::DEFAULT_RESET_DELAY;
use crate::tracker::Boilerplate;
use anyhow::{Context, Result};
use globset::{Candidate, Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exclude patterns used when the config names none
///
/// The walker itself descends everywhere, so these are what keep hidden
/// directories and dependency checkouts out of a default run.
const DEFAULT_EXCLUDES: &[&str] = &[
    "**/Package.swift",
    "**/.*/**",
    "**/Pods/**",
    "**/Carthage/**",
    "**/DerivedData/**",
    "**/.build/**",
];

/// Upper bound for `reset_delay_ms` (ten minutes)
const MAX_RESET_DELAY_MS: u64 = 600_000;

/// functrace configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctraceConfig {
    /// Glob patterns for files to include, relative to the root (default: every `.swift` file)
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns for files to exclude (default: package manifests and dependency checkouts)
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Sidecar directory holding the catalog, relative to the root (default: `.devtools`)
    #[serde(default)]
    pub sidecar_dir: Option<String>,

    /// Timing collector source to append after entry points (default: bundled collector)
    #[serde(default)]
    pub boilerplate: Option<PathBuf>,

    /// Append the collector trailer to files with an entry point (default: true)
    #[serde(default)]
    pub trailer: Option<bool>,

    /// Process files in parallel (default: true)
    #[serde(default)]
    pub parallel: Option<bool>,

    /// Milliseconds before a completed walk reports idle again (default: 3000)
    #[serde(default)]
    pub reset_delay_ms: Option<u64>,
}

/// Resolved configuration with compiled glob patterns
#[derive(Debug)]
pub struct ResolvedConfig {
    /// Compiled include patterns (None means include all)
    pub include: Option<GlobSet>,
    /// Compiled exclude patterns
    pub exclude: GlobSet,
    /// Sidecar directory, relative to the root unless absolute
    pub sidecar_dir: PathBuf,
    /// Explicit collector source; a config file anchors it at its own directory
    pub boilerplate: Option<PathBuf>,
    pub trailer: bool,
    pub parallel: bool,
    pub reset_delay: Duration,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl FunctraceConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(ref dir) = self.sidecar_dir {
            if dir.trim().is_empty() {
                anyhow::bail!("sidecar_dir must not be empty");
            }
        }

        if self.trailer == Some(false) && self.boilerplate.is_some() {
            anyhow::bail!("boilerplate is set but trailer is disabled");
        }

        if let Some(delay) = self.reset_delay_ms {
            if delay > MAX_RESET_DELAY_MS {
                anyhow::bail!(
                    "reset_delay_ms must be at most {} (got {})",
                    MAX_RESET_DELAY_MS,
                    delay
                );
            }
        }

        // Validate glob patterns compile
        for pattern in &self.include {
            Glob::new(pattern).with_context(|| format!("invalid include pattern: {}", pattern))?;
        }
        for pattern in &self.exclude {
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern: {}", pattern))?;
        }

        Ok(())
    }

    /// Resolve config into compiled form ready for use
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let include = if self.include.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &self.include {
                builder.add(Glob::new(pattern)?);
            }
            Some(builder.build()?)
        };

        // User excludes replace the defaults rather than extending them
        let exclude = {
            let mut builder = GlobSetBuilder::new();
            if self.exclude.is_empty() {
                for pattern in DEFAULT_EXCLUDES {
                    builder.add(Glob::new(pattern)?);
                }
            } else {
                for pattern in &self.exclude {
                    builder.add(Glob::new(pattern)?);
                }
            }
            builder.build()?
        };

        Ok(ResolvedConfig {
            include,
            exclude,
            sidecar_dir: PathBuf::from(
                self.sidecar_dir
                    .as_deref()
                    .unwrap_or(DEFAULT_SIDECAR_DIR),
            ),
            boilerplate: self.boilerplate.clone(),
            trailer: self.trailer.unwrap_or(true),
            parallel: self.parallel.unwrap_or(true),
            reset_delay: self
                .reset_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RESET_DELAY),
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Whether the walk rewrites the file at `relative_path` (relative to the root)
    ///
    /// An exclude match wins over an include match. Components are joined
    /// with `/` so patterns read the same on every platform.
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let joined = relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let candidate = Candidate::new(&joined);

        let wanted = match &self.include {
            Some(include) => include.is_match_candidate(&candidate),
            None => true,
        };
        wanted && !self.exclude.is_match_candidate(&candidate)
    }

    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        FunctraceConfig::default().resolve()
    }

    /// Where the collector trailer comes from, with relative paths anchored at `root`
    pub fn boilerplate_for(&self, root: &Path) -> Boilerplate {
        if !self.trailer {
            return Boilerplate::Disabled;
        }
        match &self.boilerplate {
            Some(path) => Boilerplate::File(root.join(path)),
            None => Boilerplate::Embedded,
        }
    }

    /// Instrumentation options for a walk over `root`
    pub fn instrument_options(self, root: &Path) -> InstrumentOptions {
        InstrumentOptions {
            sidecar_dir: root.join(&self.sidecar_dir),
            boilerplate: self.boilerplate_for(root),
            parallel: self.parallel,
            reset_delay: self.reset_delay,
            filter: Some(self),
        }
    }
}

/// Discover and load a config file from the instrumented root
///
/// Search order:
/// 1. `.functracerc.json`
/// 2. `functrace.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(project_root: &Path) -> Result<Option<(FunctraceConfig, PathBuf)>> {
    for name in [".functracerc.json", "functrace.config.json"] {
        let path = project_root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }

    Ok(None)
}

/// Read, parse and validate one config file
pub fn load_config_file(path: &Path) -> Result<FunctraceConfig> {
    let raw = std::fs::read(path)
        .with_context(|| format!("cannot read functrace config {}", path.display()))?;
    let config: FunctraceConfig = serde_json::from_slice(&raw)
        .with_context(|| format!("{} is not a valid functrace config", path.display()))?;
    config
        .validate()
        .with_context(|| format!("rejected settings in {}", path.display()))?;
    Ok(config)
}

/// Resolve the configuration governing a walk over `project_root`
///
/// An explicit `config_path` bypasses discovery. A relative `boilerplate`
/// in a config file names a file next to that config, not next to the root.
pub fn load_and_resolve(project_root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let found = match config_path {
        Some(path) => Some((load_config_file(path)?, path.to_path_buf())),
        None => discover_config(project_root)?,
    };

    let Some((config, path)) = found else {
        return ResolvedConfig::defaults();
    };

    let mut resolved = config.resolve()?;
    if let Some(boilerplate) = resolved.boilerplate.take() {
        let config_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(project_root);
        resolved.boilerplate = Some(config_dir.join(boilerplate));
    }
    resolved.config_path = Some(path);
    Ok(resolved)
}
