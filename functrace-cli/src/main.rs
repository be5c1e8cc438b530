//! functrace CLI - function timing instrumentation for Swift projects

#![deny(warnings)]

// Global invariants enforced:
// - The walk runs off the main thread; the main thread only observes progress
// - Per-file failures are logged, never fatal

use anyhow::Context;
use clap::{Parser, Subcommand};
use functrace_core::catalog::{self, CatalogPersistence};
use functrace_core::config::{self, ResolvedConfig};
use functrace_core::tracker::Boilerplate;
use functrace_core::{spawn_instrument, InstrumentOutcome, ProcessingState, ProgressSignal};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "functrace")]
#[command(about = "Inject function timing probes into Swift source trees")]
#[command(version = env!("FUNCTRACE_VERSION"))]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Instrument every Swift file under a directory
    Instrument {
        /// Project directory to instrument
        path: PathBuf,

        /// Path to config file (default: auto-discover in PATH)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Sidecar directory for the function catalog (overrides config file)
        #[arg(long)]
        sidecar: Option<PathBuf>,

        /// Timing collector source appended after `@main` (overrides config file)
        #[arg(long, conflicts_with = "no_trailer")]
        boilerplate: Option<PathBuf>,

        /// Never append the timing collector trailer
        #[arg(long)]
        no_trailer: bool,

        /// Process files one at a time
        #[arg(long)]
        sequential: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// List the functions recorded in a project's catalog
    Functions {
        /// Project directory that was instrumented
        path: PathBuf,

        /// Sidecar directory holding the catalog (default: from config)
        #[arg(long)]
        sidecar: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate or show configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Check the config `instrument PATH` would use, without touching any file
    Validate {
        #[command(flatten)]
        target: ConfigTarget,
    },
    /// Print the settings `instrument PATH` would run with
    Show {
        #[command(flatten)]
        target: ConfigTarget,
    },
}

/// Which project (and optionally which file) a `config` subcommand inspects
#[derive(clap::Args)]
struct ConfigTarget {
    /// Project directory (default: current directory)
    path: Option<PathBuf>,

    /// Config file to use instead of discovering one in PATH
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Instrument {
            path,
            config: config_path,
            sidecar,
            boilerplate,
            no_trailer,
            sequential,
            format,
        } => {
            let root = normalize_dir(&path)?;
            let config_path = config_path.map(|p| absolute(&p)).transpose()?;
            let resolved = config::load_and_resolve(&root, config_path.as_deref())
                .context("failed to load configuration")?;

            if let Some(config_path) = &resolved.config_path {
                eprintln!("Using config: {}", config_path.display());
            }

            // CLI flags override config file values
            let mut options = resolved.instrument_options(&root);
            if let Some(sidecar) = sidecar {
                options.sidecar_dir = root.join(sidecar);
            }
            if let Some(boilerplate) = boilerplate {
                options.boilerplate = Boilerplate::File(absolute(&boilerplate)?);
            }
            if no_trailer {
                options.boilerplate = Boilerplate::Disabled;
            }
            if sequential {
                options.parallel = false;
            }
            tracing::debug!(?options, "resolved instrument options");

            let progress = ProgressSignal::new();
            let handle = spawn_instrument(root.clone(), options, progress.clone());
            let outcome = await_walk(handle, &progress, &spinner())?;

            match format {
                OutputFormat::Text => print!("{}", render_summary(&root, &outcome)),
                OutputFormat::Json => println!("{}", catalog::render_json(&outcome.catalog)),
            }
        }
        Commands::Functions {
            path,
            sidecar,
            format,
        } => {
            let root = normalize_dir(&path)?;
            let sidecar_dir = match sidecar {
                Some(dir) => root.join(dir),
                None => {
                    let resolved = config::load_and_resolve(&root, None)
                        .context("failed to load configuration")?;
                    root.join(&resolved.sidecar_dir)
                }
            };

            let Some(functions) = catalog::load_catalog(&sidecar_dir)? else {
                anyhow::bail!(
                    "no function catalog at {} (run `functrace instrument` first)",
                    catalog::catalog_path(&sidecar_dir).display()
                );
            };

            match format {
                OutputFormat::Text => print!("{}", catalog::render_text(&functions)),
                OutputFormat::Json => println!("{}", catalog::render_json(&functions)),
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { target } => {
                let (root, resolved) = resolve_target(target)?;
                match &resolved.config_path {
                    Some(p) => println!("{}: ok", p.display()),
                    None => println!(
                        "No .functracerc.json or functrace.config.json in {}; defaults apply",
                        root.display()
                    ),
                }
            }
            ConfigAction::Show { target } => {
                let (_, resolved) = resolve_target(target)?;
                print!("{}", render_config(&resolved));
            }
        },
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Anchor a relative path at the current directory
fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_relative() {
        Ok(std::env::current_dir()?.join(path))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Resolve `path` to an absolute directory
fn normalize_dir(path: &Path) -> anyhow::Result<PathBuf> {
    let normalized = absolute(path)?;

    if !normalized.is_dir() {
        anyhow::bail!("Not a directory: {}", normalized.display());
    }

    Ok(normalized)
}

/// Project root and resolved config for a `config` subcommand
///
/// Discovery runs in the project directory, as it does for `instrument`.
fn resolve_target(target: ConfigTarget) -> anyhow::Result<(PathBuf, ResolvedConfig)> {
    let root = normalize_dir(target.path.as_deref().unwrap_or(Path::new(".")))?;
    let explicit = target.config.map(|p| absolute(&p)).transpose()?;
    let resolved = config::load_and_resolve(&root, explicit.as_deref())
        .with_context(|| format!("invalid functrace config for {}", root.display()))?;
    Ok((root, resolved))
}

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Drive `bar` from the progress signal until the worker exits, then join it
///
/// The loop watches the thread rather than the signal, so a worker that dies
/// mid-walk is reported instead of leaving the signal stuck in `Processing`.
fn await_walk<T>(
    handle: JoinHandle<T>,
    progress: &ProgressSignal,
    bar: &ProgressBar,
) -> anyhow::Result<T> {
    while !handle.is_finished() {
        let total = progress.files_total();
        if progress.state() == ProcessingState::Processing && total > 0 {
            bar.set_message(format!(
                "Instrumenting Swift files {}/{}",
                progress.files_done(),
                total
            ));
        } else {
            bar.set_message("Scanning for Swift files");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    bar.finish_and_clear();

    handle
        .join()
        .map_err(|_| anyhow::anyhow!("instrumentation thread panicked"))
}

fn render_summary(root: &Path, outcome: &InstrumentOutcome) -> String {
    let mut output = String::new();
    output.push_str(&format!("Instrumented {}\n", root.display()));
    output.push_str(&format!("  functions found:       {}\n", outcome.catalog.len()));
    output.push_str(&format!("  files instrumented:    {}\n", outcome.files_instrumented));
    output.push_str(&format!("  files unchanged:       {}\n", outcome.files_unchanged));
    output.push_str(&format!(
        "  already instrumented:  {}\n",
        outcome.files_already_instrumented
    ));
    output.push_str(&format!("  failed:                {}\n", outcome.files_failed));

    let catalog_line = match &outcome.persistence {
        CatalogPersistence::Written(path) => format!("written to {}", path.display()),
        CatalogPersistence::AlreadyExists(path) => {
            format!("kept existing {} (new results not saved)", path.display())
        }
        CatalogPersistence::Skipped => "not written (nothing was scanned)".to_string(),
        CatalogPersistence::Failed(path) => format!("failed to write {}", path.display()),
    };
    output.push_str(&format!("  catalog:               {}\n", catalog_line));
    output
}

fn render_config(resolved: &ResolvedConfig) -> String {
    let mut output = String::from("Configuration:\n");
    match resolved.config_path {
        Some(ref p) => output.push_str(&format!("  Source: {}\n", p.display())),
        None => output.push_str("  Source: defaults (no config file found)\n"),
    }
    output.push('\n');
    output.push_str(&format!("  sidecar_dir: {}\n", resolved.sidecar_dir.display()));
    output.push_str(&format!(
        "  boilerplate: {}\n",
        match (&resolved.boilerplate, resolved.trailer) {
            (_, false) => "disabled".to_string(),
            (Some(p), true) => p.display().to_string(),
            (None, true) => "bundled collector".to_string(),
        }
    ));
    output.push_str(&format!("  parallel: {}\n", resolved.parallel));
    output.push_str(&format!(
        "  reset_delay_ms: {}\n",
        resolved.reset_delay.as_millis()
    ));
    output.push_str(&format!(
        "  include: {}\n",
        if resolved.include.is_some() {
            "custom patterns"
        } else {
            "all .swift files"
        }
    ));
    output.push_str(&format!(
        "  exclude: {}\n",
        if resolved.config_path.is_some() {
            "from config file (defaults when unset)"
        } else {
            "default"
        }
    ));
    output
}
