//! Command-line interface for ecocode.

use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::analysis::{FunctionId, SourceUnit};
use crate::config::{self, AnalysisConfig, Config};
use crate::report::{self, FileAnalysis, FileError};
use crate::session::AnalysisSession;
use crate::suggest::{Orchestrator, ProviderLedger};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

const CONFIG_TEMPLATE: &str = include_str!("templates/ecocode.yaml");

/// Directories never descended into when collecting files.
const SKIPPED_DIRS: &[&str] = &["__pycache__", "node_modules", "venv", "site-packages", "build", "dist"];

/// Energy hotspot finder for Python code.
///
/// Ranks functions by a structural cost score (loop nesting, container growth,
/// recursion, call fan-out) and asks an AI provider for leaner rewrites.
#[derive(Parser)]
#[command(name = "ecocode")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank the functions of Python files by estimated cost
    #[command(visible_alias = "scan")]
    Analyze(AnalyzeArgs),
    /// Ask the configured providers for a leaner version of one function
    Suggest(SuggestArgs),
    /// Write a starter ecocode.yaml
    Init(InitArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Arguments for the analyze command.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Files or directories to analyze
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long, env = "ECOCODE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,

    /// Override analysis.max_source_bytes
    #[arg(long)]
    pub max_bytes: Option<usize>,

    /// Show at most this many hotspots per file (pretty output only)
    #[arg(short, long)]
    pub top: Option<usize>,
}

/// Arguments for the suggest command.
#[derive(Args)]
pub struct SuggestArgs {
    /// Python file containing the function
    pub file: PathBuf,

    /// Function id as printed by `analyze` (e.g. `Tree.depth@12`)
    #[arg(long = "function", short = 'F')]
    pub function: String,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long, env = "ECOCODE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

/// Arguments for the init command.
#[derive(Args)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "ecocode.yaml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Load config, reporting problems as usage errors.
fn load_config(explicit: Option<&Path>) -> Result<Config, i32> {
    match Config::load(explicit) {
        Ok((config, path)) => {
            match path {
                Some(p) => debug!(path = %p.display(), "loaded config"),
                None => debug!("no config file found, using defaults"),
            }
            Ok(config)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            Err(EXIT_ERROR)
        }
    }
}

/// Collect Python files under `root`.
pub fn collect_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref())
        })
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("py") {
                files.push(path.to_path_buf());
            }
        }
    }

    Ok(files)
}

/// Read and analyze one file.
pub fn analyze_file(path: &Path, config: &AnalysisConfig) -> Result<AnalysisSession, FileError> {
    let text = std::fs::read_to_string(path).map_err(|source| FileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let unit = SourceUnit::new(text, "python").with_filename(path.display().to_string());
    Ok(AnalysisSession::submit_unit(unit, config)?)
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    let mut config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(code) => return Ok(code),
    };
    if let Some(max) = args.max_bytes {
        if max == 0 {
            eprintln!("Error: --max-bytes must be greater than 0");
            return Ok(EXIT_ERROR);
        }
        config.analysis.max_source_bytes = max;
    }

    let mut files = Vec::new();
    for path in &args.paths {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("Error: cannot access path {:?}: {}", path, e);
                return Ok(EXIT_ERROR);
            }
        };
        if metadata.is_dir() {
            files.extend(collect_files(path)?);
        } else {
            files.push(path.clone());
        }
    }

    if files.is_empty() {
        eprintln!("Warning: no Python files to analyze");
        return Ok(EXIT_SUCCESS);
    }

    let analysis = &config.analysis;
    let mut results: Vec<FileAnalysis> = files
        .par_iter()
        .map(|path| {
            let outcome = analyze_file(path, analysis).map(|s| s.report());
            if let Err(FileError::Read { source, .. }) = &outcome {
                warn!(path = %path.display(), error = %source, "cannot read file");
            }
            FileAnalysis {
                path: path.clone(),
                outcome,
            }
        })
        .collect();
    results.sort_by(|a, b| a.path.cmp(&b.path));

    match args.format {
        OutputFormat::Json => report::write_analyze_json(&results)?,
        OutputFormat::Pretty => report::write_analyze_pretty(&results, args.top),
    }

    if results.iter().any(|r| r.outcome.is_err()) {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the suggest command.
pub fn run_suggest(args: &SuggestArgs) -> anyhow::Result<i32> {
    let config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(code) => return Ok(code),
    };

    let session = match analyze_file(&args.file, &config.analysis) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(EXIT_FAILED);
        }
    };

    let id = FunctionId::from(args.function.as_str());
    if let Err(e) = session.select_hotspot(&id) {
        eprintln!("Error: {}", e);
        let known: Vec<String> = session
            .hotspots()
            .iter()
            .map(|h| h.function_id.to_string())
            .collect();
        if !known.is_empty() {
            eprintln!("Known functions: {}", known.join(", "));
        }
        return Ok(EXIT_FAILED);
    }

    let orchestrator = match Orchestrator::from_config(&config.suggestion, Arc::new(ProviderLedger::new())) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            eprintln!("Run 'ecocode init' to create a config file with providers");
            return Ok(EXIT_ERROR);
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let spinner = if args.format == OutputFormat::Pretty {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("Asking providers about {}", id));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };

    let result = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });
        session.suggest(&id, &orchestrator, &cancel).await
    });
    spinner.finish_and_clear();

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_FAILED);
        }
    };

    match args.format {
        OutputFormat::Json => report::write_suggestion_json(&result)?,
        OutputFormat::Pretty => report::write_suggestion_pretty(&result),
    }

    if result.is_success() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() && !args.force {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Use --force to overwrite or --output to pick another path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, CONFIG_TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Set the provider endpoints and API key variables in {}", args.output.display());
    println!("  2. Run: ecocode analyze . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}

/// Check that the bundled template is itself a valid config.
pub fn template_config() -> anyhow::Result<Config> {
    let config = Config::parse_str(CONFIG_TEMPLATE)?;
    config::validate(&config)?;
    Ok(config)
}
