//! Ferry - Command-line interface for the transfer engine.
//!
//! A thin host around the engine: it parses arguments, builds a transfer
//! request, prints progress samples to stderr and reports the outcome.

use clap::Parser;
use ferry_engine::{
    CompletionListener, ConflictAction, ConflictResolutionTable, FileEntry, ListenerHandle, LocalStorage, Mode,
    ProgressSample, ProgressSink, TransferConfig, TransferEngine, TransferRequest, TransferResult,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Ferry - copy or move files and folders into one destination
#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(version = "0.1.0")]
#[command(about = "Copy or move files and directories with progress tracking")]
struct Args {
    /// Files and directories to transfer
    #[arg(value_name = "SOURCES", required = true)]
    sources: Vec<PathBuf>,

    /// Destination directory
    #[arg(long, value_name = "PATH")]
    dst: PathBuf,

    /// Operation mode: copy or move
    #[arg(long, value_name = "MODE", default_value = "copy")]
    mode: String,

    /// Global conflict policy: skip or overwrite
    #[arg(long, value_name = "POLICY")]
    conflict: Option<String>,

    /// Overwrite this destination path if it exists (repeatable)
    #[arg(long = "overwrite-path", value_name = "PATH")]
    overwrite_paths: Vec<PathBuf>,

    /// Keep this destination path if it exists (repeatable)
    #[arg(long = "skip-path", value_name = "PATH")]
    skip_paths: Vec<PathBuf>,

    /// Only copy images, videos and gifs
    #[arg(long)]
    media_only: bool,

    /// Include hidden files in size estimates
    #[arg(long)]
    hidden: bool,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,

    /// JSON engine configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Copy modification times onto transferred files
    #[arg(long)]
    keep_last_modified: bool,
}

/// How a completed run ended, mapped onto the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Complete,
    Partial,
    Failed,
}

impl Outcome {
    fn from_result(result: &TransferResult) -> Self {
        if !result.success {
            Outcome::Failed
        } else if result.all_transferred() {
            Outcome::Complete
        } else {
            Outcome::Partial
        }
    }

    fn exit_code(self) -> i32 {
        match self {
            Outcome::Complete => 0,
            Outcome::Partial => 1,
            Outcome::Failed => 2,
        }
    }
}

/// CLI progress sink: a bar on stderr
struct CliProgress {
    verbose: bool,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress { verbose }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: std::time::Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn print_progress_bar(percent: u32) -> String {
        let filled = (percent.min(100) / 5) as usize;
        let empty = 20 - filled;
        format!("[{}{}] {}%", "=".repeat(filled), " ".repeat(empty), percent)
    }
}

impl ProgressSink for CliProgress {
    fn on_progress(&self, sample: ProgressSample) {
        if self.verbose {
            eprint!(
                "\rProgress: {} | {}/{} | {}",
                Self::print_progress_bar(sample.percent()),
                Self::format_bytes(sample.bytes_done),
                Self::format_bytes(sample.bytes_total),
                sample.current_filename
            );
        } else {
            eprint!(
                "\rProgress: {} | {}/{}",
                Self::print_progress_bar(sample.percent()),
                Self::format_bytes(sample.bytes_done),
                Self::format_bytes(sample.bytes_total)
            );
        }
        let _ = std::io::Write::flush(&mut std::io::stderr());
    }
}

/// Prints the terminal outcome of a run
struct CliListener {
    start_time: Instant,
}

impl CliListener {
    fn new() -> Self {
        CliListener {
            start_time: Instant::now(),
        }
    }
}

impl CompletionListener for CliListener {
    fn on_copy_succeeded(&self, copy_only: bool, all_transferred: bool, destination: &str) {
        eprintln!();
        if copy_only {
            eprintln!("Copy complete!");
        } else {
            eprintln!("Move complete!");
        }
        eprintln!("  Destination: {}", destination);
        if !all_transferred {
            eprintln!("  Some items were not transferred completely");
        }
        eprintln!("  Elapsed: {}", CliProgress::format_duration(self.start_time.elapsed()));
    }

    fn on_copy_failed(&self, message: &str) {
        eprintln!();
        eprintln!("Transfer failed: {}", message);
    }

    fn on_warning(&self, message: &str) {
        eprintln!();
        eprintln!("Warning: {}", message);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse arguments, run the transfer, and exit with its outcome
fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    tracing::debug!(?args, "parsed arguments");

    let exit_code = match run_cli(&args) {
        Ok(outcome) => outcome.exit_code(),
        Err(msg) => {
            eprintln!("Error: {}", msg);
            Outcome::Failed.exit_code()
        }
    };

    std::process::exit(exit_code);
}

fn path_string(path: &Path) -> String {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches('/');
    if trimmed.is_empty() {
        text.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Destination key for a per-path resolution; relative paths are taken
/// relative to the destination directory.
fn resolution_key(dst: &str, path: &Path) -> String {
    if path.is_absolute() {
        path_string(path)
    } else {
        ferry_engine::paths::join(dst, &path_string(path))
    }
}

fn parse_action(value: &str) -> Result<ConflictAction, String> {
    match value.to_lowercase().as_str() {
        "skip" => Ok(ConflictAction::Skip),
        "overwrite" => Ok(ConflictAction::Overwrite),
        _ => Err(format!(
            "Invalid conflict policy '{}'. Must be 'skip' or 'overwrite'",
            value
        )),
    }
}

fn build_resolutions(args: &Args, dst: &str) -> Result<ConflictResolutionTable, String> {
    let mut table = match &args.conflict {
        Some(policy) => ConflictResolutionTable::global(parse_action(policy)?),
        None => ConflictResolutionTable::new(),
    };

    if table.global_action().is_some() && !(args.overwrite_paths.is_empty() && args.skip_paths.is_empty()) {
        return Err("--conflict cannot be combined with --overwrite-path or --skip-path".to_string());
    }

    for path in &args.overwrite_paths {
        table.insert(resolution_key(dst, path), ConflictAction::Overwrite);
    }
    for path in &args.skip_paths {
        table.insert(resolution_key(dst, path), ConflictAction::Skip);
    }
    Ok(table)
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<Outcome, String> {
    for source in &args.sources {
        if !source.exists() {
            return Err(format!("Source does not exist: {}", source.display()));
        }
    }

    if !args.dst.is_dir() {
        return Err(format!("Destination is not a directory: {}", args.dst.display()));
    }

    let mode = match args.mode.to_lowercase().as_str() {
        "copy" => Mode::Copy,
        "move" => Mode::Move,
        _ => {
            return Err(format!(
                "Invalid mode '{}'. Must be 'copy' or 'move'",
                args.mode
            ))
        }
    };

    let mut config = match &args.config {
        Some(path) => TransferConfig::load(path).map_err(|e| format!("Config load failed: {}", e))?,
        None => TransferConfig::default(),
    };
    if args.keep_last_modified {
        config.keep_last_modified = true;
    }

    let dst = path_string(&args.dst);
    let resolutions = build_resolutions(args, &dst)?;
    let sources = args
        .sources
        .iter()
        .map(|path| FileEntry::unresolved(path_string(path), path.is_dir()))
        .collect();

    let request = TransferRequest::new(sources, dst, mode)
        .with_resolutions(resolutions)
        .media_only(args.media_only)
        .include_hidden(args.hidden);

    let engine = TransferEngine::new(Arc::new(LocalStorage::new()), config);
    let listener: Arc<dyn CompletionListener> = Arc::new(CliListener::new());
    let progress = Arc::new(CliProgress::new(args.verbose));

    let worker = engine
        .spawn(request, progress, ListenerHandle::from_arc(&listener))
        .map_err(|e| format!("Could not start transfer: {}", e))?;
    let result = worker
        .join()
        .map_err(|_| "Transfer worker panicked".to_string())?;

    eprintln!(
        "Summary: {} of {} items transferred",
        result.transferred_top_level_count, result.expected_count
    );

    Ok(Outcome::from_result(&result))
}
