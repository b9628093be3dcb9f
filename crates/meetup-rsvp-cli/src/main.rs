//! meetup-rsvp - RSVP report for a MeetupPro network.
//!
//! Fetches every event of the configured network plus each event's RSVPs
//! and prints a report to stdout. Logs go to stderr and a log file.

use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, info_span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use meetup_rsvp_core::{ConfigManager, OutputFormat, RsvpFetcher};

// ============================================================================
// Constants
// ============================================================================

/// Fallback level when neither RUST_LOG nor MEETUP_LOG_LEVEL is set
const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVEL_ENV: &str = "MEETUP_LOG_LEVEL";
const LOG_FILE_ENV: &str = "MEETUP_LOG_FILE";
const LOG_DETAILED_ENV: &str = "MEETUP_LOG_DETAILED";

/// Default log directory, relative to the home directory
const LOG_DIR: &str = ".meetup_rsvp_fetcher/logs";
const LOG_FILE_PREFIX: &str = "meetup_rsvp_fetcher";

const USAGE: &str = "\
Usage: meetup-rsvp [--config <path>] [--json] [--help]

Options:
  --config <path>  JSON config file (default: config.json)
  --json           Print the report as JSON
  --help           Show this message

Credentials and settings may also come from MEETUP_* environment variables
or a .env file in the working directory.";

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    config: Option<PathBuf>,
    format: OutputFormat,
}

/// `Ok(None)` means help was requested.
fn parse_args<I>(args: I) -> Result<Option<CliArgs>>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--json" => parsed.format = OutputFormat::Json,
            "--config" => match args.next() {
                Some(path) => parsed.config = Some(PathBuf::from(path)),
                None => bail!("--config requires a path"),
            },
            other => match other.strip_prefix("--config=") {
                Some(path) if !path.is_empty() => parsed.config = Some(PathBuf::from(path)),
                _ => bail!("Unknown argument: {}", other),
            },
        }
    }
    Ok(Some(parsed))
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// File appender per MEETUP_LOG_FILE: a fixed file, "off", or (unset) a
/// daily-rolling file under the home directory.
fn log_file_appender() -> Result<Option<RollingFileAppender>> {
    let (rotation, dir, prefix) = match std::env::var(LOG_FILE_ENV) {
        Ok(value) if value.trim().eq_ignore_ascii_case("off") => return Ok(None),
        Ok(value) if !value.trim().is_empty() => {
            let path = PathBuf::from(value.trim());
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("Invalid log file path: {}", path.display()))?
                .to_string();
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .to_path_buf();
            (Rotation::NEVER, dir, name)
        }
        _ => {
            let Some(home) = dirs::home_dir() else {
                return Ok(None);
            };
            (Rotation::DAILY, home.join(LOG_DIR), format!("{}.log", LOG_FILE_PREFIX))
        }
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(prefix)
        .build(&dir)
        .with_context(|| format!("Could not open log directory {}", dir.display()))?;
    Ok(Some(appender))
}

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the file writer when dropped.
fn init_tracing() -> Option<WorkerGuard> {
    // RUST_LOG wins, then MEETUP_LOG_LEVEL, then the default
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(
                std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
            )
        })
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let detailed = env_flag(LOG_DETAILED_ENV);

    let (file_writer, guard) = match log_file_appender() {
        Ok(Some(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        Ok(None) => (None, None),
        Err(e) => {
            eprintln!("Warning: file logging disabled: {:#}", e);
            (None, None)
        }
    };

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(detailed)
            .with_line_number(detailed)
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_file(detailed)
                .with_line_number(detailed),
        )
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

async fn run(args: CliArgs) -> Result<()> {
    let span = info_span!("meetup_rsvp", version = env!("CARGO_PKG_VERSION"));
    let manager = ConfigManager::new(args.config);
    span.in_scope(|| info!(config = %manager.path().display(), "Meetup RSVP fetcher starting"));

    let mut fetcher = RsvpFetcher::new(manager, span);
    let mut out = BufWriter::new(io::stdout());
    fetcher
        .run(&mut out, args.format)
        .await
        .context("Workflow failed")
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("{}", USAGE);
            return;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    };

    let guard = init_tracing();
    let result = run(args).await;
    drop(guard);

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
