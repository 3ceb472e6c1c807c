//! Logging Module
//!
//! tracing-based logging shared by the vid-remux binary:
//! - stderr output, optionally mirrored to a log file
//! - structured fields for external tool invocations
//! - one-time initialisation guard
//!
//! # Examples
//!
//! ```no_run
//! use remux_utils::logging::{init_logging, LogConfig};
//! use tracing::{info, Level};
//!
//! init_logging("vid_remux", LogConfig::new().with_level(Level::DEBUG))
//!     .expect("Failed to initialize logging");
//! info!("Program started");
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Targets the configured level applies to. Everything else stays at warn.
const LOG_TARGETS: &[&str] = &["vid_remux", "remux_utils"];

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for this workspace's targets, default Info
    pub level: Level,
    /// Optional file mirror of the stderr log (appended, never rotated)
    pub log_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_file: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.log_file = Some(path.as_ref().to_path_buf());
        self
    }

    fn filter_directives(&self) -> String {
        let level = self.level.as_str().to_lowercase();
        let mut directives = vec!["warn".to_string()];
        directives.extend(LOG_TARGETS.iter().map(|t| format!("{}={}", t, level)));
        directives.join(",")
    }
}

/// Parses a log level name. Accepts the tracing names plus `WARNING` and
/// `CRITICAL`, case-insensitively.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARN" | "WARNING" => Some(Level::WARN),
        "ERROR" | "CRITICAL" => Some(Level::ERROR),
        _ => None,
    }
}

/// Installs the global subscriber. Calls after the first one are no-ops.
///
/// `RUST_LOG` takes precedence over `config.level` when set.
pub fn init_logging(program_name: &str, config: LogConfig) -> Result<()> {
    if LOGGING_INITIALIZED.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let file_layer = match config.log_file.as_deref() {
        Some(path) => {
            let appender = open_log_file(path)?;
            Some(
                fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
        }
        None => None,
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    let _ = LOGGING_INITIALIZED.set(());

    tracing::debug!(
        program = program_name,
        log_file = ?config.log_file,
        level = ?config.level,
        "Logging system initialized"
    );
    if let Some(path) = &config.log_file {
        tracing::info!("Logging to file: {}", path.display());
    }

    Ok(())
}

fn open_log_file(path: &Path) -> Result<RollingFileAppender> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy().into_owned())
        .build(&dir)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}

/// Logs the host facts that matter when reading a failure report.
pub fn log_system_info(program_name: &str, version: &str) {
    tracing::info!(
        program = program_name,
        version = version,
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        cpus = num_cpus::get(),
        "System information"
    );
}

/// Logs a finished external tool invocation.
pub fn log_external_tool(
    tool_name: &str,
    args: &[&str],
    output: &str,
    exit_code: Option<i32>,
    duration: std::time::Duration,
) {
    let command = format!("{} {}", tool_name, args.join(" "));

    match exit_code {
        Some(0) => {
            tracing::debug!(
                tool = tool_name,
                command = %command,
                duration_secs = duration.as_secs_f64(),
                exit_code = 0,
                "External tool completed successfully"
            );
        }
        Some(code) => {
            tracing::error!(
                tool = tool_name,
                command = %command,
                duration_secs = duration.as_secs_f64(),
                exit_code = code,
                output = %output,
                "External tool failed"
            );
        }
        None => {
            tracing::error!(
                tool = tool_name,
                command = %command,
                duration_secs = duration.as_secs_f64(),
                output = %output,
                "External tool terminated without exit code"
            );
        }
    }
}
