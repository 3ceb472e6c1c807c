use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

use remux_utils::logging::{init_logging, log_system_info, parse_level, LogConfig};
use vid_remux::{run, Container, ConverterConfig, FfmpegToolchain, InputTarget, RunOptions};

#[derive(Parser)]
#[command(name = "vid-remux")]
#[command(
    version,
    about = "Convert DAV and other video files to MKV or MP4 without re-encoding",
    long_about = None
)]
#[command(group(ArgGroup::new("input").required(true).args(["file", "directory"])))]
struct Cli {
    /// Single video file to convert
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Directory of video files to convert
    #[arg(short, long, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Output file (single file) or output directory (directory mode)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Container::Mkv)]
    container: Container,

    /// Overwrite existing outputs (default)
    #[arg(long, default_value_t = true)]
    overwrite: bool,

    /// Never overwrite existing outputs
    #[arg(long, conflicts_with = "overwrite")]
    no_overwrite: bool,

    /// Maximum concurrent conversions in directory mode
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    concurrent: Option<u16>,

    /// Search subdirectories in directory mode
    #[arg(long)]
    recursive: bool,

    /// DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(long, default_value = "INFO", value_parser = parse_log_level)]
    log_level: Level,

    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[arg(long, default_value = "ffmpeg", value_name = "PATH")]
    ffmpeg_bin: PathBuf,

    #[arg(long, default_value = "ffprobe", value_name = "PATH")]
    ffprobe_bin: PathBuf,

    /// Seconds before a hung ffprobe is killed
    #[arg(long, default_value_t = 30, value_name = "SECS")]
    probe_timeout: u64,

    /// Seconds before a hung ffmpeg is killed
    #[arg(long, default_value_t = 3600, value_name = "SECS")]
    transcode_timeout: u64,
}

fn parse_log_level(s: &str) -> Result<Level, String> {
    parse_level(s).ok_or_else(|| {
        format!(
            "invalid log level '{}' (expected DEBUG, INFO, WARNING, ERROR or CRITICAL)",
            s
        )
    })
}

/// Raises the cancel flag. True when it was already raised, i.e. this is the
/// second interrupt and the process should stop without waiting for jobs.
fn request_stop(cancel: &AtomicBool) -> bool {
    cancel.swap(true, Ordering::SeqCst)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::new().with_level(cli.log_level);
    if let Some(path) = &cli.log_file {
        log_config = log_config.with_log_file(path);
    }
    if let Err(e) = init_logging("vid_remux", log_config) {
        eprintln!("⚠️  Logging setup failed: {:#}", e);
    }

    info!("=== Video Remux Converter Starting ===");
    log_system_info("vid-remux", env!("CARGO_PKG_VERSION"));

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        if let Err(e) = ctrlc::set_handler(move || {
            if request_stop(&cancel) {
                eprintln!("⚠️  Second interrupt, exiting now");
                std::process::exit(130);
            }
            warn!("Interrupt received, no new conversions will start (Ctrl-C again to force quit)");
        }) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }
    }

    let target = match (cli.file, cli.directory) {
        (Some(file), _) => InputTarget::File(file),
        (None, Some(dir)) => InputTarget::Directory(dir),
        (None, None) => {
            eprintln!("❌ One of --file or --directory is required");
            return ExitCode::from(1);
        }
    };

    let options = RunOptions {
        target,
        output: cli.output,
        container: cli.container,
        overwrite: cli.overwrite && !cli.no_overwrite,
        recursive: cli.recursive,
        concurrent: cli.concurrent.map(usize::from),
    };

    let toolchain = FfmpegToolchain::new(ConverterConfig {
        ffmpeg_bin: cli.ffmpeg_bin,
        ffprobe_bin: cli.ffprobe_bin,
        probe_timeout: Duration::from_secs(cli.probe_timeout),
        transcode_timeout: Duration::from_secs(cli.transcode_timeout),
    });

    let status = run(&options, &toolchain, cancel);

    info!("=== Video Remux Converter Finished ===");
    ExitCode::from(status.code())
}
