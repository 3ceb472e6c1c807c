//! Run entry point shared by the binary and the end-to-end tests.

use crate::batch_runner::{BatchConverter, BatchOptions};
use crate::container::Container;
use crate::conversion_api::{ConversionRequest, VideoConverter};
use crate::remuxer::{FfmpegRemuxer, Remuxer, DEFAULT_TRANSCODE_TIMEOUT};
use remux_utils::{
    check_tool_pair, format_stats_line, print_summary_report, resolve_worker_count, BatchResult,
    ConvertError, FfprobeProber, MediaProber, ToolError, ToolVersions, DEFAULT_PROBE_TIMEOUT,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// External tool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    pub probe_timeout: Duration,
    pub transcode_timeout: Duration,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            transcode_timeout: DEFAULT_TRANSCODE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputTarget {
    File(PathBuf),
    Directory(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub target: InputTarget,
    /// Output file in file mode, output directory in directory mode.
    pub output: Option<PathBuf>,
    pub container: Container,
    pub overwrite: bool,
    pub recursive: bool,
    /// Worker cap for directory mode; `None` picks `max(1, cpus - 1)`.
    pub concurrent: Option<usize>,
}

impl RunOptions {
    pub fn new(target: InputTarget) -> Self {
        Self {
            target,
            output: None,
            container: Container::default(),
            overwrite: true,
            recursive: false,
            concurrent: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failure,
    PartialSuccess,
    ToolsUnavailable,
    Interrupted,
}

impl RunStatus {
    pub fn code(self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failure => 1,
            RunStatus::PartialSuccess => 2,
            RunStatus::ToolsUnavailable => 127,
            RunStatus::Interrupted => 130,
        }
    }

    pub fn from_single(success: bool) -> Self {
        if success {
            RunStatus::Success
        } else {
            RunStatus::Failure
        }
    }

    /// Zero failures is success, including an empty batch.
    pub fn from_batch(result: &BatchResult) -> Self {
        if result.failed == 0 {
            RunStatus::Success
        } else if result.succeeded == 0 {
            RunStatus::Failure
        } else {
            RunStatus::PartialSuccess
        }
    }
}

/// Where the probe and transcode implementations come from.
pub trait Toolchain {
    /// Fails when either external tool is missing or not functional.
    fn check(&self) -> Result<ToolVersions, ToolError>;
    fn prober(&self) -> Arc<dyn MediaProber>;
    fn remuxer(&self) -> Arc<dyn Remuxer>;
}

#[derive(Debug, Clone, Default)]
pub struct FfmpegToolchain {
    config: ConverterConfig,
}

impl FfmpegToolchain {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }
}

impl Toolchain for FfmpegToolchain {
    fn check(&self) -> Result<ToolVersions, ToolError> {
        check_tool_pair(&self.config.ffmpeg_bin, &self.config.ffprobe_bin)
    }

    fn prober(&self) -> Arc<dyn MediaProber> {
        Arc::new(FfprobeProber::new(
            self.config.ffprobe_bin.clone(),
            self.config.probe_timeout,
        ))
    }

    fn remuxer(&self) -> Arc<dyn Remuxer> {
        Arc::new(FfmpegRemuxer::new(
            self.config.ffmpeg_bin.clone(),
            self.config.transcode_timeout,
        ))
    }
}

/// Checks the tools, runs the requested conversion, and maps the result to a
/// process exit status. The stats summary is logged whatever the outcome.
pub fn run(options: &RunOptions, toolchain: &dyn Toolchain, cancel: Arc<AtomicBool>) -> RunStatus {
    let versions = match toolchain.check() {
        Ok(v) => v,
        Err(e) => {
            error!("❌ {}", e);
            error!("FFmpeg and FFprobe are required. Please install FFmpeg and ensure it is in PATH.");
            return RunStatus::ToolsUnavailable;
        }
    };
    info!("Using {}", versions.ffmpeg.version);

    let converter = Arc::new(VideoConverter::new(toolchain.prober(), toolchain.remuxer()));

    let status = match &options.target {
        InputTarget::File(file) => {
            info!("Converting single file: {}", file.display());
            let request = ConversionRequest::new(file.clone(), options.container)
                .with_output(options.output.clone())
                .with_overwrite(options.overwrite);
            if cancel.load(Ordering::SeqCst) {
                warn!("Conversion interrupted by user");
                RunStatus::Interrupted
            } else {
                let outcome = converter.convert(&request);
                if cancel.load(Ordering::SeqCst) {
                    warn!("Conversion interrupted by user");
                    RunStatus::Interrupted
                } else {
                    RunStatus::from_single(outcome.is_success())
                }
            }
        }
        InputTarget::Directory(dir) => {
            let workers = resolve_worker_count(options.concurrent);
            info!("Using {} worker threads", workers);

            let batch = BatchConverter::new(Arc::clone(&converter), workers, cancel);
            let batch_options = BatchOptions {
                input_dir: dir.clone(),
                output_dir: options.output.clone(),
                container: options.container,
                recursive: options.recursive,
                overwrite: options.overwrite,
            };

            let start = Instant::now();
            match batch.convert_directory(&batch_options) {
                Ok(result) => {
                    info!(
                        "Final results: total={} successful={} failed={}",
                        result.total, result.succeeded, result.failed
                    );
                    print_summary_report(&result, start.elapsed(), "Remux");
                    let status = RunStatus::from_batch(&result);
                    match status {
                        RunStatus::Success => info!("All conversions completed successfully"),
                        RunStatus::PartialSuccess => warn!(
                            "Partial success: {}/{} files converted",
                            result.succeeded, result.total
                        ),
                        _ => error!("All conversions failed"),
                    }
                    status
                }
                Err(ConvertError::Interrupted) => {
                    warn!("Conversion interrupted by user");
                    RunStatus::Interrupted
                }
                Err(e) => {
                    error!("❌ Batch conversion failed: {}", e);
                    RunStatus::Failure
                }
            }
        }
    };

    let snap = converter.stats_snapshot();
    info!(
        "Converter stats: {}",
        format_stats_line(
            snap.attempted,
            snap.succeeded,
            snap.failed,
            snap.processing_time
        )
    );
    status
}
