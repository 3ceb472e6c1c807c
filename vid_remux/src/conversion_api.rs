//! Conversion API Module - Lossless Remux
//!
//! One job per input file:
//! - validate the input and resolve the output path
//! - refuse to clobber an existing output when overwrite is disabled
//! - log a best-effort probe summary
//! - stream-copy into the target container
//! - verify the output by existence and size
//!
//! Every exit path records exactly one outcome in the shared statistics.

use crate::container::Container;
use crate::remuxer::Remuxer;
use crate::stats::{ConversionStats, StatsSnapshot};
use remux_utils::{ConvertError, FailureKind, MediaInfo, MediaProber, StreamDetails, StreamKind};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};

/// Output/input size ratio expected from a stream copy. Outside it only warns.
pub const SIZE_RATIO_MIN: f64 = 0.8;
pub const SIZE_RATIO_MAX: f64 = 1.2;

const MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub container: Container,
    pub overwrite: bool,
}

impl ConversionRequest {
    pub fn new(input: impl Into<PathBuf>, container: Container) -> Self {
        Self {
            input: input.into(),
            output: None,
            container,
            overwrite: true,
        }
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Explicit output if given, else the input with the container's extension.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.container.output_path_for(&self.input))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifyReport {
    pub input_size: u64,
    pub output_size: u64,
    pub size_ratio: f64,
    /// Ratio fell outside `[SIZE_RATIO_MIN, SIZE_RATIO_MAX]`.
    pub ratio_warning: bool,
}

#[derive(Debug)]
pub struct ConversionOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub elapsed: Duration,
    pub result: Result<VerifyReport, ConvertError>,
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.result.as_ref().err().map(ConvertError::kind)
    }
}

/// Heuristic output check: present, non-empty, size roughly equal to the input.
pub fn verify_output(input: &Path, output: &Path) -> Result<VerifyReport, ConvertError> {
    let output_size = match std::fs::metadata(output) {
        Ok(meta) => meta.len(),
        Err(_) => {
            error!("Output file does not exist: {}", output.display());
            return Err(ConvertError::VerificationFailure(format!(
                "output file does not exist: {}",
                output.display()
            )));
        }
    };

    if output_size == 0 {
        error!("Output file is empty: {}", output.display());
        return Err(ConvertError::VerificationFailure(format!(
            "output file is empty: {}",
            output.display()
        )));
    }

    let input_size = std::fs::metadata(input)
        .map_err(|e| {
            ConvertError::VerificationFailure(format!(
                "cannot stat input {}: {}",
                input.display(),
                e
            ))
        })?
        .len();

    let size_ratio = if input_size > 0 {
        output_size as f64 / input_size as f64
    } else {
        0.0
    };
    let ratio_warning = !(SIZE_RATIO_MIN..=SIZE_RATIO_MAX).contains(&size_ratio);
    if ratio_warning {
        warn!(
            "⚠️  Output file size differs significantly from input (ratio: {:.2})",
            size_ratio
        );
    }

    info!("Output verified: {:.1} MB", output_size as f64 / MB);
    Ok(VerifyReport {
        input_size,
        output_size,
        size_ratio,
        ratio_warning,
    })
}

/// Records a failed outcome if dropped before `finish`, so a panic inside a
/// job still balances the counters.
struct OutcomeRecorder<'a> {
    stats: &'a ConversionStats,
    start: Instant,
    recorded: bool,
}

impl<'a> OutcomeRecorder<'a> {
    fn start(stats: &'a ConversionStats) -> Self {
        stats.record_attempt();
        Self {
            stats,
            start: Instant::now(),
            recorded: false,
        }
    }

    fn finish(mut self, success: bool) -> Duration {
        let elapsed = self.start.elapsed();
        self.stats.record_outcome(success, elapsed);
        self.recorded = true;
        elapsed
    }
}

impl Drop for OutcomeRecorder<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            self.stats.record_outcome(false, self.start.elapsed());
        }
    }
}

pub struct VideoConverter {
    prober: Arc<dyn MediaProber>,
    remuxer: Arc<dyn Remuxer>,
    stats: ConversionStats,
}

impl VideoConverter {
    pub fn new(prober: Arc<dyn MediaProber>, remuxer: Arc<dyn Remuxer>) -> Self {
        Self {
            prober,
            remuxer,
            stats: ConversionStats::new(),
        }
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Runs one conversion job. Never panics on bad input and never returns
    /// an error past the job boundary; the outcome carries the failure.
    pub fn convert(&self, request: &ConversionRequest) -> ConversionOutcome {
        let span = info_span!("convert", input = %request.input.display());
        let _enter = span.enter();

        let recorder = OutcomeRecorder::start(&self.stats);
        info!("🎬 Starting conversion of: {}", request.input.display());

        let output = request.output_path();
        let result = self.run_job(request, &output);
        let elapsed = recorder.finish(result.is_ok());

        match &result {
            Ok(_) => info!(
                "✅ Conversion successful: {} ({:.2}s)",
                output.display(),
                elapsed.as_secs_f64()
            ),
            Err(e) if e.is_policy_rejection() => warn!("⏭️ {}", e),
            Err(e) => {
                error!(kind = %e.kind(), "❌ Conversion failed: {}", e);
                if let ConvertError::ToolFailure {
                    suggestion: Some(hint),
                    ..
                } = e
                {
                    error!("   💡 Suggestion: {}", hint);
                }
            }
        }

        ConversionOutcome {
            input: request.input.clone(),
            output,
            elapsed,
            result,
        }
    }

    fn run_job(
        &self,
        request: &ConversionRequest,
        output: &Path,
    ) -> Result<VerifyReport, ConvertError> {
        let input = request.input.as_path();
        if !input.exists() {
            return Err(ConvertError::InvalidInput(format!(
                "Input file not found: {}",
                input.display()
            )));
        }
        if !input.is_file() {
            return Err(ConvertError::InvalidInput(format!(
                "Input path is not a file: {}",
                input.display()
            )));
        }
        if same_path(input, output) {
            return Err(ConvertError::InvalidInput(format!(
                "Output path is the input itself: {}",
                output.display()
            )));
        }
        if output.exists() && !request.overwrite {
            return Err(ConvertError::OutputExists(output.to_path_buf()));
        }

        info!("Analyzing video file: {}", input.display());
        match self.prober.probe(input) {
            Ok(media) => log_media_summary(&media),
            Err(e) => warn!("Could not retrieve video information: {}", e),
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConvertError::InvalidInput(format!(
                    "Cannot create output directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        info!(
            "Converting to {}: {} -> {}",
            request.container.display_name(),
            input.display(),
            output.display()
        );
        self.remuxer.remux(input, output, request.overwrite)?;

        verify_output(input, output)
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn or_unknown<T: Display>(value: Option<T>, unknown: &str) -> String {
    value.map_or_else(|| unknown.to_string(), |v| v.to_string())
}

fn log_media_summary(media: &MediaInfo) {
    info!("=== Source Video Details ===");

    if let Some(stream) = media.primary_video() {
        if let StreamDetails::Video {
            width,
            height,
            frame_rate,
            bit_rate,
        } = &stream.details
        {
            info!(
                "Video: {} {}x{} @ {}fps, bitrate: {}",
                stream.codec,
                or_unknown(*width, "?"),
                or_unknown(*height, "?"),
                or_unknown(frame_rate.map(|r| format!("{:.2}", r)), "?"),
                or_unknown(*bit_rate, "unknown")
            );
        }
    }

    if let Some(stream) = media.primary_audio() {
        if let StreamDetails::Audio {
            channels,
            sample_rate,
            bit_rate,
        } = &stream.details
        {
            info!(
                "Audio: {} {} channels @ {}Hz, bitrate: {}",
                stream.codec,
                or_unknown(*channels, "?"),
                or_unknown(*sample_rate, "?"),
                or_unknown(*bit_rate, "unknown")
            );
        }
    }

    let counts = media.stream_counts();
    info!(
        "Streams: {} video, {} audio, {} subtitle, {} data",
        counts.get(StreamKind::Video),
        counts.get(StreamKind::Audio),
        counts.get(StreamKind::Subtitle),
        counts.get(StreamKind::Data)
    );

    let format = media.format();
    if let Some(size) = format.size_bytes {
        info!(
            "Duration: {}s, Size: {:.1} MB",
            or_unknown(format.duration_secs, "unknown"),
            size as f64 / MB
        );
    }

    info!("=== End Video Details ===");
}
