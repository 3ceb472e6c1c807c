//! FFprobe wrapper module
//!
//! Turns `ffprobe -print_format json -show_format -show_streams` output into a
//! typed `MediaInfo`. The probe never modifies anything; the only side effect is
//! the spawned process.

use crate::errors::ProbeError;
use crate::tool_process::{format_ffmpeg_error, ProcessOutcome, ToolProcess};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Unknown,
}

impl StreamKind {
    pub fn from_codec_type(s: &str) -> Self {
        match s {
            "video" => StreamKind::Video,
            "audio" => StreamKind::Audio,
            "subtitle" => StreamKind::Subtitle,
            "data" => StreamKind::Data,
            _ => StreamKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
            StreamKind::Subtitle => "subtitle",
            StreamKind::Data => "data",
            StreamKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamDetails {
    Video {
        width: Option<u32>,
        height: Option<u32>,
        frame_rate: Option<f64>,
        bit_rate: Option<u64>,
    },
    Audio {
        channels: Option<u32>,
        sample_rate: Option<u32>,
        bit_rate: Option<u64>,
    },
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub index: u32,
    pub kind: StreamKind,
    pub codec: String,
    pub details: StreamDetails,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatInfo {
    pub format_name: Option<String>,
    pub duration_secs: Option<f64>,
    pub size_bytes: Option<u64>,
}

/// Per-kind stream counts. Every kind is present, zero when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCounts(BTreeMap<StreamKind, usize>);

impl StreamCounts {
    pub fn get(&self, kind: StreamKind) -> usize {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

/// Parsed probe result. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    streams: Vec<StreamInfo>,
    format: FormatInfo,
}

impl MediaInfo {
    pub fn new(streams: Vec<StreamInfo>, format: FormatInfo) -> Self {
        Self { streams, format }
    }

    pub fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    pub fn format(&self) -> &FormatInfo {
        &self.format
    }

    pub fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(move |s| s.kind == kind)
    }

    pub fn stream_counts(&self) -> StreamCounts {
        let mut counts: BTreeMap<StreamKind, usize> = [
            StreamKind::Video,
            StreamKind::Audio,
            StreamKind::Subtitle,
            StreamKind::Data,
            StreamKind::Unknown,
        ]
        .into_iter()
        .map(|k| (k, 0))
        .collect();
        for stream in &self.streams {
            *counts.entry(stream.kind).or_insert(0) += 1;
        }
        StreamCounts(counts)
    }

    pub fn primary_video(&self) -> Option<&StreamInfo> {
        self.streams_of(StreamKind::Video).next()
    }

    pub fn primary_audio(&self) -> Option<&StreamInfo> {
        self.streams_of(StreamKind::Audio).next()
    }
}

#[derive(Debug, Deserialize)]
struct RawProbe {
    #[serde(default)]
    streams: Vec<RawStream>,
    #[serde(default)]
    format: RawFormat,
}

#[derive(Debug, Deserialize, Default)]
struct RawStream {
    #[serde(default)]
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    bit_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
}

/// Parses ffprobe JSON output.
pub fn parse_probe_json(json: &str) -> Result<MediaInfo, ProbeError> {
    if json.trim().is_empty() {
        return Err(ProbeError::MalformedOutput("empty output".to_string()));
    }
    let raw: RawProbe =
        serde_json::from_str(json).map_err(|e| ProbeError::MalformedOutput(e.to_string()))?;

    let streams = raw
        .streams
        .into_iter()
        .map(|s| {
            let kind = StreamKind::from_codec_type(s.codec_type.as_deref().unwrap_or("unknown"));
            let bit_rate = s.bit_rate.as_deref().and_then(|b| b.parse::<u64>().ok());
            let details = match kind {
                StreamKind::Video => StreamDetails::Video {
                    width: s.width,
                    height: s.height,
                    frame_rate: s
                        .r_frame_rate
                        .as_deref()
                        .and_then(parse_frame_rate)
                        .or_else(|| s.avg_frame_rate.as_deref().and_then(parse_frame_rate)),
                    bit_rate,
                },
                StreamKind::Audio => StreamDetails::Audio {
                    channels: s.channels,
                    sample_rate: s.sample_rate.as_deref().and_then(|r| r.parse::<u32>().ok()),
                    bit_rate,
                },
                _ => StreamDetails::Other,
            };
            StreamInfo {
                index: s.index,
                kind,
                codec: s.codec_name.unwrap_or_else(|| "unknown".to_string()),
                details,
            }
        })
        .collect();

    let format = FormatInfo {
        format_name: raw.format.format_name,
        duration_secs: raw
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok()),
        size_bytes: raw.format.size.as_deref().and_then(|s| s.parse::<u64>().ok()),
    };

    Ok(MediaInfo::new(streams, format))
}

/// Parses `num/den` or plain decimal frame rates. `0/0` and garbage give None.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Media introspection seam. Implemented by `FfprobeProber`, faked in tests.
pub trait MediaProber: Send + Sync {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError>;
}

#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe", DEFAULT_PROBE_TIMEOUT)
    }
}

impl MediaProber for FfprobeProber {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        if !path.is_file() {
            return Err(ProbeError::NotFound(path.to_path_buf()));
        }

        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "--",
        ])
        .arg(path);

        let process = ToolProcess::spawn(&mut cmd)
            .map_err(|e| ProbeError::ToolUnavailable(format!("{}: {}", self.binary.display(), e)))?;

        let output = match process
            .wait_timeout(self.timeout)
            .map_err(|e| ProbeError::ToolUnavailable(e.to_string()))?
        {
            ProcessOutcome::Exited(output) => output,
            ProcessOutcome::TimedOut { .. } => {
                return Err(ProbeError::Timeout {
                    path: path.to_path_buf(),
                    timeout: self.timeout,
                })
            }
        };

        if !output.success() {
            let message = if output.stderr.trim().is_empty() {
                format!("ffprobe could not analyze {}", path.display())
            } else {
                format_ffmpeg_error(&output.stderr)
            };
            return Err(ProbeError::ToolFailure {
                exit_code: output.exit_code(),
                message,
            });
        }

        let info = parse_probe_json(&output.stdout)?;
        debug!(
            path = %path.display(),
            streams = info.streams().len(),
            "Parsed ffprobe output"
        );
        Ok(info)
    }
}
