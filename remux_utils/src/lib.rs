//! Shared Utilities for vid-remux
//!
//! Plumbing that is independent of the conversion domain:
//! - Error types for probing, tool checks and conversions
//! - Logging setup and external tool logging
//! - External process wrapper with timeouts (no pipe deadlocks)
//! - FFprobe adapter producing typed `MediaInfo`
//! - ffmpeg/ffprobe availability check
//! - Candidate discovery and the batch tally
//! - Bounded worker pool
//! - Summary reporting

pub mod batch;
pub mod errors;
pub mod ffprobe;
pub mod logging;
pub mod report;
pub mod thread_manager;
pub mod tool_process;
pub mod tools;
pub mod worker_pool;

pub use batch::{collect_video_files, has_video_extension, BatchResult, VIDEO_EXTENSIONS};
pub use errors::{ConvertError, FailureKind, ProbeError, ToolError};
pub use ffprobe::{
    parse_probe_json, FfprobeProber, FormatInfo, MediaInfo, MediaProber, StreamCounts,
    StreamDetails, StreamInfo, StreamKind, DEFAULT_PROBE_TIMEOUT,
};
pub use report::{format_duration, format_stats_line, print_summary_report};
pub use thread_manager::{default_worker_count, resolve_worker_count};
pub use tool_process::{
    format_ffmpeg_error, get_error_suggestion, run_with_timeout, ProcessOutcome, ToolOutput,
    ToolProcess,
};
pub use tools::{check_tool, check_tool_pair, ToolInfo, ToolVersions};
pub use worker_pool::{Completion, Completions, TaskResult, WorkerPool};
