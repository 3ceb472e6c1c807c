//! vid-remux: lossless container conversion
//!
//! Repackages recorder output (DAV and friends) into MKV or MP4 by stream copy.
//! Nothing is re-encoded; ffmpeg does the muxing and ffprobe the inspection.

pub mod app;
pub mod batch_runner;
pub mod container;
pub mod conversion_api;
pub mod remuxer;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::{
    run, ConverterConfig, FfmpegToolchain, InputTarget, RunOptions, RunStatus, Toolchain,
};
pub use batch_runner::{output_path_for, BatchConverter, BatchOptions};
pub use container::Container;
pub use conversion_api::{
    verify_output, ConversionOutcome, ConversionRequest, VerifyReport, VideoConverter,
};
pub use remuxer::{remux_args, FfmpegRemuxer, Remuxer};
pub use stats::{ConversionStats, StatsSnapshot};

pub use remux_utils::{BatchResult, ConvertError, FailureKind};
