//! FFmpeg stream-copy remux
//!
//! Every input stream is mapped and copied unmodified. Timestamps are
//! regenerated (`+genpts`) and shifted to start at zero, which keeps irregular
//! DVR sources muxable.

use remux_utils::{
    format_ffmpeg_error, get_error_suggestion, logging::log_external_tool, ConvertError,
    ProcessOutcome, ToolProcess,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TRANSCODE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Transcode engine seam. `FfmpegRemuxer` in production, fakes in tests.
pub trait Remuxer: Send + Sync {
    fn remux(&self, input: &Path, output: &Path, overwrite: bool) -> Result<(), ConvertError>;
}

/// Argument list for a lossless remux of `input` into `output`.
pub fn remux_args(input: &Path, output: &Path, overwrite: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-fflags", "+genpts", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    args.extend(
        [
            "-map",
            "0",
            "-c",
            "copy",
            "-avoid_negative_ts",
            "make_zero",
            if overwrite { "-y" } else { "-n" },
        ]
        .iter()
        .map(OsString::from),
    );
    args.push(output.as_os_str().to_owned());
    args
}

#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    binary: PathBuf,
    timeout: Duration,
}

impl FfmpegRemuxer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

impl Default for FfmpegRemuxer {
    fn default() -> Self {
        Self::new("ffmpeg", DEFAULT_TRANSCODE_TIMEOUT)
    }
}

impl Remuxer for FfmpegRemuxer {
    fn remux(&self, input: &Path, output: &Path, overwrite: bool) -> Result<(), ConvertError> {
        let args = remux_args(input, output, overwrite);
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args);

        let process = ToolProcess::spawn(&mut cmd).map_err(|e| {
            ConvertError::ToolUnavailable(format!("{}: {}", self.binary.display(), e))
        })?;

        let outcome = process
            .wait_timeout(self.timeout)
            .map_err(|e| ConvertError::ToolUnavailable(e.to_string()))?;

        let output_info = match outcome {
            ProcessOutcome::Exited(out) => out,
            ProcessOutcome::TimedOut { stderr, .. } => {
                debug!(stderr_tail = %format_ffmpeg_error(&stderr), "ffmpeg stderr before kill");
                return Err(ConvertError::Timeout {
                    tool: "ffmpeg".to_string(),
                    timeout: self.timeout,
                });
            }
        };

        let arg_strings: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let arg_refs: Vec<&str> = arg_strings.iter().map(String::as_str).collect();
        log_external_tool(
            "ffmpeg",
            &arg_refs,
            &output_info.stderr,
            output_info.exit_code(),
            output_info.duration,
        );

        if output_info.success() {
            return Ok(());
        }

        Err(ConvertError::ToolFailure {
            tool: "ffmpeg".to_string(),
            exit_code: output_info.exit_code(),
            message: format_ffmpeg_error(&output_info.stderr),
            suggestion: get_error_suggestion(&output_info.stderr),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remux_utils::FailureKind;

    fn as_strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_remux_args_overwrite() {
        let args = remux_args(Path::new("in.dav"), Path::new("out.mkv"), true);
        assert_eq!(
            as_strings(&args),
            vec![
                "-fflags", "+genpts", "-i", "in.dav", "-map", "0", "-c", "copy",
                "-avoid_negative_ts", "make_zero", "-y", "out.mkv"
            ]
        );
    }

    #[test]
    fn test_remux_args_no_overwrite() {
        let args = as_strings(&remux_args(Path::new("a.dav"), Path::new("b.mp4"), false));
        assert!(args.contains(&"-n".to_string()));
        assert!(!args.contains(&"-y".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("b.mp4"));
    }

    #[test]
    fn test_remux_args_keep_odd_paths_intact() {
        let args = as_strings(&remux_args(
            Path::new("/in/my clip;rm.dav"),
            Path::new("/out/my clip;rm.mkv"),
            true,
        ));
        assert!(args.contains(&"/in/my clip;rm.dav".to_string()));
        assert!(args.contains(&"/out/my clip;rm.mkv".to_string()));
    }

    #[test]
    fn test_missing_binary_is_tool_unavailable() {
        let remuxer = FfmpegRemuxer::new("no_such_ffmpeg_binary_xyz", Duration::from_secs(5));
        let err = remuxer
            .remux(Path::new("in.dav"), Path::new("out.mkv"), true)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::ToolUnavailable);
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake_ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_ffmpeg(
            dir.path(),
            "echo 'in.dav: Invalid data found when processing input' 1>&2; exit 1",
        );
        let err = FfmpegRemuxer::new(bin, Duration::from_secs(10))
            .remux(Path::new("in.dav"), &dir.path().join("out.mkv"), true)
            .unwrap_err();
        match err {
            ConvertError::ToolFailure {
                exit_code,
                message,
                suggestion,
                ..
            } => {
                assert_eq!(exit_code, Some(1));
                assert!(message.contains("Invalid data found"));
                assert!(suggestion.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_last_argument_is_output() {
        let dir = tempfile::tempdir().unwrap();
        // Writes a byte to the last argument, like a real muxer would.
        let bin = fake_ffmpeg(dir.path(), "for last; do :; done; printf x > \"$last\"");
        let out = dir.path().join("out.mkv");
        FfmpegRemuxer::new(bin, Duration::from_secs(10))
            .remux(Path::new("in.dav"), &out, true)
            .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"x");
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_engine_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_ffmpeg(dir.path(), "exec sleep 30");
        let err = FfmpegRemuxer::new(bin, Duration::from_millis(200))
            .remux(Path::new("in.dav"), &dir.path().join("out.mkv"), true)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
    }
}
