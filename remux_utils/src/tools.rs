//! External tool detection
//!
//! The remux pipeline needs both ffmpeg and ffprobe. Each is resolved with
//! `which` and then asked for `-version` under a short bound, so a binary that
//! exists but cannot run is reported the same way as a missing one.

use crate::errors::ToolError;
use crate::logging::log_external_tool;
use crate::tool_process::{run_with_timeout, ProcessOutcome};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

pub const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub path: PathBuf,
    /// First line of `-version` output, e.g. `ffmpeg version 7.1 ...`
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersions {
    pub ffmpeg: ToolInfo,
    pub ffprobe: ToolInfo,
}

/// Resolves `binary` and runs `binary -version`.
pub fn check_tool(binary: &Path) -> Result<ToolInfo, ToolError> {
    let tool = binary.display().to_string();

    let path = which::which(binary).map_err(|e| ToolError::NotFound {
        tool: tool.clone(),
        reason: e.to_string(),
    })?;

    let outcome = run_with_timeout(&path, &["-version"], VERSION_CHECK_TIMEOUT).map_err(|e| {
        ToolError::NotFunctional {
            tool: tool.clone(),
            reason: e.to_string(),
        }
    })?;

    match outcome {
        ProcessOutcome::Exited(output) => {
            log_external_tool(
                &tool,
                &["-version"],
                &output.stderr,
                output.exit_code(),
                output.duration,
            );
            if !output.success() {
                return Err(ToolError::NotFunctional {
                    tool,
                    reason: format!("-version exited with {:?}", output.exit_code()),
                });
            }
            let version = output
                .stdout
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            Ok(ToolInfo { path, version })
        }
        ProcessOutcome::TimedOut { .. } => Err(ToolError::NotFunctional {
            tool,
            reason: format!(
                "-version did not finish within {}s",
                VERSION_CHECK_TIMEOUT.as_secs()
            ),
        }),
    }
}

/// Checks ffmpeg first, then ffprobe. Both must work.
pub fn check_tool_pair(ffmpeg: &Path, ffprobe: &Path) -> Result<ToolVersions, ToolError> {
    let ffmpeg = check_tool(ffmpeg).inspect_err(|e| error!("{}", e))?;
    info!("FFmpeg found: {}", ffmpeg.version);

    let ffprobe = check_tool(ffprobe).inspect_err(|e| {
        error!("{} (ffmpeg is available, ffprobe is not)", e);
    })?;

    Ok(ToolVersions { ffmpeg, ffprobe })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_is_not_found() {
        let err = check_tool(Path::new("no_such_tool_binary_xyz")).unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
        assert_eq!(err.tool(), "no_such_tool_binary_xyz");
    }

    #[test]
    fn test_pair_fails_on_missing_ffmpeg() {
        let err = check_tool_pair(
            Path::new("no_such_ffmpeg_xyz"),
            Path::new("no_such_ffprobe_xyz"),
        )
        .unwrap_err();
        assert_eq!(err.tool(), "no_such_ffmpeg_xyz");
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_pair_with_working_scripts() {
        let dir = tempfile::TempDir::new().unwrap();
        let ffmpeg = script(dir.path(), "ffmpeg", "echo 'ffmpeg version 7.1-test'");
        let ffprobe = script(dir.path(), "ffprobe", "echo 'ffprobe version 7.1-test'");

        let versions = check_tool_pair(&ffmpeg, &ffprobe).unwrap();
        assert_eq!(versions.ffmpeg.version, "ffmpeg version 7.1-test");
        assert_eq!(versions.ffprobe.version, "ffprobe version 7.1-test");
    }

    #[cfg(unix)]
    #[test]
    fn test_pair_fails_when_ffprobe_broken() {
        let dir = tempfile::TempDir::new().unwrap();
        let ffmpeg = script(dir.path(), "ffmpeg", "echo 'ffmpeg version 7.1-test'");
        let ffprobe = script(dir.path(), "ffprobe", "exit 1");

        let err = check_tool_pair(&ffmpeg, &ffprobe).unwrap_err();
        assert!(matches!(err, ToolError::NotFunctional { .. }));
    }
}
