use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("File not found or not a regular file: {}", .0.display())]
    NotFound(PathBuf),

    #[error("ffprobe timed out after {}s: {}", .timeout.as_secs(), .path.display())]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("ffprobe failed (exit code {exit_code:?}): {message}")]
    ToolFailure {
        exit_code: Option<i32>,
        message: String,
    },

    #[error("Malformed ffprobe output: {0}")]
    MalformedOutput(String),

    #[error("ffprobe could not be started: {0}")]
    ToolUnavailable(String),
}

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("External tool not found: {tool} ({reason})")]
    NotFound { tool: String, reason: String },

    #[error("External tool is not functional: {tool} ({reason})")]
    NotFunctional { tool: String, reason: String },
}

impl ToolError {
    pub fn tool(&self) -> &str {
        match self {
            ToolError::NotFound { tool, .. } | ToolError::NotFunctional { tool, .. } => tool,
        }
    }
}

/// Failure categories a conversion can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    InvalidInput,
    ToolUnavailable,
    ToolFailure,
    Timeout,
    VerificationFailure,
    Interrupted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::ToolUnavailable => "tool_unavailable",
            FailureKind::ToolFailure => "tool_failure",
            FailureKind::Timeout => "timeout",
            FailureKind::VerificationFailure => "verification_failure",
            FailureKind::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Output exists and overwriting is disabled. Nothing is spawned.
    #[error("Output exists and overwrite is disabled: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("External tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("{tool} failed (exit code {exit_code:?}): {message}")]
    ToolFailure {
        tool: String,
        exit_code: Option<i32>,
        message: String,
        suggestion: Option<String>,
    },

    #[error("{tool} timed out after {}s", .timeout.as_secs())]
    Timeout { tool: String, timeout: Duration },

    #[error("Output verification failed: {0}")]
    VerificationFailure(String),

    #[error("Interrupted by operator")]
    Interrupted,
}

impl ConvertError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ConvertError::InvalidInput(_) | ConvertError::OutputExists(_) => {
                FailureKind::InvalidInput
            }
            ConvertError::ToolUnavailable(_) => FailureKind::ToolUnavailable,
            ConvertError::ToolFailure { .. } => FailureKind::ToolFailure,
            ConvertError::Timeout { .. } => FailureKind::Timeout,
            ConvertError::VerificationFailure(_) => FailureKind::VerificationFailure,
            ConvertError::Interrupted => FailureKind::Interrupted,
        }
    }

    /// Policy rejections are expected outcomes and are logged at warn level.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(self, ConvertError::OutputExists(_))
    }
}

impl From<ToolError> for ConvertError {
    fn from(e: ToolError) -> Self {
        ConvertError::ToolUnavailable(e.to_string())
    }
}
