//! External tool process wrapper with a hard timeout.
//!
//! Both stdout and stderr are drained by dedicated threads. Piping a stream and
//! not reading it deadlocks once the OS pipe buffer (usually 64KB) fills up, and
//! ffmpeg/ffprobe can easily write more than that.
//!
//! ```ignore
//! use remux_utils::tool_process::{ProcessOutcome, ToolProcess};
//! use std::process::Command;
//! use std::time::Duration;
//!
//! let mut cmd = Command::new("ffprobe");
//! cmd.arg("-version");
//! match ToolProcess::spawn(&mut cmd)?.wait_timeout(Duration::from_secs(10))? {
//!     ProcessOutcome::Exited(out) => println!("{}", out.stdout),
//!     ProcessOutcome::TimedOut { .. } => eprintln!("hung"),
//! }
//! ```

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a process that exited on its own.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }
}

#[derive(Debug)]
pub enum ProcessOutcome {
    Exited(ToolOutput),
    /// The process was killed after exceeding its bound.
    TimedOut { stderr: String, duration: Duration },
}

pub struct ToolProcess {
    child: Child,
    command: String,
    started: Instant,
    stdout_thread: Option<JoinHandle<String>>,
    stderr_thread: Option<JoinHandle<String>>,
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl ToolProcess {
    /// Spawns the command with stdout/stderr piped and stdin closed.
    pub fn spawn(cmd: &mut Command) -> io::Result<Self> {
        let command = format!("{:?}", cmd);
        info!(command = %command, "Executing external command");

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let stdout_thread = child.stdout.take().map(drain);
        let stderr_thread = child.stderr.take().map(drain);

        Ok(Self {
            child,
            command,
            started: Instant::now(),
            stdout_thread,
            stderr_thread,
        })
    }

    /// Waits for the process, killing it once `timeout` has elapsed.
    pub fn wait_timeout(mut self, timeout: Duration) -> io::Result<ProcessOutcome> {
        let deadline = self.started + timeout;
        loop {
            let polled = match self.child.try_wait() {
                Ok(polled) => polled,
                Err(e) => {
                    self.reap();
                    return Err(e);
                }
            };
            if let Some(status) = polled {
                let duration = self.started.elapsed();
                let stdout = join_output(self.stdout_thread.take());
                let stderr = join_output(self.stderr_thread.take());
                debug!(
                    command = %self.command,
                    exit_code = ?status.code(),
                    duration_secs = duration.as_secs_f64(),
                    "External command exited"
                );
                return Ok(ProcessOutcome::Exited(ToolOutput {
                    status,
                    stdout,
                    stderr,
                    duration,
                }));
            }

            if Instant::now() >= deadline {
                let stderr = self.reap();
                let duration = self.started.elapsed();
                tracing::error!(
                    command = %self.command,
                    timeout_secs = timeout.as_secs_f64(),
                    "External command timed out and was killed"
                );
                return Ok(ProcessOutcome::TimedOut { stderr, duration });
            }

            thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
        }
    }

    /// Kills and waits for the child, then joins both drain threads.
    /// Returns whatever stderr was captured.
    fn reap(&mut self) -> String {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = join_output(self.stdout_thread.take());
        join_output(self.stderr_thread.take())
    }
}

impl Drop for ToolProcess {
    fn drop(&mut self) {
        // Only reached without a status when wait_timeout was never called.
        if matches!(self.child.try_wait(), Ok(None)) {
            self.reap();
        }
    }
}

fn join_output(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|t| t.join().ok()).unwrap_or_default()
}

/// Spawns `program args...` and waits up to `timeout`.
pub fn run_with_timeout(
    program: &std::path::Path,
    args: &[&str],
    timeout: Duration,
) -> io::Result<ProcessOutcome> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    ToolProcess::spawn(&mut cmd)?.wait_timeout(timeout)
}

/// Extracts the most meaningful line from ffmpeg/ffprobe stderr.
///
/// Prefers the last line mentioning an error, then the last line that is not
/// progress output.
pub fn format_ffmpeg_error(stderr: &str) -> String {
    if let Some(error_line) = stderr
        .lines()
        .rev()
        .find(|line| line.contains("Error") || line.contains("error"))
    {
        return error_line.trim().to_string();
    }

    stderr
        .lines()
        .rev()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("frame=")
                && !trimmed.starts_with("fps=")
                && !trimmed.starts_with("size=")
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown FFmpeg error".to_string())
}

/// Hint for well-known remux failure patterns.
pub fn get_error_suggestion(stderr: &str) -> Option<String> {
    let patterns = [
        ("No such file or directory", "check that the input path is correct"),
        ("Invalid data found", "input may be corrupt or not a media file"),
        ("Permission denied", "check read/write permissions on input and output"),
        (
            "already exists",
            "output exists; rerun with --overwrite to replace it",
        ),
        (
            "Could not find tag for codec",
            "target container cannot hold this codec; try --container mkv",
        ),
        (
            "codec not currently supported in container",
            "target container cannot hold this codec; try --container mkv",
        ),
        ("moov atom not found", "input MP4 is incomplete"),
        ("Non-monotonous DTS", "source timestamps are irregular"),
        (
            "Too many packets buffered",
            "source interleaving is poor; raise -max_muxing_queue_size",
        ),
    ];

    patterns
        .iter()
        .find(|(pattern, _)| stderr.contains(pattern))
        .map(|(_, suggestion)| suggestion.to_string())
}
