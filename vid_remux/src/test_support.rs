//! Fakes for the probe and transcode seams, shared by the unit tests.

use crate::remuxer::Remuxer;
use remux_utils::{
    ConvertError, FormatInfo, MediaInfo, MediaProber, ProbeError, StreamDetails, StreamInfo,
    StreamKind,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::ThreadId;
use std::time::Duration;

pub(crate) fn write_file(path: &Path, len: usize) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, vec![0u8; len]).unwrap();
}

pub(crate) fn sample_media_info() -> MediaInfo {
    MediaInfo::new(
        vec![
            StreamInfo {
                index: 0,
                kind: StreamKind::Video,
                codec: "h264".to_string(),
                details: StreamDetails::Video {
                    width: Some(1920),
                    height: Some(1080),
                    frame_rate: Some(25.0),
                    bit_rate: Some(4_000_000),
                },
            },
            StreamInfo {
                index: 1,
                kind: StreamKind::Audio,
                codec: "pcm_alaw".to_string(),
                details: StreamDetails::Audio {
                    channels: Some(1),
                    sample_rate: Some(8000),
                    bit_rate: Some(64_000),
                },
            },
        ],
        FormatInfo {
            format_name: Some("dhav".to_string()),
            duration_secs: Some(60.0),
            size_bytes: Some(1000),
        },
    )
}

pub(crate) struct FakeProber {
    fail: bool,
    pub calls: AtomicUsize,
}

impl FakeProber {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MediaProber for FakeProber {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProbeError::ToolFailure {
                exit_code: Some(1),
                message: format!("{}: Invalid data found", path.display()),
            });
        }
        Ok(sample_media_info())
    }
}

type FailPredicate = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// Writes `output_bytes` zero bytes to the output path unless told to fail.
pub(crate) struct FakeRemuxer {
    output_bytes: usize,
    delay: Duration,
    fail_if: Option<FailPredicate>,
    panic_if: Option<FailPredicate>,
    calls: AtomicUsize,
    threads: Mutex<HashSet<ThreadId>>,
}

impl FakeRemuxer {
    pub fn writing(output_bytes: usize) -> Self {
        Self {
            output_bytes,
            delay: Duration::ZERO,
            fail_if: None,
            panic_if: None,
            calls: AtomicUsize::new(0),
            threads: Mutex::new(HashSet::new()),
        }
    }

    pub fn failing_when(mut self, pred: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        self.fail_if = Some(Box::new(pred));
        self
    }

    pub fn panicking_when(
        mut self,
        pred: impl Fn(&Path) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.panic_if = Some(Box::new(pred));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.lock().unwrap().len()
    }
}

impl Remuxer for FakeRemuxer {
    fn remux(&self, input: &Path, output: &Path, overwrite: bool) -> Result<(), ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.threads
            .lock()
            .unwrap()
            .insert(std::thread::current().id());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.panic_if.as_ref().is_some_and(|p| p(input)) {
            panic!("fake remuxer blew up on {}", input.display());
        }
        if self.fail_if.as_ref().is_some_and(|p| p(input)) {
            return Err(ConvertError::ToolFailure {
                tool: "ffmpeg".to_string(),
                exit_code: Some(1),
                message: "Invalid data found when processing input".to_string(),
                suggestion: None,
            });
        }
        if !overwrite && output.exists() {
            return Err(ConvertError::ToolFailure {
                tool: "ffmpeg".to_string(),
                exit_code: Some(1),
                message: format!("File '{}' already exists. Exiting.", output.display()),
                suggestion: None,
            });
        }
        std::fs::write(output, vec![0u8; self.output_bytes])
            .map_err(|e| ConvertError::VerificationFailure(e.to_string()))?;
        Ok(())
    }
}
