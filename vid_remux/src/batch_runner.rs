//! Batch Orchestrator
//!
//! Discovers candidates, fans one conversion job per file out over a bounded
//! `WorkerPool`, and tallies completions as they arrive.

use crate::container::Container;
use crate::conversion_api::{ConversionRequest, VideoConverter};
use remux_utils::{collect_video_files, BatchResult, ConvertError, TaskResult, WorkerPool};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub input_dir: PathBuf,
    /// `None` writes each output next to its input.
    pub output_dir: Option<PathBuf>,
    pub container: Container,
    pub recursive: bool,
    pub overwrite: bool,
}

impl BatchOptions {
    pub fn new(input_dir: impl Into<PathBuf>, container: Container) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: None,
            container,
            recursive: false,
            overwrite: true,
        }
    }

    /// Output directory that actually differs from the input directory.
    fn distinct_output_dir(&self) -> Option<&Path> {
        self.output_dir
            .as_deref()
            .filter(|out| *out != self.input_dir.as_path())
    }
}

/// `output_dir / candidate.relative_to(input_dir)` with the container extension.
///
/// Candidates outside `input_dir` keep only their file name.
pub fn output_path_for(
    candidate: &Path,
    input_dir: &Path,
    output_dir: &Path,
    container: Container,
) -> PathBuf {
    let relative = candidate
        .strip_prefix(input_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| candidate.file_name().map(PathBuf::from).unwrap_or_default());
    container.output_path_for(&output_dir.join(relative))
}

pub struct BatchConverter {
    converter: Arc<VideoConverter>,
    max_workers: usize,
    cancel: Arc<AtomicBool>,
}

impl BatchConverter {
    pub fn new(converter: Arc<VideoConverter>, max_workers: usize, cancel: Arc<AtomicBool>) -> Self {
        Self {
            converter,
            max_workers: max_workers.max(1),
            cancel,
        }
    }

    pub fn converter(&self) -> &VideoConverter {
        &self.converter
    }

    /// Converts every candidate under `options.input_dir`.
    ///
    /// Returns only after every submitted job has reported. An operator
    /// interrupt during the run yields `ConvertError::Interrupted` instead of a
    /// partial result.
    pub fn convert_directory(&self, options: &BatchOptions) -> Result<BatchResult, ConvertError> {
        let output_dir = options.distinct_output_dir();
        info!(
            "📂 Starting batch conversion: {} -> {}",
            options.input_dir.display(),
            output_dir.unwrap_or(&options.input_dir).display()
        );
        info!(
            "Container: {}, Workers: {}",
            options.container, self.max_workers
        );

        if let Some(dir) = output_dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                ConvertError::InvalidInput(format!(
                    "Cannot create output directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let files = collect_video_files(&options.input_dir, options.recursive);
        if files.is_empty() {
            warn!("No video files found to convert");
            return Ok(BatchResult::new(0));
        }

        let requests: Vec<ConversionRequest> = files
            .into_iter()
            .map(|file| {
                let output = output_dir.map(|dir| {
                    output_path_for(&file, &options.input_dir, dir, options.container)
                });
                ConversionRequest::new(file, options.container)
                    .with_output(output)
                    .with_overwrite(options.overwrite)
            })
            .collect();

        let mut result = BatchResult::new(requests.len());
        info!(
            "Processing {} files with {} workers",
            result.total, self.max_workers
        );

        let pool = WorkerPool::new(self.max_workers, Arc::clone(&self.cancel))
            .map_err(|e| ConvertError::ToolUnavailable(e.to_string()))?;
        let converter = Arc::clone(&self.converter);
        let mut cancelled = 0usize;

        for completion in pool.execute(requests, move |req| converter.convert(req).is_success()) {
            match completion.result {
                TaskResult::Completed(true) => result.success(),
                TaskResult::Completed(false) => result.fail(),
                TaskResult::Panicked(msg) => {
                    error!(
                        "Conversion exception for {}: {}",
                        completion.task.input.display(),
                        msg
                    );
                    result.fail();
                }
                TaskResult::Cancelled => {
                    cancelled += 1;
                    continue;
                }
            }
            info!(
                "Progress: {}/{} files processed ({} successful, {} failed)",
                result.completed(),
                result.total,
                result.succeeded,
                result.failed
            );
        }

        if cancelled > 0 || self.cancel.load(Ordering::SeqCst) {
            warn!(
                "Batch interrupted: {} of {} files were not started",
                cancelled, result.total
            );
            return Err(ConvertError::Interrupted);
        }

        info!(
            "Batch conversion completed: {} total, {} successful, {} failed",
            result.total, result.succeeded, result.failed
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_file, FakeProber, FakeRemuxer};
    use proptest::prelude::*;
    use std::time::{Duration, Instant};

    fn batch(remuxer: Arc<FakeRemuxer>, workers: usize) -> BatchConverter {
        let converter = Arc::new(VideoConverter::new(Arc::new(FakeProber::ok()), remuxer));
        BatchConverter::new(converter, workers, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_output_path_for_nested() {
        assert_eq!(
            output_path_for(
                Path::new("/in/a/b.dav"),
                Path::new("/in"),
                Path::new("/out"),
                Container::Mkv
            ),
            PathBuf::from("/out/a/b.mkv")
        );
    }

    #[test]
    fn test_output_path_for_outside_root() {
        assert_eq!(
            output_path_for(
                Path::new("/other/c.avi"),
                Path::new("/in"),
                Path::new("/out"),
                Container::Mp4
            ),
            PathBuf::from("/out/c.mp4")
        );
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let remuxer = Arc::new(FakeRemuxer::writing(10));
        let result = batch(Arc::clone(&remuxer), 2)
            .convert_directory(&BatchOptions::new(dir.path(), Container::Mkv))
            .unwrap();
        assert_eq!(result, BatchResult::new(0));
        assert_eq!(remuxer.call_count(), 0);
    }

    #[test]
    fn test_empty_directory_still_creates_output_dir() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let out_dir = output.path().join("converted/nested");
        let mut options = BatchOptions::new(input.path(), Container::Mkv);
        options.output_dir = Some(out_dir.clone());

        let result = batch(Arc::new(FakeRemuxer::writing(10)), 2)
            .convert_directory(&options)
            .unwrap();
        assert_eq!(result, BatchResult::new(0));
        assert!(out_dir.is_dir());
    }

    #[test]
    fn test_missing_directory_is_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let result = batch(Arc::new(FakeRemuxer::writing(10)), 2)
            .convert_directory(&BatchOptions::new(dir.path().join("nope"), Container::Mkv))
            .unwrap();
        assert_eq!(result.total, 0);
    }

    #[test]
    fn test_partial_failure_counts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.dav", "b.dav", "c.dav", "d.dav"] {
            write_file(&dir.path().join(name), 1000);
        }
        let remuxer = Arc::new(FakeRemuxer::writing(1000).failing_when(|p| {
            matches!(
                p.file_name().and_then(|n| n.to_str()),
                Some("b.dav") | Some("d.dav")
            )
        }));
        let bc = batch(Arc::clone(&remuxer), 2);
        let result = bc
            .convert_directory(&BatchOptions::new(dir.path(), Container::Mkv))
            .unwrap();

        assert_eq!(result.total, 4);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 2);
        assert!(result.is_complete());
        assert!(dir.path().join("a.mkv").exists());
        assert!(dir.path().join("c.mkv").exists());

        let snap = bc.converter().stats_snapshot();
        assert_eq!((snap.attempted, snap.succeeded, snap.failed), (4, 2, 2));
    }

    #[test]
    fn test_output_dir_mirrors_tree() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_file(&input.path().join("top.dav"), 1000);
        write_file(&input.path().join("cam1/day1/rec.dav"), 1000);
        write_file(&input.path().join("notes.txt"), 10);

        let mut options = BatchOptions::new(input.path(), Container::Mp4);
        options.output_dir = Some(output.path().join("converted"));
        options.recursive = true;

        let result = batch(Arc::new(FakeRemuxer::writing(1000)), 2)
            .convert_directory(&options)
            .unwrap();
        assert_eq!((result.total, result.succeeded, result.failed), (2, 2, 0));
        assert!(output.path().join("converted/top.mp4").is_file());
        assert!(output.path().join("converted/cam1/day1/rec.mp4").is_file());
        assert!(!input.path().join("top.mp4").exists());
    }

    #[test]
    fn test_non_recursive_ignores_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("top.dav"), 1000);
        write_file(&dir.path().join("sub/inner.dav"), 1000);

        let result = batch(Arc::new(FakeRemuxer::writing(1000)), 2)
            .convert_directory(&BatchOptions::new(dir.path(), Container::Mkv))
            .unwrap();
        assert_eq!(result.total, 1);
        assert!(!dir.path().join("sub/inner.mkv").exists());
    }

    #[test]
    fn test_panicking_job_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.dav", "boom.dav", "c.dav"] {
            write_file(&dir.path().join(name), 1000);
        }
        let remuxer = Arc::new(
            FakeRemuxer::writing(1000).panicking_when(|p| p.to_string_lossy().contains("boom")),
        );
        let bc = batch(remuxer, 2);
        let result = bc
            .convert_directory(&BatchOptions::new(dir.path(), Container::Mkv))
            .unwrap();
        assert_eq!((result.total, result.succeeded, result.failed), (3, 2, 1));

        let snap = bc.converter().stats_snapshot();
        assert_eq!(snap.attempted, snap.succeeded + snap.failed);
    }

    #[test]
    fn test_bounded_parallel_wall_time() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..6 {
            write_file(&dir.path().join(format!("clip{}.dav", i)), 1000);
        }
        let interval = Duration::from_millis(300);
        let remuxer = Arc::new(FakeRemuxer::writing(1000).with_delay(interval));

        let start = Instant::now();
        let result = batch(Arc::clone(&remuxer), 2)
            .convert_directory(&BatchOptions::new(dir.path(), Container::Mkv))
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(result.succeeded, 6);
        assert!(remuxer.thread_count() > 1);
        // ceil(6/2) intervals plus slack, well under the serial 6 intervals.
        assert!(elapsed >= interval * 3, "took {:?}", elapsed);
        assert!(elapsed < interval * 5, "took {:?}", elapsed);
    }

    #[test]
    fn test_interrupt_before_start_reports_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.dav", "b.dav"] {
            write_file(&dir.path().join(name), 1000);
        }
        let remuxer = Arc::new(FakeRemuxer::writing(1000));
        let converter = Arc::new(VideoConverter::new(
            Arc::new(FakeProber::ok()),
            Arc::clone(&remuxer) as Arc<dyn crate::remuxer::Remuxer>,
        ));
        let bc = BatchConverter::new(converter, 2, Arc::new(AtomicBool::new(true)));

        let err = bc
            .convert_directory(&BatchOptions::new(dir.path(), Container::Mkv))
            .unwrap_err();
        assert!(matches!(err, ConvertError::Interrupted));
        assert_eq!(remuxer.call_count(), 0);
    }

    #[test]
    fn test_rerun_without_overwrite_fails_all() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.dav", "b.dav"] {
            write_file(&dir.path().join(name), 1000);
        }
        let bc = batch(Arc::new(FakeRemuxer::writing(1000)), 2);
        let mut options = BatchOptions::new(dir.path(), Container::Mkv);
        assert_eq!(bc.convert_directory(&options).unwrap().succeeded, 2);

        // The first run's outputs are candidates now too, and map onto themselves.
        options.overwrite = false;
        let second = bc.convert_directory(&options).unwrap();
        assert_eq!(
            (second.total, second.succeeded, second.failed),
            (4, 0, 4)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_batch_conserves_counts(fail_mask in proptest::collection::vec(any::<bool>(), 1..8)) {
            let dir = tempfile::tempdir().unwrap();
            for i in 0..fail_mask.len() {
                write_file(&dir.path().join(format!("f{}.dav", i)), 100);
            }
            let mask = fail_mask.clone();
            let remuxer = Arc::new(FakeRemuxer::writing(100).failing_when(move |p| {
                let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                stem.trim_start_matches('f')
                    .parse::<usize>()
                    .map(|i| mask[i])
                    .unwrap_or(false)
            }));
            let bc = batch(remuxer, 3);
            let result = bc
                .convert_directory(&BatchOptions::new(dir.path(), Container::Mkv))
                .unwrap();

            let expected_failed = fail_mask.iter().filter(|f| **f).count();
            prop_assert_eq!(result.total, fail_mask.len());
            prop_assert_eq!(result.total, result.succeeded + result.failed);
            prop_assert_eq!(result.failed, expected_failed);

            let snap = bc.converter().stats_snapshot();
            prop_assert_eq!(snap.attempted, snap.succeeded + snap.failed);
        }
    }
}
