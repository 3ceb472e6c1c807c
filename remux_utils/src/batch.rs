//! Batch Processing Module
//!
//! Candidate discovery for directory runs and the batch tally.
//!
//! Discovery is deterministic: candidates come back sorted by path, so two runs
//! over an unchanged tree number their jobs identically.

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Lower-case extensions (without dot) that are treated as video candidates.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "dav", "avi", "mp4", "mkv", "mov", "wmv", "flv", "webm", "m4v", "3gp", "3g2", "asf", "rm",
    "rmvb", "vob", "ts",
];

pub fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Finds video candidates under `dir`.
///
/// Never fails: a missing root, a non-directory root or an unreadable root all
/// log an error and yield an empty list. Unreadable entries deeper in the tree
/// are logged and skipped.
pub fn collect_video_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    if !dir.exists() {
        error!("Directory does not exist: {}", dir.display());
        return Vec::new();
    }
    if !dir.is_dir() {
        error!("Path is not a directory: {}", dir.display());
        return Vec::new();
    }

    let walker = if recursive {
        WalkDir::new(dir).min_depth(1).follow_links(true)
    } else {
        WalkDir::new(dir).min_depth(1).max_depth(1)
    };

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                error!("Error scanning directory {}: {}", dir.display(), e);
                return Vec::new();
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                continue;
            }
        };
        if entry.file_type().is_file() && has_video_extension(entry.path()) {
            debug!("Found video file: {}", entry.path().display());
            files.push(entry.into_path());
        }
    }

    files.sort();
    info!("Found {} video files in {}", files.len(), dir.display());
    files
}

/// Outcome tally of one directory run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchResult {
    /// Starts a tally for `total` submitted jobs.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn success(&mut self) {
        self.succeeded += 1;
    }

    pub fn fail(&mut self) {
        self.failed += 1;
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.completed() == self.total
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Every allow-listed extension matches in any letter case.
        #[test]
        fn prop_allowed_extensions_match_any_case(
            idx in 0usize..VIDEO_EXTENSIONS.len(),
            mask in proptest::collection::vec(any::<bool>(), 4),
            stem in "[a-zA-Z0-9_]{1,12}"
        ) {
            let ext: String = VIDEO_EXTENSIONS[idx]
                .chars()
                .zip(mask.iter().cycle())
                .map(|(c, up)| if *up { c.to_ascii_uppercase() } else { c })
                .collect();
            let name = format!("{}.{}", stem, ext);
            prop_assert!(has_video_extension(Path::new(&name)));
        }

        /// Anything not on the allow-list is rejected.
        #[test]
        fn prop_other_extensions_rejected(ext in "[a-z0-9]{1,6}") {
            prop_assume!(!VIDEO_EXTENSIONS.contains(&ext.as_str()));
            let name = format!("clip.{}", ext);
            prop_assert!(!has_video_extension(Path::new(&name)));
        }
    }
}
