use remux_utils::ConvertError;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Target container formats. Anything else is rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum Container {
    #[default]
    Mkv,
    Mp4,
}

impl Container {
    /// File extension token, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mkv => "mkv",
            Container::Mp4 => "mp4",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Container::Mkv => "MKV",
            Container::Mp4 => "MP4",
        }
    }

    /// `input` with its extension replaced by this container's.
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        input.with_extension(self.extension())
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Container {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mkv" => Ok(Container::Mkv),
            "mp4" => Ok(Container::Mp4),
            other => Err(ConvertError::InvalidInput(format!(
                "Unsupported container format: {} (supported: mkv, mp4)",
                other
            ))),
        }
    }
}
