//! Core value types shared by every stage of a move

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Detected type of a download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    #[default]
    Unknown,
    Movie,
    #[serde(rename = "tv")]
    TvEpisode,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "Unknown",
            Self::Movie => "Movie",
            Self::TvEpisode => "TV Show",
        };
        f.write_str(name)
    }
}

/// Result of classifying a file or directory name
///
/// `season`/`episode` use 0 for "not present". A caller may replace `title`
/// or `kind` (user correction) before building a [`MoveRequest`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Classification {
    pub kind: MediaKind,
    pub title: String,
    pub year: Option<u32>,
    pub season: u32,
    pub episode: u32,
    pub confidence: f64,
}

impl Classification {
    pub fn unknown(title: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Unknown,
            title: title.into(),
            year: None,
            season: 0,
            episode: 0,
            confidence: 0.1,
        }
    }

    pub fn movie(title: impl Into<String>, year: Option<u32>) -> Self {
        Self {
            kind: MediaKind::Movie,
            title: title.into(),
            year,
            season: 0,
            episode: 0,
            confidence: 1.0,
        }
    }

    pub fn tv(title: impl Into<String>, season: u32) -> Self {
        Self {
            kind: MediaKind::TvEpisode,
            title: title.into(),
            year: None,
            season,
            episode: 0,
            confidence: 1.0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub const fn with_kind(mut self, kind: MediaKind) -> Self {
        self.kind = kind;
        self
    }

    pub const fn is_detected(&self) -> bool {
        !matches!(self.kind, MediaKind::Unknown)
    }
}

/// Library roots the engine is allowed to write into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryRoots {
    #[serde(rename = "movies", default)]
    pub movie_path: PathBuf,
    #[serde(rename = "tv", default)]
    pub tv_path: PathBuf,
}

impl LibraryRoots {
    pub fn new(movie_path: impl Into<PathBuf>, tv_path: impl Into<PathBuf>) -> Self {
        Self {
            movie_path: movie_path.into(),
            tv_path: tv_path.into(),
        }
    }

    pub fn root_for(&self, kind: MediaKind) -> Option<&PathBuf> {
        match kind {
            MediaKind::Movie => Some(&self.movie_path),
            MediaKind::TvEpisode => Some(&self.tv_path),
            MediaKind::Unknown => None,
        }
    }
}

/// Caller switches that apply to any move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveOptions {
    pub cleanup_after_move: bool,
    pub use_elevated_copy: bool,
}

impl MoveOptions {
    pub const fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup_after_move = cleanup;
        self
    }

    pub const fn with_elevation(mut self, elevated: bool) -> Self {
        self.use_elevated_copy = elevated;
        self
    }
}

/// One request to place a download into the library
#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub source_path: PathBuf,
    pub classification: Classification,
    pub cleanup_after_move: bool,
    pub use_elevated_copy: bool,
}

impl MoveRequest {
    pub fn new(source_path: impl Into<PathBuf>, classification: Classification) -> Self {
        Self {
            source_path: source_path.into(),
            classification,
            cleanup_after_move: false,
            use_elevated_copy: false,
        }
    }

    pub const fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup_after_move = cleanup;
        self
    }

    pub const fn with_elevation(mut self, elevated: bool) -> Self {
        self.use_elevated_copy = elevated;
        self
    }

    pub const fn with_options(self, options: MoveOptions) -> Self {
        self.with_cleanup(options.cleanup_after_move)
            .with_elevation(options.use_elevated_copy)
    }
}

/// Summary of a successful move
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveOutcome {
    pub moved_video_paths: Vec<PathBuf>,
    pub moved_subtitle_paths: Vec<PathBuf>,
    pub destination_root: PathBuf,
    pub media_kind: MediaKind,
    pub total_bytes: u64,
    pub files_moved: usize,
    pub remaining_source_entries: Vec<PathBuf>,
    pub source_dir: PathBuf,
    /// Downgraded failures (subtitle copies, cleanup)
    pub warnings: Vec<String>,
}
