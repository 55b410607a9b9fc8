//! Finds the video and subtitle files inside a finished download

use crate::error::{MoveError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "m4v", "avi", "mov", "wmv", "ts", "webm"];
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "sub", "idx", "vtt"];

/// Depth of pack scans: the item itself plus one level of subdirectories
const PACK_SCAN_DEPTH: usize = 2;

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    extension_of(path).is_some_and(|ext| extensions.contains(&ext.as_str()))
}

pub fn is_video(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

pub fn is_subtitle(path: &Path) -> bool {
    has_extension(path, SUBTITLE_EXTENSIONS)
}

/// Extension (without dot) that names a video or subtitle file
pub fn is_media_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    VIDEO_EXTENSIONS.contains(&ext.as_str()) || SUBTITLE_EXTENSIONS.contains(&ext.as_str())
}

fn is_sample(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().to_lowercase().contains("sample"))
}

fn source_metadata(path: &Path) -> Result<fs::Metadata> {
    fs::metadata(path).map_err(|_| MoveError::SourceNotFound {
        path: path.to_path_buf(),
    })
}

/// Files up to [`PACK_SCAN_DEPTH`] below `base`, in walk order
fn pack_files(base: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(base)
        .min_depth(1)
        .max_depth(PACK_SCAN_DEPTH)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping unreadable entry under {}: {}", base.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
}

/// The largest non-sample video of a download
///
/// A file source must itself be a video. A directory source is scanned one
/// level deep only.
pub fn find_principal_video(path: &Path) -> Result<PathBuf> {
    let metadata = source_metadata(path)?;

    if !metadata.is_dir() {
        if is_video(path) {
            return Ok(path.to_path_buf());
        }
        return Err(MoveError::NoVideoFound {
            path: path.to_path_buf(),
            found: Vec::new(),
        });
    }

    let mut largest: Option<(u64, PathBuf)> = None;
    let mut found = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        found.push(entry.file_name().to_string_lossy().into_owned());

        if is_sample(&entry_path) || !is_video(&entry_path) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if largest.as_ref().is_none_or(|(best, _)| size > *best) {
            largest = Some((size, entry_path));
        }
    }

    largest.map(|(_, p)| p).ok_or_else(|| {
        found.sort();
        MoveError::NoVideoFound {
            path: path.to_path_buf(),
            found,
        }
    })
}

/// Every non-sample video of a season pack, sorted by path
///
/// Lexicographic order stands in for episode order; that holds for
/// consistently zero-padded release names only.
pub fn find_all_videos(path: &Path) -> Result<Vec<PathBuf>> {
    let metadata = source_metadata(path)?;

    if !metadata.is_dir() {
        if is_video(path) {
            return Ok(vec![path.to_path_buf()]);
        }
        return Err(MoveError::NoVideoFound {
            path: path.to_path_buf(),
            found: Vec::new(),
        });
    }

    let mut videos: Vec<PathBuf> = pack_files(path)
        .filter(|p| is_video(p) && !is_sample(p))
        .collect();

    if videos.is_empty() {
        return Err(MoveError::NoVideoFound {
            path: path.to_path_buf(),
            found: Vec::new(),
        });
    }

    videos.sort();
    Ok(videos)
}

/// All subtitles near a download
///
/// For a file source the scan covers its parent directory.
pub fn find_subtitles(path: &Path) -> Vec<PathBuf> {
    let base = if path.is_dir() {
        path
    } else {
        match path.parent() {
            Some(parent) => parent,
            None => return Vec::new(),
        }
    };

    let mut subs: Vec<PathBuf> = pack_files(base).filter(|p| is_subtitle(p)).collect();
    subs.sort();
    subs
}

/// Subtitles under `base_dir` whose name starts with the video's stem
pub fn find_subtitles_for_video(base_dir: &Path, video_path: &Path) -> Vec<PathBuf> {
    let Some(stem) = video_path.file_stem() else {
        return Vec::new();
    };
    let stem = stem.to_string_lossy().to_lowercase();

    let mut subs: Vec<PathBuf> = pack_files(base_dir)
        .filter(|p| is_subtitle(p))
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| n.to_string_lossy().to_lowercase().starts_with(&stem))
        })
        .collect();
    subs.sort();
    subs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, size: usize) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    #[test]
    fn test_principal_video_single_file() {
        let temp = TempDir::new().unwrap();
        let video = write(temp.path(), "Movie.2021.mkv", 10);
        assert_eq!(find_principal_video(&video).unwrap(), video);
    }

    #[test]
    fn test_principal_video_rejects_non_video_file() {
        let temp = TempDir::new().unwrap();
        let nfo = write(temp.path(), "Movie.2021.nfo", 10);
        assert!(matches!(
            find_principal_video(&nfo),
            Err(MoveError::NoVideoFound { .. })
        ));
    }

    #[test]
    fn test_principal_video_picks_largest_non_sample() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "small.mp4", 10);
        let big = write(temp.path(), "Movie.2021.1080p.mkv", 100);
        write(temp.path(), "Movie.2021.1080p.SAMPLE.mkv", 1000);
        write(temp.path(), "extras/huge.mkv", 5000);

        assert_eq!(find_principal_video(temp.path()).unwrap(), big);
    }

    #[test]
    fn test_principal_video_none_found_lists_files() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "readme.nfo", 1);
        write(temp.path(), "sample.mkv", 1);

        match find_principal_video(temp.path()) {
            Err(MoveError::NoVideoFound { found, .. }) => {
                assert_eq!(found, vec!["readme.nfo".to_string(), "sample.mkv".to_string()]);
            }
            other => panic!("expected NoVideoFound, got {other:?}"),
        }
    }

    #[test]
    fn test_principal_video_missing_source() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            find_principal_video(&temp.path().join("nope")),
            Err(MoveError::SourceNotFound { .. })
        ));
    }

    #[test]
    fn test_all_videos_sorted_without_sample() {
        let temp = TempDir::new().unwrap();
        let e2 = write(temp.path(), "Show.S01E02.mkv", 1);
        let e1 = write(temp.path(), "Show.S01E01.mkv", 1);
        write(temp.path(), "sample.mkv", 1);

        assert_eq!(find_all_videos(temp.path()).unwrap(), vec![e1, e2]);
    }

    #[test]
    fn test_all_videos_depth_limit() {
        let temp = TempDir::new().unwrap();
        let nested = write(temp.path(), "Season 1/Show.S01E01.mkv", 1);
        write(temp.path(), "Season 1/deeper/Show.S01E02.mkv", 1);

        assert_eq!(find_all_videos(temp.path()).unwrap(), vec![nested]);
    }

    #[test]
    fn test_all_videos_empty_is_error() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "info.txt", 1);
        assert!(find_all_videos(temp.path()).is_err());
    }

    #[test]
    fn test_find_subtitles() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "Movie.en.srt", 1);
        let b = write(temp.path(), "Subs/English.srt", 1);
        write(temp.path(), "Subs/too/deep.srt", 1);
        write(temp.path(), "Movie.mkv", 1);

        assert_eq!(find_subtitles(temp.path()), vec![a, b]);
    }

    #[test]
    fn test_subtitles_for_video() {
        let temp = TempDir::new().unwrap();
        let e1 = write(temp.path(), "Show.S01E01.mkv", 1);
        let e2 = write(temp.path(), "Show.S01E02.mkv", 1);
        let sub = write(temp.path(), "Show.S01E01.en.srt", 1);

        assert_eq!(find_subtitles_for_video(temp.path(), &e1), vec![sub]);
        assert!(find_subtitles_for_video(temp.path(), &e2).is_empty());
    }

    #[test]
    fn test_subtitles_for_video_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let video = write(temp.path(), "Show.S01E01.mkv", 1);
        let sub = write(temp.path(), "subs/show.s01e01.ENG.SRT", 1);

        assert_eq!(find_subtitles_for_video(temp.path(), &video), vec![sub]);
    }

    #[test]
    fn test_media_extension() {
        assert!(is_media_extension("MKV"));
        assert!(is_media_extension("srt"));
        assert!(!is_media_extension("nfo"));
        assert!(!is_media_extension("1080p"));
    }
}
