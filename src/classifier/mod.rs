//! Media type, title, and season/episode inference from release names

mod patterns;

pub use patterns::{
    CROSS_EPISODE_CONFIDENCE, EXTRACTORS, Extractor, PatternMatch, RELEASE_YEAR_CONFIDENCE,
    SEASON_EPISODE_CONFIDENCE, SEASON_PACK_CONFIDENCE, clean_title, cross_episode, release_year,
    season_episode, season_pack,
};

use crate::error::{MoveError, Result};
use crate::locator::is_media_extension;
use crate::media::{Classification, MediaKind};
use std::path::Path;

/// Classify a file or directory name
///
/// Never fails: names that match no heuristic come back as
/// [`MediaKind::Unknown`] with a cleaned title and low confidence.
pub fn classify(name: &str) -> Classification {
    let stem = strip_media_extension(final_component(name));

    for (label, extractor) in EXTRACTORS {
        let Some(hit) = extractor(stem) else {
            continue;
        };

        let title = clean_title(&stem[..hit.title_end]);
        if hit.kind == MediaKind::Movie && title.is_empty() {
            continue;
        }

        tracing::trace!(
            "Classified '{}' via {}: {} '{}' (confidence {:.2})",
            name,
            label,
            hit.kind,
            title,
            hit.confidence
        );

        return Classification {
            kind: hit.kind,
            title,
            year: hit.year,
            season: hit.season,
            episode: hit.episode,
            confidence: hit.confidence,
        };
    }

    Classification::unknown(clean_title(stem))
}

/// Classify a path, preferring the innermost directory name
///
/// Release directories usually carry the real title while the file inside may be
/// a bare group tag. If the directory yields nothing, the file name is used.
/// An episode marker on the file name beats a non-TV directory guess.
pub fn classify_path(path: &Path) -> Classification {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let names_file = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(is_media_extension);

    if !names_file {
        return classify(&file_name);
    }

    let from_dir = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| classify(&n.to_string_lossy()));
    let from_file = classify(&file_name);

    match from_dir {
        Some(dir) if dir.is_detected() => {
            if from_file.kind == MediaKind::TvEpisode && dir.kind != MediaKind::TvEpisode {
                from_file
            } else {
                dir
            }
        }
        _ => from_file,
    }
}

/// Like [`classify`], but reports an undetected kind as an error
pub fn detect(name: &str) -> Result<Classification> {
    ensure_detected(classify(name), name)
}

/// Like [`classify_path`], but reports an undetected kind as an error
pub fn detect_path(path: &Path) -> Result<Classification> {
    ensure_detected(classify_path(path), &path.to_string_lossy())
}

fn ensure_detected(classification: Classification, name: &str) -> Result<Classification> {
    if classification.is_detected() {
        Ok(classification)
    } else {
        Err(MoveError::DetectionFailed {
            name: name.to_string(),
        })
    }
}

fn final_component(name: &str) -> &str {
    let trimmed = name.trim_end_matches(['/', '\\']);
    trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed)
}

fn strip_media_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() && is_media_extension(ext) => base,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_classify_scene_episode() {
        let c = classify("Breaking.Bad.S01E05.1080p.WEB-DL.mkv");
        assert_eq!(c.kind, MediaKind::TvEpisode);
        assert_eq!(c.title, "Breaking Bad");
        assert_eq!((c.season, c.episode), (1, 5));
        assert!(c.confidence >= 0.85);
    }

    #[test]
    fn test_classify_plex_episode() {
        let c = classify("/mnt/tv/Breaking Bad - s01e05 - Gray Matter.mkv");
        assert_eq!(c.kind, MediaKind::TvEpisode);
        assert_eq!(c.title, "Breaking Bad");
    }

    #[test]
    fn test_classify_episode_patterns_are_always_tv() {
        for (name, season, episode) in [
            ("Show.S1E1.mkv", 1, 1),
            ("Show.s12e25.mp4", 12, 25),
            ("show_S03E16_720p.avi", 3, 16),
            ("S01E02.mkv", 1, 2),
            ("Show.2019.S02E03.mkv", 2, 3),
        ] {
            let c = classify(name);
            assert_eq!(c.kind, MediaKind::TvEpisode, "{name}");
            assert_eq!((c.season, c.episode), (season, episode), "{name}");
            assert!(c.confidence >= 0.85, "{name}");
        }
    }

    #[test]
    fn test_classify_cross_episode() {
        let c = classify("Show.Name.1x02.HDTV.avi");
        assert_eq!(c.kind, MediaKind::TvEpisode);
        assert_eq!(c.title, "Show Name");
        assert_eq!((c.season, c.episode), (1, 2));
        assert!(c.confidence < SEASON_EPISODE_CONFIDENCE);
    }

    #[test]
    fn test_classify_movie() {
        let c = classify("Some.Movie.2021.1080p.mkv");
        assert_eq!(c.kind, MediaKind::Movie);
        assert_eq!(c.title, "Some Movie");
        assert_eq!(c.year, Some(2021));
        assert!((c.confidence - RELEASE_YEAR_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_classify_movie_with_bracketed_year() {
        let c = classify("Some Movie (1999) [1080p].mp4");
        assert_eq!(c.kind, MediaKind::Movie);
        assert_eq!(c.title, "Some Movie");
        assert_eq!(c.year, Some(1999));
    }

    #[test]
    fn test_classify_year_only_is_unknown() {
        let c = classify("2021.mkv");
        assert_eq!(c.kind, MediaKind::Unknown);
        assert_eq!(c.title, "2021");
    }

    #[test]
    fn test_classify_unknown_keeps_cleaned_title() {
        let c = classify("random_home_video.mkv");
        assert_eq!(c.kind, MediaKind::Unknown);
        assert_eq!(c.title, "random home video");
        assert!(c.confidence < 0.5);
    }

    #[test]
    fn test_classify_directory_name_keeps_dotted_tail() {
        // no media extension: ".1080p" must not be treated as one
        let c = classify("Some.Movie.2021.1080p");
        assert_eq!(c.title, "Some Movie");
        let c = classify("Show.S01E02");
        assert_eq!(c.kind, MediaKind::TvEpisode);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let a = classify("The.Office.US.S05E14.720p.mkv");
        let b = classify("The.Office.US.S05E14.720p.mkv");
        assert_eq!(a, b);
    }

    #[test]
    fn test_classify_path_prefers_directory() {
        let path = PathBuf::from("/downloads/Some.Movie.2021.1080p/grp-sm1080.mkv");
        let c = classify_path(&path);
        assert_eq!(c.kind, MediaKind::Movie);
        assert_eq!(c.title, "Some Movie");
    }

    #[test]
    fn test_classify_path_falls_back_to_file() {
        let path = PathBuf::from("/downloads/Show.Name.S02E03.mkv");
        let c = classify_path(&path);
        assert_eq!(c.kind, MediaKind::TvEpisode);
        assert_eq!(c.title, "Show Name");
    }

    #[test]
    fn test_classify_path_episode_file_beats_movie_directory() {
        let path = PathBuf::from("/downloads/Show.Name.2019/Show.Name.S01E04.mkv");
        let c = classify_path(&path);
        assert_eq!(c.kind, MediaKind::TvEpisode);
        assert_eq!(c.season, 1);
    }

    #[test]
    fn test_classify_path_directory_source() {
        let path = PathBuf::from("/downloads/The.Wire.S02.1080p.BluRay");
        let c = classify_path(&path);
        assert_eq!(c.kind, MediaKind::TvEpisode);
        assert_eq!(c.title, "The Wire");
        assert_eq!(c.season, 2);
    }

    #[test]
    fn test_detect_reports_failure() {
        let err = detect("holiday_clip.mkv").unwrap_err();
        assert!(matches!(err, MoveError::DetectionFailed { .. }));
        assert!(detect("Some.Movie.2021.mkv").is_ok());
    }

    #[test]
    fn test_final_component() {
        assert_eq!(final_component("/a/b/c.mkv"), "c.mkv");
        assert_eq!(final_component("C:\\dl\\c.mkv"), "c.mkv");
        assert_eq!(final_component("dir/"), "dir");
        assert_eq!(final_component("plain"), "plain");
    }
}
