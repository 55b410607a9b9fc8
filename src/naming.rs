//! Plex-style destination names for movies and TV episodes

use crate::error::{MoveError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How movies are laid out under the movie library root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieLayout {
    /// `<root>/Title (Year).ext`
    #[default]
    Flat,
    /// `<root>/Title (Year)/Title (Year).ext`
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MovieNaming {
    pub title: String,
    pub year: Option<u32>,
    /// Extension including the leading dot, e.g. `.mkv`
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TvNaming {
    pub show_title: String,
    pub season: u32,
    pub episode: u32,
    pub episode_title: Option<String>,
    pub extension: String,
}

/// Replace characters that are invalid on common filesystems
///
/// `/ \ : |` become `-`, `"` becomes `'`, `* ? < >` are dropped, control
/// characters are dropped, and leading/trailing spaces and dots are trimmed.
/// Applying it twice gives the same result as applying it once.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .filter_map(|c| match c {
            '/' | '\\' | ':' | '|' => Some('-'),
            '"' => Some('\''),
            '*' | '?' | '<' | '>' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    replaced.trim_matches([' ', '.']).to_string()
}

fn sanitized_title(title: &str, what: &str) -> Result<String> {
    let sanitized = sanitize_filename(title);
    if sanitized.is_empty() {
        return Err(MoveError::InvalidNamingInput {
            reason: format!("{what} is empty"),
        });
    }
    Ok(sanitized)
}

/// Movie stem without extension: `Title (Year)` or `Title`
pub fn movie_stem(title: &str, year: Option<u32>) -> Result<String> {
    let title = sanitized_title(title, "movie title")?;
    Ok(match year {
        Some(year) => format!("{title} ({year})"),
        None => title,
    })
}

/// Path of a movie file relative to the movie library root
pub fn format_movie_path(naming: &MovieNaming, layout: MovieLayout) -> Result<PathBuf> {
    let stem = movie_stem(&naming.title, naming.year)?;
    let file_name = format!("{stem}{}", naming.extension);

    Ok(match layout {
        MovieLayout::Flat => PathBuf::from(file_name),
        MovieLayout::Folder => PathBuf::from(stem).join(file_name),
    })
}

/// Season directory relative to the TV library root: `Show/Season 01`
///
/// Only the directory is decided here; episode files keep their original name
/// so the embedded `SxxExx` marker stays visible to Plex.
pub fn format_tv_directory(show_title: &str, season: u32) -> Result<PathBuf> {
    let show = sanitized_title(show_title, "show title")?;
    Ok(PathBuf::from(show).join(format!("Season {season:02}")))
}

/// Explicit episode file name: `Show - S01E02 - Episode Title.mkv`
pub fn format_tv_filename(naming: &TvNaming) -> Result<String> {
    let show = sanitized_title(&naming.show_title, "show title")?;
    let mut name = format!("{show} - S{:02}E{:02}", naming.season, naming.episode);

    if let Some(episode_title) = naming
        .episode_title
        .as_deref()
        .map(sanitize_filename)
        .filter(|t| !t.is_empty())
    {
        name.push_str(" - ");
        name.push_str(&episode_title);
    }

    name.push_str(&naming.extension);
    Ok(name)
}

/// Full episode path: `Show/Season 01/Show - S01E02 - Title.mkv`
pub fn format_tv_path(naming: &TvNaming) -> Result<PathBuf> {
    Ok(format_tv_directory(&naming.show_title, naming.season)?.join(format_tv_filename(naming)?))
}

/// Rename a subtitle that belongs to a renamed movie
///
/// `Some.Movie.2021.1080p.en.srt` next to `Some.Movie.2021.1080p.mkv` becomes
/// `Some Movie (2021).en.srt`. Subtitles that do not start with the video stem
/// keep their name.
pub fn movie_subtitle_name(movie_stem: &str, video_stem: &str, subtitle_name: &str) -> String {
    let lower_sub = subtitle_name.to_lowercase();
    let lower_video = video_stem.to_lowercase();

    if video_stem.is_empty() || !lower_sub.starts_with(&lower_video) {
        return subtitle_name.to_string();
    }

    // same length in bytes only when lowercasing kept the prefix length
    match subtitle_name.get(video_stem.len()..) {
        Some(suffix) if lower_sub.len() == subtitle_name.len() => format!("{movie_stem}{suffix}"),
        _ => subtitle_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVALID: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

    #[test]
    fn test_sanitize_replacements() {
        assert_eq!(sanitize_filename("AC/DC: Live"), "AC-DC- Live");
        assert_eq!(sanitize_filename("What If...?"), "What If");
        assert_eq!(sanitize_filename("Say \"Hi\""), "Say 'Hi'");
        assert_eq!(sanitize_filename("a<b>c*d|e\\f"), "abcd-e-f");
        assert_eq!(sanitize_filename("  .hidden. "), "hidden");
    }

    #[test]
    fn test_sanitize_keeps_unicode() {
        assert_eq!(sanitize_filename("Amélie"), "Amélie");
        assert_eq!(sanitize_filename("Сериал"), "Сериал");
    }

    #[test]
    fn test_sanitize_is_idempotent_and_clean() {
        let inputs = [
            "",
            "...",
            " . : . ",
            "Mission: Impossible - Dead Reckoning Part One",
            "?What? / Why \\ How |",
            "a\tb\nc",
            "..  ./x/.  ..",
            "\"quoted\" <tag> *star*",
            "trailing dot.",
        ];
        for input in inputs {
            let once = sanitize_filename(input);
            let twice = sanitize_filename(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
            assert!(
                !once.contains(INVALID),
                "invalid char left in {once:?} (from {input:?})"
            );
        }
    }

    #[test]
    fn test_format_movie_path_flat() {
        let naming = MovieNaming {
            title: "Some Movie".to_string(),
            year: Some(2021),
            extension: ".mkv".to_string(),
        };
        let path = format_movie_path(&naming, MovieLayout::Flat).unwrap();
        assert_eq!(path, PathBuf::from("Some Movie (2021).mkv"));
    }

    #[test]
    fn test_format_movie_path_folder() {
        let naming = MovieNaming {
            title: "Some Movie".to_string(),
            year: Some(2021),
            extension: ".mkv".to_string(),
        };
        let path = format_movie_path(&naming, MovieLayout::Folder).unwrap();
        assert_eq!(path, PathBuf::from("Some Movie (2021)/Some Movie (2021).mkv"));
    }

    #[test]
    fn test_format_movie_path_without_year() {
        let naming = MovieNaming {
            title: "Untitled: Director's Cut".to_string(),
            year: None,
            extension: ".mp4".to_string(),
        };
        let path = format_movie_path(&naming, MovieLayout::Flat).unwrap();
        assert_eq!(path, PathBuf::from("Untitled- Director's Cut.mp4"));
    }

    #[test]
    fn test_format_movie_path_empty_title() {
        let naming = MovieNaming {
            title: "  ".to_string(),
            year: Some(2021),
            extension: ".mkv".to_string(),
        };
        let err = format_movie_path(&naming, MovieLayout::Flat).unwrap_err();
        assert!(matches!(err, MoveError::InvalidNamingInput { .. }));
    }

    #[test]
    fn test_format_tv_directory() {
        assert_eq!(
            format_tv_directory("Show", 1).unwrap(),
            PathBuf::from("Show/Season 01")
        );
        assert_eq!(
            format_tv_directory("Doctor Who (2005)", 12).unwrap(),
            PathBuf::from("Doctor Who (2005)/Season 12")
        );
        assert_eq!(
            format_tv_directory("Long Runner", 104).unwrap(),
            PathBuf::from("Long Runner/Season 104")
        );
    }

    #[test]
    fn test_format_tv_directory_empty_show() {
        assert!(matches!(
            format_tv_directory("", 1),
            Err(MoveError::InvalidNamingInput { .. })
        ));
        assert!(format_tv_directory("???", 1).is_err());
    }

    #[test]
    fn test_format_tv_filename() {
        let naming = TvNaming {
            show_title: "Breaking Bad".to_string(),
            season: 1,
            episode: 5,
            episode_title: Some("Gray Matter".to_string()),
            extension: ".mkv".to_string(),
        };
        assert_eq!(
            format_tv_filename(&naming).unwrap(),
            "Breaking Bad - S01E05 - Gray Matter.mkv"
        );
        assert_eq!(
            format_tv_path(&naming).unwrap(),
            PathBuf::from("Breaking Bad/Season 01/Breaking Bad - S01E05 - Gray Matter.mkv")
        );
    }

    #[test]
    fn test_format_tv_filename_without_episode_title() {
        let naming = TvNaming {
            show_title: "Show".to_string(),
            season: 3,
            episode: 16,
            episode_title: Some("  ".to_string()),
            extension: ".mp4".to_string(),
        };
        assert_eq!(format_tv_filename(&naming).unwrap(), "Show - S03E16.mp4");
    }

    #[test]
    fn test_movie_subtitle_name() {
        assert_eq!(
            movie_subtitle_name("Some Movie (2021)", "Some.Movie.2021.1080p", "Some.Movie.2021.1080p.en.srt"),
            "Some Movie (2021).en.srt"
        );
        assert_eq!(
            movie_subtitle_name("Some Movie (2021)", "Some.Movie.2021.1080p", "some.movie.2021.1080p.srt"),
            "Some Movie (2021).srt"
        );
        assert_eq!(
            movie_subtitle_name("Some Movie (2021)", "Some.Movie.2021.1080p", "English.srt"),
            "English.srt"
        );
    }
}
