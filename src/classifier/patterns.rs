use crate::media::MediaKind;
use lazy_regex::{Regex, regex};

/// A single heuristic hit on a file stem
///
/// `title_end` is the byte offset in the stem where the raw title candidate
/// ends (everything before the matched marker).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternMatch {
    pub kind: MediaKind,
    pub title_end: usize,
    pub season: u32,
    pub episode: u32,
    pub year: Option<u32>,
    pub confidence: f64,
}

pub type Extractor = fn(&str) -> Option<PatternMatch>;

/// Extractors in priority order. The first hit wins.
pub const EXTRACTORS: &[(&str, Extractor)] = &[
    ("season_episode", season_episode),
    ("cross_episode", cross_episode),
    ("season_pack", season_pack),
    ("release_year", release_year),
];

pub const SEASON_EPISODE_CONFIDENCE: f64 = 0.9;
pub const CROSS_EPISODE_CONFIDENCE: f64 = 0.8;
pub const SEASON_PACK_CONFIDENCE: f64 = 0.7;
pub const RELEASE_YEAR_CONFIDENCE: f64 = 0.8;

/// `S01E05`, `s1e5`, `S12E25`
pub fn season_episode(stem: &str) -> Option<PatternMatch> {
    let re: &Regex = regex!(r"(?i)s(\d{1,2})e(\d{1,2})");
    let captures = re.captures(stem)?;

    Some(PatternMatch {
        kind: MediaKind::TvEpisode,
        title_end: captures.get(0)?.start(),
        season: captures.get(1)?.as_str().parse().ok()?,
        episode: captures.get(2)?.as_str().parse().ok()?,
        year: None,
        confidence: SEASON_EPISODE_CONFIDENCE,
    })
}

/// `1x02`, `12x05`; resolutions like `1920x1080` are not episodes
pub fn cross_episode(stem: &str) -> Option<PatternMatch> {
    let re: &Regex = regex!(r"(?i)(?:^|[^0-9a-z])(\d{1,2})x(\d{2})(?:[^0-9]|$)");
    let captures = re.captures(stem)?;

    Some(PatternMatch {
        kind: MediaKind::TvEpisode,
        title_end: captures.get(0)?.start(),
        season: captures.get(1)?.as_str().parse().ok()?,
        episode: captures.get(2)?.as_str().parse().ok()?,
        year: None,
        confidence: CROSS_EPISODE_CONFIDENCE,
    })
}

/// Season packs without an episode marker: `Show.S02.1080p`, `Show Season 3`
pub fn season_pack(stem: &str) -> Option<PatternMatch> {
    let re: &Regex =
        regex!(r"(?i)(?:^|[^a-z0-9])(?:s(\d{1,2})|season[ ._-]?(\d{1,2}))(?:[^a-z0-9]|$)");
    let captures = re.captures(stem)?;
    let season = captures.get(1).or_else(|| captures.get(2))?;

    Some(PatternMatch {
        kind: MediaKind::TvEpisode,
        title_end: captures.get(0)?.start(),
        season: season.as_str().parse().ok()?,
        episode: 0,
        year: None,
        confidence: SEASON_PACK_CONFIDENCE,
    })
}

/// A standalone four digit year in 1900-2099 with a non-empty title before it
///
/// When two years sit next to each other (`Blade.Runner.2049.2017`) the second
/// one is the release year and the first belongs to the title.
pub fn release_year(stem: &str) -> Option<PatternMatch> {
    let re: &Regex = regex!(r"(?:19|20)\d{2}");
    let bytes = stem.as_bytes();

    let candidates: Vec<(usize, usize)> = re
        .find_iter(stem)
        .filter(|m| {
            let before_ok = m.start() == 0 || !bytes[m.start() - 1].is_ascii_digit();
            let after_ok = m.end() == bytes.len() || !bytes[m.end()].is_ascii_digit();
            before_ok && after_ok
        })
        .map(|m| (m.start(), m.end()))
        .collect();

    for (i, &(start, end)) in candidates.iter().enumerate() {
        if clean_title(&stem[..start]).is_empty() {
            continue;
        }

        let (start, end) = match candidates.get(i + 1) {
            Some(&(next_start, next_end)) if stem[end..next_start].chars().all(is_separator) => {
                (next_start, next_end)
            }
            _ => (start, end),
        };

        return Some(PatternMatch {
            kind: MediaKind::Movie,
            title_end: start,
            season: 0,
            episode: 0,
            year: stem[start..end].parse().ok(),
            confidence: RELEASE_YEAR_CONFIDENCE,
        });
    }

    None
}

const fn is_separator(c: char) -> bool {
    matches!(c, '.' | '_' | ' ' | '-' | '(' | ')' | '[' | ']' | '{' | '}')
}

/// Turn a raw release-name fragment into a display title
///
/// Dots and underscores become spaces, separators left dangling in front of the
/// dropped marker are removed, and whitespace runs collapse to one space.
pub fn clean_title(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if c == '.' || c == '_' { ' ' } else { c })
        .collect();

    spaced
        .trim_end_matches([' ', '-', '(', '[', '{'])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
