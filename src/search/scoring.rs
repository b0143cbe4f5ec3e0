//! Weighted match scoring between a remembered song and a fresh candidate.
//!
//! The weights are empirical. They are kept as named constants so that
//! tuning one never silently shifts the others.

use super::models::{SongRef, TrackCandidate};
use super::normalize::{
    extract_catalog_id, normalize_text, normalize_url, token_overlap_ratio, tokenize,
};

pub const CATALOG_ID_MATCH: i32 = 1200;
pub const URL_EXACT_MATCH: i32 = 1000;
pub const URL_SUFFIX_MATCH: i32 = 700;
pub const CONFLICTING_ID_PENALTY: i32 = -35;

pub const TITLE_EXACT: i32 = 140;
pub const TITLE_PARTIAL: i32 = 90;
pub const TITLE_OVERLAP_MAX: f64 = 80.0;

pub const ARTIST_EXACT: i32 = 45;
pub const ARTIST_PARTIAL: i32 = 20;

pub const ALBUM_EXACT: i32 = 65;
pub const ALBUM_PARTIAL: i32 = 30;
pub const ALBUM_OVERLAP_MAX: f64 = 30.0;

pub const DURATION_EQUAL: i32 = 55;
pub const DURATION_WITHIN_2S: i32 = 40;
pub const DURATION_WITHIN_5S: i32 = 22;
pub const DURATION_FAR_PENALTY: i32 = -15;
const DURATION_FAR_SECS: u32 = 20;

/// Normalized identity of the song being re-resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetProfile {
    pub catalog_id: Option<String>,
    pub url: Option<String>,
    pub title: String,
    pub title_tokens: Vec<String>,
    pub artist: String,
    pub album: String,
    pub album_tokens: Vec<String>,
    pub duration: u32,
}

impl TargetProfile {
    pub fn from_song(song: &SongRef) -> Self {
        let catalog_id = song
            .catalog_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| song.url.as_deref().and_then(extract_catalog_id));
        Self {
            catalog_id,
            url: song.url.as_deref().and_then(normalize_url),
            title: normalize_text(song.title()),
            title_tokens: tokenize(song.title()),
            artist: normalize_text(song.artist()),
            album: normalize_text(song.album()),
            album_tokens: tokenize(song.album()),
            duration: song.duration(),
        }
    }
}

fn candidate_catalog_id(candidate: &TrackCandidate) -> Option<String> {
    candidate
        .catalog_id
        .clone()
        .filter(|id| !id.is_empty())
        .or_else(|| candidate.url.as_deref().and_then(extract_catalog_id))
}

fn is_partial_match(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

fn text_score(target: &str, candidate: &str, exact: i32, partial: i32) -> i32 {
    if target.is_empty() || candidate.is_empty() {
        0
    } else if target == candidate {
        exact
    } else if is_partial_match(target, candidate) {
        partial
    } else {
        0
    }
}

fn duration_score(target: u32, candidate: u32) -> i32 {
    if target == 0 || candidate == 0 {
        return 0;
    }
    match target.abs_diff(candidate) {
        0 => DURATION_EQUAL,
        1..=2 => DURATION_WITHIN_2S,
        3..=5 => DURATION_WITHIN_5S,
        diff if diff >= DURATION_FAR_SECS => DURATION_FAR_PENALTY,
        _ => 0,
    }
}

/// Scores `candidate` against `target`. Pure function of its inputs.
///
/// A catalog id match is decisive, then URL identity. Without either the
/// score is accumulated from title, artist, album and duration evidence.
pub fn score_candidate_match(target: &TargetProfile, candidate: &TrackCandidate) -> i32 {
    let candidate_id = candidate_catalog_id(candidate);
    if let (Some(wanted), Some(found)) = (&target.catalog_id, &candidate_id) {
        if wanted == found {
            return CATALOG_ID_MATCH;
        }
    }

    if let (Some(wanted), Some(found)) = (
        &target.url,
        candidate.url.as_deref().and_then(normalize_url),
    ) {
        if *wanted == found {
            return URL_EXACT_MATCH;
        }
        if wanted.ends_with(found.as_str()) || found.ends_with(wanted.as_str()) {
            return URL_SUFFIX_MATCH;
        }
    }

    let mut score = 0;
    if target.catalog_id.is_some() && candidate_id.is_some() {
        score += CONFLICTING_ID_PENALTY;
    }

    let title = normalize_text(&candidate.title);
    score += text_score(&target.title, &title, TITLE_EXACT, TITLE_PARTIAL);
    let title_overlap = token_overlap_ratio(&target.title_tokens, &tokenize(&candidate.title));
    score += (title_overlap * TITLE_OVERLAP_MAX).round() as i32;

    let artist = normalize_text(&candidate.artist);
    score += text_score(&target.artist, &artist, ARTIST_EXACT, ARTIST_PARTIAL);

    let album = normalize_text(&candidate.album);
    score += text_score(&target.album, &album, ALBUM_EXACT, ALBUM_PARTIAL);
    let album_overlap = token_overlap_ratio(&target.album_tokens, &tokenize(&candidate.album));
    score += (album_overlap * ALBUM_OVERLAP_MAX).round() as i32;

    score += duration_score(target.duration, candidate.duration);
    score
}
