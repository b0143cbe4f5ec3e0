//! Text, URL and artwork normalization shared by the dispatcher, the
//! identity index and the resolver.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;
use url::Url;

lazy_static! {
    static ref NOISE_GROUP: Regex = Regex::new(
        r"(?i)[\(\[][^\)\]]*\b(feat\.?|ft\.?|featuring|remaster(ed)?|explicit|clean|version|edit|mono|stereo|deluxe|bonus)\b[^\)\]]*[\)\]]"
    )
    .unwrap();
    static ref NOISE_SUFFIX: Regex = Regex::new(
        r"(?i)\s+-\s+[^-]*\b(remaster(ed)?|version|edit|mono|stereo|live)\b.*$"
    )
    .unwrap();
    static ref INLINE_FEATURING: Regex =
        Regex::new(r"(?i)\s+(feat\.?|ft\.?|featuring)\s+.*$").unwrap();
    static ref FROM_CLAUSE: Regex = Regex::new(
        r#"(?i)[\(\[]\s*from\s+["“'‘]?([^"”'’\)\]]+?)["”'’]?\s*[\)\]]"#
    )
    .unwrap();
    static ref ARTWORK_DIMENSIONS: Regex = Regex::new(r"(\d{2,4})x(\d{2,4})").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Lowercased words joined by single spaces, punctuation dropped.
pub fn normalize_text(s: &str) -> String {
    tokenize(s).join(" ")
}

pub fn tokenize(s: &str) -> Vec<String> {
    s.to_lowercase()
        .unicode_words()
        .map(|w| w.to_string())
        .collect()
}

/// Cache key for a free-text query.
pub fn query_key(query: &str) -> String {
    collapse_whitespace(&query.to_lowercase())
}

/// Strips featuring credits, remaster/version/edit tags and similar noise.
///
/// Returns the trimmed input if stripping would leave nothing.
pub fn strip_query_noise(title: &str) -> String {
    let stripped = NOISE_GROUP.replace_all(title, " ");
    let stripped = NOISE_SUFFIX.replace(&stripped, "");
    let stripped = INLINE_FEATURING.replace(&stripped, "");
    let cleaned = collapse_whitespace(&stripped);
    if cleaned.is_empty() {
        collapse_whitespace(title)
    } else {
        cleaned
    }
}

/// Label of a `(From "Movie")` clause, if the title carries one.
pub fn extract_from_label(title: &str) -> Option<String> {
    FROM_CLAUSE
        .captures(title)
        .map(|caps| caps[1].trim().to_string())
        .filter(|label| !label.is_empty())
}

pub fn remove_from_clause(title: &str) -> String {
    collapse_whitespace(&FROM_CLAUSE.replace_all(title, " "))
}

/// Parts of a `"A - B"` title; empty unless there are at least two.
pub fn split_dash_parts(title: &str) -> Vec<String> {
    let parts: Vec<String> = title
        .split(" - ")
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() >= 2 {
        parts
    } else {
        Vec::new()
    }
}

/// |A ∩ B| / max(|A|, |B|) over distinct tokens, 0.0 if either side is empty.
pub fn token_overlap_ratio(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&str> = a.iter().map(|s| s.as_str()).collect();
    let b: HashSet<&str> = b.iter().map(|s| s.as_str()).collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(&b).count();
    shared as f64 / a.len().max(b.len()) as f64
}

fn parse_url(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Url::parse(raw)
        .or_else(|_| Url::parse(&format!("https://{}", raw)))
        .ok()
        .filter(|u| u.host_str().is_some())
}

/// Scheme-less, lowercased `host/path` form. Only the `i` query parameter
/// (track selector inside an album page) is kept.
pub fn normalize_url(raw: &str) -> Option<String> {
    let url = parse_url(raw)?;
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let path = url.path().trim_end_matches('/').to_lowercase();
    let mut normalized = format!("{}{}", host, path);
    if let Some((_, track)) = url.query_pairs().find(|(k, _)| k == "i") {
        normalized.push_str("?i=");
        normalized.push_str(&track.to_lowercase());
    }
    Some(normalized)
}

/// Catalog id from a catalog URL: the `i`/`id` query parameter, otherwise
/// the last path segment if it looks like an identifier.
pub fn extract_catalog_id(raw: &str) -> Option<String> {
    let url = parse_url(raw)?;
    for key in ["i", "id"] {
        if let Some((_, value)) = url.query_pairs().find(|(k, _)| k == key) {
            if !value.is_empty() {
                return Some(value.into_owned());
            }
        }
    }
    let last = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()?
        .to_string();
    let looks_like_id = last.len() >= 5
        && last.chars().all(|c| c.is_ascii_alphanumeric())
        && last.chars().any(|c| c.is_ascii_digit());
    looks_like_id.then_some(last)
}

/// Rewrites `NNNxNNN` dimension tokens smaller than `size` to `size x size`.
pub fn upgrade_artwork_url(url: &str, size: u32) -> String {
    ARTWORK_DIMENSIONS
        .replace_all(url, |caps: &regex::Captures| {
            let width: u32 = caps[1].parse().unwrap_or(u32::MAX);
            let height: u32 = caps[2].parse().unwrap_or(u32::MAX);
            if width < size && height < size {
                format!("{size}x{size}")
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}
