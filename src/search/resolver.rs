//! Re-resolution of a remembered song into a candidate with a live handle.
//!
//! Runs inside an exclusive gate task: it is handed the driver and page of
//! the task that already holds the session, and issues its searches
//! directly.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::index::SearchContext;
use super::models::{SearchType, SongRef, TrackCandidate};
use super::normalize::{
    extract_from_label, normalize_text, remove_from_clause, split_dash_parts, strip_query_noise,
};
use super::scoring::{score_candidate_match, TargetProfile};
use crate::automation::{race, AutomationDriver, PageHandle, SearchOptions};
use crate::config::ResolverSettings;
use crate::error::FetchError;
use crate::metrics;

/// Reported before each query variant is tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveProgress {
    /// 1-based.
    pub attempt: usize,
    pub total: usize,
    pub query: String,
}

fn push_unique(list: &mut Vec<String>, value: String) {
    let value = value.trim().to_string();
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

/// Title spellings to search with, most literal first.
fn title_variants(title: &str) -> Vec<String> {
    let mut variants = Vec::new();
    push_unique(&mut variants, title.to_string());
    let cleaned = strip_query_noise(title);
    push_unique(&mut variants, cleaned.clone());

    let label = extract_from_label(title);
    let mut base = cleaned;
    if let Some(label) = &label {
        let without = remove_from_clause(title);
        push_unique(&mut variants, without.clone());
        let cleaned_without = strip_query_noise(&without);
        push_unique(&mut variants, cleaned_without.clone());
        push_unique(&mut variants, label.clone());
        base = cleaned_without;
    }

    let parts = split_dash_parts(&base);
    if parts.len() >= 2 {
        let mut reversed = parts.clone();
        reversed.reverse();
        for ordering in [parts, reversed] {
            let joined = ordering.join(" ");
            push_unique(&mut variants, joined.clone());
            push_unique(&mut variants, strip_query_noise(&joined));
            if let Some(label) = &label {
                push_unique(&mut variants, format!("{} {}", joined, label));
            }
        }
    }
    variants
}

/// Ordered, de-duplicated search queries for re-locating `song`.
///
/// Title variants are paired with the artist first, then with the album and
/// in reversed order, then whole-string combinations, then bare titles.
/// Without artist and album the bare titles are all there is.
pub fn build_resolve_queries(song: &SongRef, max_variants: usize) -> Vec<String> {
    let title = song.title().trim();
    let artist = song.artist().trim();
    let album = song.album().trim();
    let titles = title_variants(title);

    let mut queries = Vec::new();
    if !artist.is_empty() || !album.is_empty() {
        if !artist.is_empty() {
            for t in &titles {
                queries.push(format!("{} {}", t, artist));
            }
        }
        for t in &titles {
            if !album.is_empty() {
                queries.push(format!("{} {}", t, album));
            }
            if !artist.is_empty() {
                queries.push(format!("{} {}", artist, t));
            }
            if !album.is_empty() {
                queries.push(format!("{} {}", album, t));
            }
        }
        let cleaned = strip_query_noise(title);
        queries.push(
            [cleaned.as_str(), artist, album]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" "),
        );
        queries.push(
            [artist, album, cleaned.as_str()]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" "),
        );
    }
    queries.extend(titles);

    let mut seen = HashSet::new();
    queries
        .into_iter()
        .filter(|q| {
            let key = normalize_text(q);
            !key.is_empty() && seen.insert(key)
        })
        .take(max_variants)
        .collect()
}

/// Resolved fields win; the caller's metadata fills the gaps.
fn merge_with_original(resolved: TrackCandidate, original: &SongRef) -> TrackCandidate {
    let or_original = |value: String, fallback: &Option<String>| {
        if value.trim().is_empty() {
            fallback.clone().unwrap_or_default()
        } else {
            value
        }
    };
    TrackCandidate {
        title: or_original(resolved.title, &original.title),
        artist: or_original(resolved.artist, &original.artist),
        album: or_original(resolved.album, &original.album),
        subtitle: or_original(resolved.subtitle, &original.subtitle),
        duration: if resolved.duration > 0 {
            resolved.duration
        } else {
            original.duration()
        },
        artwork: resolved.artwork.or_else(|| original.artwork.clone()),
        url: resolved.url.or_else(|| original.url.clone()),
        catalog_id: resolved.catalog_id.or_else(|| original.catalog_id.clone()),
        ..resolved
    }
}

pub struct SongResolver {
    context: Arc<SearchContext>,
    settings: ResolverSettings,
    query_timeout: Duration,
}

impl SongResolver {
    pub fn new(context: Arc<SearchContext>, settings: ResolverSettings, query_timeout: Duration) -> Self {
        Self {
            context,
            settings,
            query_timeout,
        }
    }

    /// Candidate with a live handle for the requested song.
    ///
    /// Returns the current result set's candidate untouched when it already
    /// has a handle; otherwise searches query variants and keeps the best
    /// scoring candidate.
    pub async fn resolve_downloadable_song(
        &self,
        driver: &dyn AutomationDriver,
        page: &PageHandle,
        index: Option<usize>,
        song: Option<&SongRef>,
        on_progress: &(dyn Fn(ResolveProgress) + Send + Sync),
    ) -> Result<TrackCandidate, FetchError> {
        let existing = self.context.get_song_from_request(index, song);
        if let Some(candidate) = &existing {
            if candidate.has_live_handle() {
                debug!("'{}' already has a live handle", candidate.title);
                return Ok(candidate.clone());
            }
        }

        let remembered = match (song, &existing) {
            (Some(song), _) if song.is_resolvable() => song.clone(),
            (_, Some(candidate)) => SongRef::from(candidate),
            _ => {
                return Err(FetchError::NotFound(
                    "No song in the current results matches the request".to_string(),
                ))
            }
        };
        if !remembered.is_resolvable() {
            return Err(FetchError::NotFound(
                "Song has no title, url or catalog id to resolve".to_string(),
            ));
        }

        let target = TargetProfile::from_song(&remembered);
        let max_variants = if target.catalog_id.is_some() {
            self.settings.max_variants_with_catalog_id
        } else {
            self.settings.max_variants
        };
        let queries = build_resolve_queries(&remembered, max_variants);
        info!(
            "Resolving '{}' with {} query variants",
            remembered.title(),
            queries.len()
        );

        let mut best: Option<(i32, TrackCandidate)> = None;
        let mut last_error: Option<FetchError> = None;
        let options = SearchOptions::resolve(self.settings.batch_size);

        for (i, query) in queries.iter().enumerate() {
            on_progress(ResolveProgress {
                attempt: i + 1,
                total: queries.len(),
                query: query.clone(),
            });
            metrics::record_resolve_attempt();

            let batch = race("resolve query", self.query_timeout, async {
                driver
                    .search(page, query, SearchType::Tracks, options)
                    .await
                    .map_err(FetchError::from)
            })
            .await;
            let batch = match batch {
                Ok(batch) => batch,
                Err(e) => {
                    debug!("Resolve query '{}' failed: {}", query, e);
                    last_error = Some(e);
                    continue;
                }
            };

            for candidate in batch.into_iter().filter(|c| c.has_live_handle()) {
                let score = score_candidate_match(&target, &candidate);
                if score >= self.settings.exact_threshold {
                    debug!("Exact match for '{}' via '{}' ({})", remembered.title(), query, score);
                    return Ok(merge_with_original(candidate, &remembered));
                }
                if best.as_ref().map_or(true, |(s, _)| score > *s) {
                    best = Some((score, candidate));
                }
            }

            if best
                .as_ref()
                .is_some_and(|(s, _)| *s >= self.settings.strong_threshold)
            {
                break;
            }
        }

        match best {
            Some((score, candidate)) => {
                debug!("Resolved '{}' to '{}' ({})", remembered.title(), candidate.title, score);
                Ok(merge_with_original(candidate, &remembered))
            }
            None => match last_error {
                Some(e) => {
                    warn!("Could not resolve '{}': {}", remembered.title(), e);
                    Err(e)
                }
                None => Err(FetchError::NotFound(format!(
                    "Could not resolve '{}'",
                    remembered.title()
                ))),
            },
        }
    }
}
