//! Search cache and dispatcher.
//!
//! Track searches are served from a TTL cache, then the fast lookup, and
//! only then the automation session. Artist searches fall back to artists
//! derived from a track search. Album and playlist searches always go
//! through the automation session.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::cache::BoundedCache;
use super::models::{CandidateKind, SearchType, TrackCandidate};
use super::normalize::{
    extract_catalog_id, normalize_text, query_key, token_overlap_ratio, tokenize,
    upgrade_artwork_url,
};
use crate::automation::{race, FastLookup, GateHandle, SearchOptions, SessionCredentials};
use crate::config::{SearchSettings, TimeoutSettings};
use crate::error::FetchError;
use crate::metrics;

/// Inner and outer timeout of one automation search.
#[derive(Debug, Clone, Copy)]
struct SearchBudget {
    action_stage: &'static str,
    action: Duration,
    task_stage: &'static str,
    task: Duration,
}

/// Normalizes a candidate set: positions become ordinals, artwork is
/// upgraded and catalog ids are filled in from URLs.
pub fn ingest_candidates(candidates: Vec<TrackCandidate>, artwork_size: u32) -> Vec<TrackCandidate> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(index, mut candidate)| {
            candidate.index = index;
            candidate.artwork = candidate
                .artwork
                .map(|artwork| upgrade_artwork_url(&artwork, artwork_size));
            if candidate.catalog_id.is_none() {
                candidate.catalog_id = candidate.url.as_deref().and_then(extract_catalog_id);
            }
            candidate
        })
        .collect()
}

/// Distinct artists seen in `tracks`, in order of first appearance.
///
/// Artists sharing a token with the query come first; when none do, every
/// distinct artist is returned.
pub fn derive_artists(query: &str, tracks: &[TrackCandidate], limit: usize) -> Vec<TrackCandidate> {
    let query_tokens = tokenize(query);
    let mut seen = HashSet::new();
    let mut distinct: Vec<&TrackCandidate> = Vec::new();
    for track in tracks {
        let key = normalize_text(&track.artist);
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        distinct.push(track);
    }

    let overlapping: Vec<&TrackCandidate> = distinct
        .iter()
        .copied()
        .filter(|t| token_overlap_ratio(&tokenize(&t.artist), &query_tokens) > 0.0)
        .collect();
    let chosen = if overlapping.is_empty() {
        distinct
    } else {
        overlapping
    };

    chosen
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, track)| TrackCandidate {
            index,
            kind: CandidateKind::Artist,
            title: track.artist.clone(),
            artist: track.artist.clone(),
            subtitle: "Artist".to_string(),
            artwork: track.artwork.clone(),
            downloadable: false,
            ..Default::default()
        })
        .collect()
}

pub struct SearchDispatcher {
    gate: GateHandle,
    fast_lookup: Option<Arc<dyn FastLookup>>,
    cache: Mutex<BoundedCache<String, Vec<TrackCandidate>>>,
    credentials: Option<SessionCredentials>,
    settings: SearchSettings,
    timeouts: TimeoutSettings,
}

impl SearchDispatcher {
    pub fn new(
        gate: GateHandle,
        fast_lookup: Option<Arc<dyn FastLookup>>,
        credentials: Option<SessionCredentials>,
        settings: SearchSettings,
        timeouts: TimeoutSettings,
    ) -> Self {
        let cache = BoundedCache::new(settings.cache_capacity, Some(settings.cache_ttl));
        Self {
            gate,
            fast_lookup,
            cache: Mutex::new(cache),
            credentials,
            settings,
            timeouts,
        }
    }

    fn track_budget(&self) -> SearchBudget {
        SearchBudget {
            action_stage: "automation search",
            action: self.timeouts.track_search,
            task_stage: "automation search task",
            task: self.timeouts.track_task,
        }
    }

    fn artist_budget(&self) -> SearchBudget {
        SearchBudget {
            action_stage: "artist search",
            action: self.timeouts.artist_search,
            task_stage: "artist search task",
            task: self.timeouts.artist_task,
        }
    }

    pub fn has_fast_lookup(&self) -> bool {
        self.fast_lookup.is_some()
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Ordered candidates for `query`. An empty query yields no results.
    pub async fn search_by_type(
        &self,
        query: &str,
        search_type: SearchType,
    ) -> Result<Vec<TrackCandidate>, FetchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Dispatching {} search for '{}'", search_type, query);

        match search_type {
            SearchType::Tracks => self.search_tracks(query).await,
            SearchType::Artists => self.search_artists(query).await,
            SearchType::Albums | SearchType::Playlists => {
                let results = self
                    .automation_search(
                        query,
                        search_type,
                        self.settings.track_limit,
                        self.track_budget(),
                    )
                    .await?;
                metrics::record_search(search_type.as_str(), "automation");
                Ok(self.ingest(results))
            }
        }
    }

    fn ingest(&self, candidates: Vec<TrackCandidate>) -> Vec<TrackCandidate> {
        ingest_candidates(candidates, self.settings.artwork_size)
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackCandidate>, FetchError> {
        let key = query_key(query);
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            debug!("Track search cache hit for '{}'", key);
            metrics::record_search("tracks", "cache");
            return Ok(cached);
        }

        let Some(fast_lookup) = self.fast_lookup.clone() else {
            let results = self
                .automation_search(query, SearchType::Tracks, self.settings.track_limit, self.track_budget())
                .await?;
            let results = self.ingest(results);
            if !results.is_empty() {
                self.cache.lock().unwrap().insert(key, results.clone());
            }
            metrics::record_search("tracks", "automation");
            return Ok(results);
        };

        let limit = self.settings.track_limit;
        let fast = race("fast lookup", self.timeouts.fast_lookup, async {
            fast_lookup.lookup(query, limit).await.map_err(FetchError::from)
        })
        .await;

        match fast {
            Ok(results) => {
                let results = self.ingest(results);
                self.cache.lock().unwrap().insert(key, results.clone());
                metrics::record_search("tracks", "fast");
                Ok(results)
            }
            Err(fast_err) => {
                warn!(
                    "Fast lookup for '{}' failed, falling back to automation: {}",
                    query, fast_err
                );
                match self
                    .automation_search(query, SearchType::Tracks, limit, self.track_budget())
                    .await
                {
                    Ok(results) if !results.is_empty() => {
                        let results = self.ingest(results);
                        self.cache.lock().unwrap().insert(key, results.clone());
                        metrics::record_search("tracks", "automation");
                        Ok(results)
                    }
                    Ok(_) => Err(fast_err),
                    Err(fallback_err) => {
                        warn!("Automation fallback for '{}' failed: {}", query, fallback_err);
                        Err(fast_err)
                    }
                }
            }
        }
    }

    async fn search_artists(&self, query: &str) -> Result<Vec<TrackCandidate>, FetchError> {
        let limit = self.settings.artist_limit;
        match self
            .automation_search(query, SearchType::Artists, limit, self.artist_budget())
            .await
        {
            Ok(results) if !results.is_empty() => {
                metrics::record_search("artists", "automation");
                return Ok(self.ingest(results));
            }
            Ok(_) => debug!("Artist search for '{}' was empty, deriving from tracks", query),
            Err(e) => info!("Artist search for '{}' failed, deriving from tracks: {}", query, e),
        }

        let tracks = self.search_tracks(query).await?;
        metrics::record_search("artists", "derived");
        Ok(derive_artists(query, &tracks, limit))
    }

    /// Runs one search through the gate: session init, then the search
    /// action, all bounded by the task budget including the queue wait.
    async fn automation_search(
        &self,
        query: &str,
        search_type: SearchType,
        limit: usize,
        budget: SearchBudget,
    ) -> Result<Vec<TrackCandidate>, FetchError> {
        let credentials = self.credentials.clone();
        let session_timeout = self.timeouts.session_init;
        let query = query.to_string();

        let task = self.gate.run_exclusive("search", move |driver| async move {
            race("session init", session_timeout, async {
                driver
                    .ensure_session_ready(credentials.as_ref())
                    .await
                    .map_err(FetchError::from)
            })
            .await?;
            let page = driver.current_page()?;
            race(budget.action_stage, budget.action, async {
                driver
                    .search(&page, &query, search_type, SearchOptions::listing(limit))
                    .await
                    .map_err(FetchError::from)
            })
            .await
        });
        race(budget.task_stage, budget.task, task).await
    }
}
