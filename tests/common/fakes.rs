//! Scripted stand-ins for the automation session and the fast lookup.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use pezzottify_fetcher::automation::{
    AutomationDriver, AutomationPhase, FastLookup, PageHandle, SearchOptions, SessionCredentials,
    SessionHandle, StageProgress, StageProgressFn,
};
use pezzottify_fetcher::search::{SearchType, TrackCandidate};
use pezzottify_fetcher::DownloadSetting;

/// Automation driver with per-query scripted results.
///
/// Results are looked up by lowercased query and search type first, then by
/// search type alone. Unknown searches return an empty list.
#[derive(Default)]
pub struct FakeDriver {
    by_query: Mutex<HashMap<(String, SearchType), Vec<TrackCandidate>>>,
    by_type: Mutex<HashMap<SearchType, Vec<TrackCandidate>>>,
    queries: Mutex<Vec<(String, SearchType)>>,
    search_delay: Mutex<Option<Duration>>,
    download_delay: Mutex<Option<Duration>>,
    fail_searches: AtomicBool,
    fail_downloads: AtomicBool,
    reported_filename: Mutex<Option<String>>,
    session_calls: AtomicUsize,
    search_calls: AtomicUsize,
    download_calls: AtomicUsize,
    downloaded: Mutex<Vec<TrackCandidate>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_query(&self, query: &str, search_type: SearchType, results: Vec<TrackCandidate>) {
        self.by_query
            .lock()
            .unwrap()
            .insert((query.to_lowercase(), search_type), results);
    }

    pub fn script_type(&self, search_type: SearchType, results: Vec<TrackCandidate>) {
        self.by_type.lock().unwrap().insert(search_type, results);
    }

    pub fn set_search_delay(&self, delay: Duration) {
        *self.search_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_download_delay(&self, delay: Option<Duration>) {
        *self.download_delay.lock().unwrap() = delay;
    }

    pub fn set_fail_searches(&self, fail: bool) {
        self.fail_searches.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    /// Reports `filename` as saved instead of writing a file.
    pub fn set_reported_filename(&self, filename: &str) {
        *self.reported_filename.lock().unwrap() = Some(filename.to_string());
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<(String, SearchType)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn downloaded(&self) -> Vec<TrackCandidate> {
        self.downloaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutomationDriver for FakeDriver {
    async fn ensure_session_ready(
        &self,
        _credentials: Option<&SessionCredentials>,
    ) -> Result<SessionHandle> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SessionHandle {
            session_id: "session-1".to_string(),
            page: PageHandle::new("page-1"),
        })
    }

    fn current_page(&self) -> Result<PageHandle> {
        Ok(PageHandle::new("page-1"))
    }

    async fn search(
        &self,
        _page: &PageHandle,
        query: &str,
        search_type: SearchType,
        options: SearchOptions,
    ) -> Result<Vec<TrackCandidate>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), search_type));

        let delay = *self.search_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_searches.load(Ordering::SeqCst) {
            bail!("automation search for '{}' failed", query);
        }

        let key = (query.to_lowercase(), search_type);
        let scripted = self.by_query.lock().unwrap().get(&key).cloned();
        let results = scripted
            .or_else(|| self.by_type.lock().unwrap().get(&search_type).cloned())
            .unwrap_or_default();
        Ok(results.into_iter().take(options.limit).collect())
    }

    async fn download_from_candidate(
        &self,
        _page: &PageHandle,
        candidate: &TrackCandidate,
        destination_dir: &Path,
        setting: DownloadSetting,
        on_progress: StageProgressFn,
    ) -> Result<String> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let Some(element) = &candidate.element else {
            bail!("candidate '{}' has no element handle", candidate.title);
        };

        let stage = |phase, progress| StageProgress {
            phase,
            progress,
            setting: Some(setting),
        };
        on_progress(stage(AutomationPhase::Preparing, 0));

        let delay = *self.download_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_downloads.load(Ordering::SeqCst) {
            bail!("download button for '{}' not found", candidate.title);
        }

        on_progress(stage(AutomationPhase::Downloading, 50));
        on_progress(stage(AutomationPhase::Downloading, 100));
        on_progress(stage(AutomationPhase::Saving, 100));

        let reported = self.reported_filename.lock().unwrap().clone();
        if let Some(filename) = reported {
            on_progress(stage(AutomationPhase::Done, 100));
            self.downloaded.lock().unwrap().push(candidate.clone());
            return Ok(filename);
        }

        let filename = format!("{}.m4a", element.id());
        std::fs::write(destination_dir.join(&filename), b"fake audio bytes")?;
        on_progress(stage(AutomationPhase::Done, 100));

        self.downloaded.lock().unwrap().push(candidate.clone());
        Ok(filename)
    }
}

/// Fast lookup returning a fixed result or a fixed failure, unless a
/// result was scripted for the exact (lowercased) query.
pub struct FakeFastLookup {
    results: Mutex<std::result::Result<Vec<TrackCandidate>, String>>,
    by_query: Mutex<HashMap<String, Vec<TrackCandidate>>>,
    calls: AtomicUsize,
}

impl FakeFastLookup {
    pub fn returning(results: Vec<TrackCandidate>) -> Self {
        Self {
            results: Mutex::new(Ok(results)),
            by_query: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            results: Mutex::new(Err(message.to_string())),
            by_query: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn script_query(&self, query: &str, results: Vec<TrackCandidate>) {
        self.by_query
            .lock()
            .unwrap()
            .insert(query.to_lowercase(), results);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FastLookup for FakeFastLookup {
    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<TrackCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.by_query.lock().unwrap().get(&query.to_lowercase()).cloned();
        let results = match scripted {
            Some(results) => Ok(results),
            None => self.results.lock().unwrap().clone(),
        };
        match results {
            Ok(results) => Ok(results
                .into_iter()
                .take(limit)
                .map(|mut c| {
                    c.element = None;
                    c
                })
                .collect()),
            Err(message) => bail!("{}", message),
        }
    }
}
