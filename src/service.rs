//! Entry point for the route layer and the CLI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::automation::{
    AutomationDriver, AutomationGate, FastLookup, GateHandle, HttpAutomationDriver, HttpFastLookup,
};
use crate::config::AppConfig;
use crate::download::{
    DownloadManager, DownloadRequest, JobStore, JobView, PipelineOrchestrator, SavedFileRegistry,
};
use crate::error::FetchError;
use crate::search::{PublicTrack, SearchContext, SearchDispatcher, SearchType, SongResolver};

const SIDECAR_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct FetchService {
    dispatcher: SearchDispatcher,
    context: Arc<SearchContext>,
    downloads: DownloadManager,
    files: Arc<SavedFileRegistry>,
    shutdown_token: CancellationToken,
}

impl FetchService {
    /// Builds the service over HTTP collaborators. Must be called from
    /// within a Tokio runtime.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let driver = HttpAutomationDriver::new(config.automation_url.clone(), SIDECAR_CONNECT_TIMEOUT)?;
        let fast_lookup = match &config.fast_lookup_url {
            Some(url) => Some(Arc::new(HttpFastLookup::new(url.clone(), config.timeouts.fast_lookup)?)
                as Arc<dyn FastLookup>),
            None => None,
        };
        Ok(Self::with_collaborators(config, Arc::new(driver), fast_lookup))
    }

    /// Builds the service over the given collaborators and starts the
    /// automation gate. Must be called from within a Tokio runtime.
    pub fn with_collaborators(
        config: &AppConfig,
        driver: Arc<dyn AutomationDriver>,
        fast_lookup: Option<Arc<dyn FastLookup>>,
    ) -> Self {
        let shutdown_token = CancellationToken::new();
        let gate = AutomationGate::spawn(driver, shutdown_token.child_token());
        Self::assemble(config, gate, fast_lookup, shutdown_token)
    }

    fn assemble(
        config: &AppConfig,
        gate: GateHandle,
        fast_lookup: Option<Arc<dyn FastLookup>>,
        shutdown_token: CancellationToken,
    ) -> Self {
        let context = Arc::new(SearchContext::new());
        let dispatcher = SearchDispatcher::new(
            gate.clone(),
            fast_lookup,
            config.credentials.clone(),
            config.search.clone(),
            config.timeouts.clone(),
        );
        let resolver = Arc::new(SongResolver::new(
            context.clone(),
            config.resolver.clone(),
            config.timeouts.resolve_query,
        ));
        let store = Arc::new(JobStore::new(config.jobs.max_jobs, config.jobs.list_limit));
        let files = Arc::new(SavedFileRegistry::new(config.saved_files_capacity));
        let pipeline = Arc::new(PipelineOrchestrator::new(
            gate,
            resolver,
            store.clone(),
            files.clone(),
            config.download_dir.clone(),
            config.credentials.clone(),
            config.timeouts.clone(),
        ));
        let downloads = DownloadManager::new(store, pipeline, context.clone());

        info!(
            "Fetch service ready (downloads into {:?}, fast lookup {})",
            config.download_dir,
            if dispatcher.has_fast_lookup() { "on" } else { "off" }
        );

        Self {
            dispatcher,
            context,
            downloads,
            files,
            shutdown_token,
        }
    }

    /// Searches and makes the results the active result set.
    pub async fn search(
        &self,
        query: &str,
        search_type: SearchType,
    ) -> Result<Vec<PublicTrack>, FetchError> {
        let results = self.dispatcher.search_by_type(query, search_type).await?;
        let public = results.iter().map(PublicTrack::from).collect();
        self.context.set_last_search_songs(results);
        Ok(public)
    }

    pub fn last_results(&self) -> Vec<PublicTrack> {
        self.context
            .last_search_songs()
            .iter()
            .map(PublicTrack::from)
            .collect()
    }

    pub fn enqueue_download(&self, request: DownloadRequest) -> Result<JobView, FetchError> {
        self.downloads.enqueue_download(request)
    }

    pub fn get_job(&self, job_id: &str) -> Result<JobView, FetchError> {
        self.downloads.get_job(job_id)
    }

    pub fn list_jobs(&self, limit: Option<usize>) -> Vec<JobView> {
        self.downloads.list_jobs(limit)
    }

    pub fn cancel_job(&self, job_id: &str) -> Result<JobView, FetchError> {
        self.downloads.cancel_job(job_id)
    }

    pub fn retry_job(&self, job_id: &str) -> Result<JobView, FetchError> {
        self.downloads.retry_job(job_id)
    }

    /// Path of a completed download by its synthetic song id.
    pub fn saved_file(&self, song_id: &str) -> Option<PathBuf> {
        self.files.get(song_id)
    }

    /// Waits for running pipelines, then stops the automation gate.
    pub async fn shutdown(&self) {
        self.downloads.shutdown().await;
        self.shutdown_token.cancel();
        info!("Fetch service stopped");
    }
}
