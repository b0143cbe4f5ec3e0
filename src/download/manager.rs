//! Download manager: job creation, retry, cancel and polling.
//!
//! Jobs are visible in the store before their pipeline acquires the gate.
//! Pipelines are spawned on a task tracker and never awaited by the
//! creator; the store is the only place their outcome shows up.

use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::info;

use super::job_store::JobStore;
use super::models::{DownloadRequest, JobView};
use super::pipeline::PipelineOrchestrator;
use crate::error::FetchError;
use crate::metrics;
use crate::search::{SearchContext, SongRef};

pub struct DownloadManager {
    store: Arc<JobStore>,
    pipeline: Arc<PipelineOrchestrator>,
    context: Arc<SearchContext>,
    tracker: TaskTracker,
}

impl DownloadManager {
    pub fn new(
        store: Arc<JobStore>,
        pipeline: Arc<PipelineOrchestrator>,
        context: Arc<SearchContext>,
    ) -> Self {
        Self {
            store,
            pipeline,
            context,
            tracker: TaskTracker::new(),
        }
    }

    fn spawn_job(&self, job_id: String, attempt: u32, request: DownloadRequest) {
        let pipeline = self.pipeline.clone();
        // Outcome is observed by polling the job store
        drop(self.tracker.spawn(async move {
            pipeline.execute_download_job(job_id, attempt, request).await;
        }));
    }

    /// Creates a queued job and starts its pipeline in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enqueue_download(&self, mut request: DownloadRequest) -> Result<JobView, FetchError> {
        let found = self
            .context
            .get_song_from_request(request.index, request.song.as_ref());

        if let Some(candidate) = &found {
            if !candidate.downloadable {
                return Err(FetchError::NotDownloadable(format!(
                    "'{}' is not downloadable",
                    candidate.title
                )));
            }
        }
        if let Some(song) = &request.song {
            if song.downloadable == Some(false) {
                return Err(FetchError::NotDownloadable(format!(
                    "'{}' is not downloadable",
                    song.title()
                )));
            }
        }

        let song_resolvable = request.song.as_ref().is_some_and(|s| s.is_resolvable());
        if found.is_none() && !song_resolvable {
            return Err(FetchError::NotFound(match request.index {
                Some(index) => format!("No song at index {} in the current results", index),
                None => "Request carries neither an index nor a song".to_string(),
            }));
        }

        let seed = found
            .as_ref()
            .map(SongRef::from)
            .or_else(|| request.song.clone())
            .unwrap_or_default();
        // Pin the located song so a later search cannot shift the index
        if found.is_some() {
            request.song = Some(seed.clone());
        }
        let job = self.store.create(request.clone(), &seed);
        info!("Created download job {} for '{}'", job.id, job.title);
        metrics::record_download_job("created");

        self.spawn_job(job.id.clone(), job.attempt, request);
        Ok(JobView::from_job(&job))
    }

    /// Resets a finished job and runs it again with an equivalent request.
    pub fn retry_job(&self, job_id: &str) -> Result<JobView, FetchError> {
        let job = self.store.reset_for_retry(job_id)?;
        info!("Retrying job {} (attempt {})", job.id, job.attempt);
        metrics::record_download_job("retried");

        self.spawn_job(job.id.clone(), job.attempt, job.request.clone());
        Ok(JobView::from_job(&job))
    }

    /// Removes the job record. Automation work already running is not
    /// interrupted.
    pub fn cancel_job(&self, job_id: &str) -> Result<JobView, FetchError> {
        let job = self
            .store
            .remove(job_id)
            .ok_or_else(|| FetchError::NotFound(format!("Job {} not found", job_id)))?;
        info!("Cancelled job {} while {}", job.id, job.status.as_str());
        metrics::record_download_job("cancelled");
        Ok(JobView::from_job(&job))
    }

    pub fn get_job(&self, job_id: &str) -> Result<JobView, FetchError> {
        self.store
            .get(job_id)
            .map(|job| JobView::from_job(&job))
            .ok_or_else(|| FetchError::NotFound(format!("Job {} not found", job_id)))
    }

    pub fn list_jobs(&self, limit: Option<usize>) -> Vec<JobView> {
        self.store
            .list(limit)
            .iter()
            .map(JobView::from_job)
            .collect()
    }

    /// Stops accepting new pipelines and waits for running ones.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
