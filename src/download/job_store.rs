//! In-memory, insertion-ordered store of download jobs.
//!
//! All mutations of a job go through [`JobStore::patch_attempt`], which
//! enforces the progress rules: `done` pins progress to 100, an explicit
//! progress on a `queued` job is taken as given, and otherwise progress
//! never moves backwards. Only a retry resets it.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tracing::debug;

use super::models::{DownloadJob, DownloadRequest, JobPatch, JobStatus};
use crate::error::FetchError;
use crate::metrics;
use crate::search::SongRef;

struct JobStoreInner {
    jobs: HashMap<String, DownloadJob>,
    /// Job ids, oldest first.
    order: VecDeque<String>,
}

pub struct JobStore {
    inner: Mutex<JobStoreInner>,
    max_jobs: usize,
    list_limit: usize,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn generate_job_id() -> String {
    format!("job_{}_{:08x}", now_millis(), rand::random::<u32>())
}

impl JobStore {
    pub fn new(max_jobs: usize, list_limit: usize) -> Self {
        Self {
            inner: Mutex::new(JobStoreInner {
                jobs: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_jobs: max_jobs.max(1),
            list_limit: list_limit.max(1),
        }
    }

    /// Creates a `queued` job with display fields seeded from `seed`.
    pub fn create(&self, request: DownloadRequest, seed: &SongRef) -> DownloadJob {
        let now = now_millis();
        let job = DownloadJob {
            id: generate_job_id(),
            attempt: 0,
            request_index: request.index,
            status: JobStatus::Queued,
            phase: JobStatus::Queued.as_str().to_string(),
            progress: 0,
            title: seed.title().to_string(),
            artist: seed.artist().to_string(),
            album: seed.album().to_string(),
            artwork: seed.artwork.clone(),
            duration: seed.duration(),
            download_setting: request.download_setting,
            downloaded_bytes: None,
            total_bytes: None,
            error: None,
            song: None,
            request,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.lock().unwrap();
        inner.order.push_back(job.id.clone());
        inner.jobs.insert(job.id.clone(), job.clone());
        self.enforce_retention(&mut inner);
        metrics::set_current_jobs(inner.jobs.len());
        job
    }

    pub fn get(&self, id: &str) -> Option<DownloadJob> {
        self.inner.lock().unwrap().jobs.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent jobs first, never more than the configured list limit.
    pub fn list(&self, limit: Option<usize>) -> Vec<DownloadJob> {
        let limit = limit.unwrap_or(self.list_limit).min(self.list_limit);
        let inner = self.inner.lock().unwrap();
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.jobs.get(id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Merges `patch` into the job regardless of attempt.
    pub fn patch(&self, id: &str, patch: JobPatch) -> Option<DownloadJob> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner.jobs.get_mut(id)?;
        apply_patch(job, patch);
        Some(job.clone())
    }

    /// Merges `patch` only if the job still belongs to `attempt`.
    pub fn patch_attempt(&self, id: &str, attempt: u32, patch: JobPatch) -> Option<DownloadJob> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner.jobs.get_mut(id)?;
        if job.attempt != attempt {
            debug!(
                "Ignoring update for job {} from stale attempt {} (current {})",
                id, attempt, job.attempt
            );
            return None;
        }
        // A finished attempt stays finished until retry bumps the attempt
        if job.status.is_terminal() && !patch.status.is_some_and(|s| s.is_terminal()) {
            debug!(
                "Ignoring update for job {} after it reached {}",
                id,
                job.status.as_str()
            );
            return None;
        }
        apply_patch(job, patch);
        Some(job.clone())
    }

    /// Removes a job unconditionally, returning its last snapshot.
    pub fn remove(&self, id: &str) -> Option<DownloadJob> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner.jobs.remove(id)?;
        inner.order.retain(|existing| existing != id);
        metrics::set_current_jobs(inner.jobs.len());
        Some(job)
    }

    /// Resets a finished job to `queued` with progress 0 for another attempt.
    pub fn reset_for_retry(&self, id: &str) -> Result<DownloadJob, FetchError> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| FetchError::NotFound(format!("Job {} not found", id)))?;

        if job.status.blocks_retry() {
            return Err(FetchError::Conflict(format!(
                "Job {} is still {}",
                id,
                job.status.as_str()
            )));
        }
        let request = job.retry_request();
        if !request.has_usable_payload() {
            return Err(FetchError::Conflict(format!(
                "Job {} has no request to retry",
                id
            )));
        }

        job.attempt += 1;
        job.request = request;
        job.status = JobStatus::Queued;
        job.phase = JobStatus::Queued.as_str().to_string();
        job.progress = 0;
        job.error = None;
        job.song = None;
        job.downloaded_bytes = None;
        job.total_bytes = None;
        job.updated_at = now_millis();
        Ok(job.clone())
    }

    /// Terminal jobs go first, oldest first. If that is not enough the
    /// oldest jobs of any status go.
    fn enforce_retention(&self, inner: &mut JobStoreInner) {
        while inner.jobs.len() > self.max_jobs {
            let oldest_terminal = inner.order.iter().position(|id| {
                inner
                    .jobs
                    .get(id)
                    .is_some_and(|job| job.status.is_terminal())
            });
            let evicted = match oldest_terminal {
                Some(pos) => inner.order.remove(pos),
                None => inner.order.pop_front(),
            };
            let Some(evicted) = evicted else {
                break;
            };
            inner.jobs.remove(&evicted);
            debug!("Evicted job {} from job store", evicted);
        }
    }
}

fn apply_patch(job: &mut DownloadJob, patch: JobPatch) {
    if let Some(status) = patch.status {
        job.status = status;
    }
    match patch.phase {
        Some(phase) => job.phase = phase,
        None => {
            if let Some(status) = patch.status {
                job.phase = status.as_str().to_string();
            }
        }
    }

    if job.status == JobStatus::Done {
        job.progress = 100;
    } else if let Some(progress) = patch.progress {
        let progress = progress.min(100);
        job.progress = if job.status == JobStatus::Queued {
            progress
        } else {
            job.progress.max(progress)
        };
    }

    if let Some(error) = patch.error {
        job.error = Some(error);
    }
    if let Some(song) = patch.song {
        job.song = Some(song);
    }
    if patch.downloaded_bytes.is_some() {
        job.downloaded_bytes = patch.downloaded_bytes;
    }
    if patch.total_bytes.is_some() {
        job.total_bytes = patch.total_bytes;
    }
    job.updated_at = now_millis();
}
