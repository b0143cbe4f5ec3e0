//! Drives one download through the automation gate.
//!
//! Session init, resolution, the driver's download stage and the file
//! registration all run inside a single exclusive gate task. Each inner
//! stage has its own timeout and the whole sequence, including the wait for
//! the gate, is bounded by the pipeline timeout. A timeout only stops the
//! waiting caller; the gate task itself runs to completion.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{info, warn};

use super::file_registry::SavedFileRegistry;
use super::job_store::JobStore;
use super::models::{DownloadRequest, JobPatch, JobStatus};
use crate::automation::{
    race, AutomationPhase, GateHandle, SessionCredentials, StageProgress, StageProgressFn,
};
use crate::config::TimeoutSettings;
use crate::error::FetchError;
use crate::metrics;
use crate::search::{CompletedSong, ResolveProgress, SongResolver};

/// Job-level progress emitted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineProgress {
    pub status: JobStatus,
    pub phase: &'static str,
    pub progress: u8,
}

pub type PipelineProgressFn = Arc<dyn Fn(PipelineProgress) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub song: CompletedSong,
    pub path: PathBuf,
}

/// Path of a file the driver reports as saved. Only a plain file name
/// inside `download_dir` is accepted.
pub fn saved_file_path(download_dir: &Path, filename: &str) -> Result<PathBuf, FetchError> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Ok(download_dir.join(name)),
        _ => Err(FetchError::Io(anyhow!(
            "Saved file name '{}' is outside the download directory",
            filename
        ))),
    }
}

const SESSION_READY_PROGRESS: u8 = 4;
const RESOLVING_BASE_PROGRESS: u8 = 5;

/// Maps a driver stage onto job status, phase label and overall progress.
///
/// Everything after `preparing` stays `downloading` until the pipeline
/// reports the job done.
pub fn map_stage_progress(stage: &StageProgress) -> PipelineProgress {
    let p = u32::from(stage.progress.min(100));
    let (status, phase, progress) = match stage.phase {
        AutomationPhase::Preparing => (JobStatus::Preparing, "preparing", 10 + p / 10),
        AutomationPhase::Downloading => (JobStatus::Downloading, "downloading", 20 + p * 70 / 100),
        AutomationPhase::Saving => (JobStatus::Downloading, "saving", 90 + p * 9 / 100),
        AutomationPhase::Done => (JobStatus::Downloading, "done", 99),
    };
    PipelineProgress {
        status,
        phase,
        progress: progress as u8,
    }
}

pub struct PipelineOrchestrator {
    gate: GateHandle,
    resolver: Arc<SongResolver>,
    store: Arc<JobStore>,
    files: Arc<SavedFileRegistry>,
    download_dir: PathBuf,
    credentials: Option<SessionCredentials>,
    timeouts: TimeoutSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        gate: GateHandle,
        resolver: Arc<SongResolver>,
        store: Arc<JobStore>,
        files: Arc<SavedFileRegistry>,
        download_dir: PathBuf,
        credentials: Option<SessionCredentials>,
        timeouts: TimeoutSettings,
    ) -> Self {
        Self {
            gate,
            resolver,
            store,
            files,
            download_dir,
            credentials,
            timeouts,
        }
    }

    pub async fn run_download_pipeline_from_request(
        &self,
        request: DownloadRequest,
        on_progress: PipelineProgressFn,
    ) -> Result<PipelineOutcome, FetchError> {
        let resolver = self.resolver.clone();
        let files = self.files.clone();
        let download_dir = self.download_dir.clone();
        let credentials = self.credentials.clone();
        let timeouts = self.timeouts.clone();

        let task = self.gate.run_exclusive("download", move |driver| async move {
            race("session init", timeouts.session_init, async {
                driver
                    .ensure_session_ready(credentials.as_ref())
                    .await
                    .map_err(FetchError::from)
            })
            .await?;
            on_progress(PipelineProgress {
                status: JobStatus::Preparing,
                phase: "preparing",
                progress: SESSION_READY_PROGRESS,
            });
            let page = driver.current_page()?;

            let resolving = {
                let on_progress = on_progress.clone();
                move |p: ResolveProgress| {
                    on_progress(PipelineProgress {
                        status: JobStatus::Preparing,
                        phase: "resolving",
                        progress: RESOLVING_BASE_PROGRESS + p.attempt.min(4) as u8,
                    })
                }
            };
            let candidate = race(
                "resolve",
                timeouts.resolve_step,
                resolver.resolve_downloadable_song(
                    driver.as_ref(),
                    &page,
                    request.index,
                    request.song.as_ref(),
                    &resolving,
                ),
            )
            .await?;
            if !candidate.downloadable {
                return Err(FetchError::NotDownloadable(format!(
                    "'{}' is not downloadable",
                    candidate.title
                )));
            }

            let stage_progress: StageProgressFn = {
                let on_progress = on_progress.clone();
                Arc::new(move |stage: StageProgress| on_progress(map_stage_progress(&stage)))
            };
            let filename = driver
                .download_from_candidate(
                    &page,
                    &candidate,
                    &download_dir,
                    request.download_setting,
                    stage_progress,
                )
                .await
                .map_err(FetchError::Io)?;

            let path = saved_file_path(&download_dir, &filename)?;
            let id = files.register(path.clone());
            Ok(PipelineOutcome {
                song: CompletedSong {
                    track: candidate.to_public(),
                    id,
                    filename,
                },
                path,
            })
        });

        race("download pipeline", self.timeouts.pipeline, task).await
    }

    /// Runs the pipeline for a stored job and records every step in the
    /// job store. Failures end up on the job, never with the caller.
    pub async fn execute_download_job(&self, job_id: String, attempt: u32, request: DownloadRequest) {
        let store = self.store.clone();
        let progress_job_id = job_id.clone();
        let on_progress: PipelineProgressFn = Arc::new(move |p: PipelineProgress| {
            store.patch_attempt(
                &progress_job_id,
                attempt,
                JobPatch::progress(p.status, p.phase, p.progress),
            );
        });

        match self.run_download_pipeline_from_request(request, on_progress).await {
            Ok(outcome) => {
                let size = tokio::fs::metadata(&outcome.path)
                    .await
                    .ok()
                    .map(|m| m.len());
                info!(
                    "Job {} saved {} ({} bytes)",
                    job_id,
                    outcome.song.filename,
                    size.unwrap_or(0)
                );
                self.store.patch_attempt(
                    &job_id,
                    attempt,
                    JobPatch::status(JobStatus::Done)
                        .with_song(outcome.song)
                        .with_sizes(size, size),
                );
                metrics::record_download_job("done");
            }
            Err(e) => {
                warn!("Job {} failed: {}", job_id, e);
                self.store
                    .patch_attempt(&job_id, attempt, JobPatch::failed(e.to_string()));
                metrics::record_download_job("failed");
            }
        }
    }
}
