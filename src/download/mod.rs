//! Download jobs: models, the job store, the pipeline orchestrator and the
//! manager that ties them together.

mod file_registry;
mod job_store;
mod manager;
mod models;
mod pipeline;

pub use file_registry::SavedFileRegistry;
pub use job_store::JobStore;
pub use manager::DownloadManager;
pub use models::{DownloadJob, DownloadRequest, DownloadSetting, JobPatch, JobStatus, JobView};
pub use pipeline::{
    map_stage_progress, PipelineOrchestrator, PipelineOutcome, PipelineProgress,
    PipelineProgressFn,
};
