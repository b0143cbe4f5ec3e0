//! Collaborator traits for the remote catalog.
//!
//! [`AutomationDriver`] manipulates the single live page; [`FastLookup`] is
//! the lower-latency, non-automation search path.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::download::DownloadSetting;
use crate::search::{SearchType, TrackCandidate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub username: String,
    pub password: String,
}

/// The one navigable page of the automation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageHandle(String);

impl PageHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: String,
    pub page: PageHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Upper bound on the number of candidates returned.
    pub limit: usize,
    /// Hint for a smaller, quicker result batch used during resolution.
    pub fast_resolve: bool,
}

impl SearchOptions {
    pub fn listing(limit: usize) -> Self {
        Self {
            limit,
            fast_resolve: false,
        }
    }

    pub fn resolve(limit: usize) -> Self {
        Self {
            limit,
            fast_resolve: true,
        }
    }
}

/// Phase reported by the driver's download stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationPhase {
    Preparing,
    Downloading,
    Saving,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageProgress {
    pub phase: AutomationPhase,
    pub progress: u8,
    pub setting: Option<DownloadSetting>,
}

pub type StageProgressFn = Arc<dyn Fn(StageProgress) + Send + Sync>;

#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Establishes or reuses a logged-in session. Idempotent.
    async fn ensure_session_ready(
        &self,
        credentials: Option<&SessionCredentials>,
    ) -> Result<SessionHandle>;

    /// Page of the current session. Only meaningful inside a gate task.
    fn current_page(&self) -> Result<PageHandle>;

    async fn search(
        &self,
        page: &PageHandle,
        query: &str,
        search_type: SearchType,
        options: SearchOptions,
    ) -> Result<Vec<TrackCandidate>>;

    /// Triggers the download of `candidate` and returns the saved file name
    /// relative to `destination_dir`.
    async fn download_from_candidate(
        &self,
        page: &PageHandle,
        candidate: &TrackCandidate,
        destination_dir: &Path,
        setting: DownloadSetting,
        on_progress: StageProgressFn,
    ) -> Result<String>;
}

#[async_trait]
pub trait FastLookup: Send + Sync {
    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<TrackCandidate>>;
}
