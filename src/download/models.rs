//! Data models for download jobs.
//!
//! Defines job statuses, quality settings, requests, the job record itself,
//! its public view and the patch applied on progress updates.

use serde::{Deserialize, Serialize};

use crate::search::{CompletedSong, SongRef};

/// Status of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Preparing,
    Downloading,
    Saving,
    Done,   // terminal
    Failed, // terminal
}

impl JobStatus {
    /// Returns true if this is a terminal state (Done or Failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Statuses during which a retry is refused.
    pub fn blocks_retry(&self) -> bool {
        matches!(
            self,
            JobStatus::Queued | JobStatus::Preparing | JobStatus::Downloading
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Preparing => "preparing",
            JobStatus::Downloading => "downloading",
            JobStatus::Saving => "saving",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

/// Audio quality requested from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownloadSetting {
    #[serde(rename = "Hi-Res")]
    HiRes,
    #[default]
    #[serde(rename = "CD Lossless")]
    CdLossless,
    #[serde(rename = "320kbps AAC")]
    Aac320,
    #[serde(rename = "96kbps AAC")]
    Aac96,
}

impl DownloadSetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadSetting::HiRes => "Hi-Res",
            DownloadSetting::CdLossless => "CD Lossless",
            DownloadSetting::Aac320 => "320kbps AAC",
            DownloadSetting::Aac96 => "96kbps AAC",
        }
    }

    /// Lenient parse used by the CLI: case and punctuation are ignored and a
    /// few short aliases are accepted.
    pub fn from_str(s: &str) -> Option<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "hires" | "hr" => Some(DownloadSetting::HiRes),
            "cdlossless" | "cd" | "lossless" => Some(DownloadSetting::CdLossless),
            "320kbpsaac" | "320" | "aac320" => Some(DownloadSetting::Aac320),
            "96kbpsaac" | "96" | "aac96" => Some(DownloadSetting::Aac96),
            _ => None,
        }
    }
}

impl std::fmt::Display for DownloadSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller asks to download: a position in the last result set, a
/// remembered song, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadRequest {
    pub index: Option<usize>,
    pub song: Option<SongRef>,
    pub download_setting: DownloadSetting,
}

impl DownloadRequest {
    pub fn for_index(index: usize, download_setting: DownloadSetting) -> Self {
        Self {
            index: Some(index),
            song: None,
            download_setting,
        }
    }

    pub fn for_song(song: SongRef, download_setting: DownloadSetting) -> Self {
        Self {
            index: None,
            song: Some(song),
            download_setting,
        }
    }

    /// True if there is something to locate the song with.
    pub fn has_usable_payload(&self) -> bool {
        self.index.is_some() || self.song.as_ref().is_some_and(|s| s.is_resolvable())
    }
}

/// One tracked download attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadJob {
    pub id: String,
    /// Incremented on every retry; progress from older attempts is ignored.
    pub attempt: u32,
    pub request_index: Option<usize>,
    pub status: JobStatus,
    pub phase: String,
    pub progress: u8,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Option<String>,
    pub duration: u32,
    pub download_setting: DownloadSetting,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub error: Option<String>,
    pub song: Option<CompletedSong>,
    pub request: DownloadRequest,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DownloadJob {
    /// Song reference rebuilt from the display snapshot.
    pub fn snapshot_song(&self) -> SongRef {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        SongRef {
            title: non_empty(&self.title),
            artist: non_empty(&self.artist),
            album: non_empty(&self.album),
            artwork: self.artwork.clone(),
            duration: (self.duration > 0).then_some(self.duration),
            ..Default::default()
        }
    }

    /// Equivalent request for a retry: the stored one, with the snapshot
    /// filling in for a missing song.
    pub fn retry_request(&self) -> DownloadRequest {
        let song = self
            .request
            .song
            .clone()
            .filter(|s| s.is_resolvable())
            .or_else(|| Some(self.snapshot_song()).filter(|s| s.is_resolvable()));
        DownloadRequest {
            index: self.request_index.or(self.request.index),
            song,
            download_setting: self.download_setting,
        }
    }
}

/// A download job as exposed to API consumers (no raw request).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub id: String,
    pub request_index: Option<usize>,
    pub status: JobStatus,
    pub phase: String,
    pub progress: u8,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Option<String>,
    pub duration: u32,
    pub download_setting: DownloadSetting,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub error: Option<String>,
    pub song: Option<CompletedSong>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl JobView {
    pub fn from_job(job: &DownloadJob) -> Self {
        Self {
            id: job.id.clone(),
            request_index: job.request_index,
            status: job.status,
            phase: job.phase.clone(),
            progress: job.progress,
            title: job.title.clone(),
            artist: job.artist.clone(),
            album: job.album.clone(),
            artwork: job.artwork.clone(),
            duration: job.duration,
            download_setting: job.download_setting,
            downloaded_bytes: job.downloaded_bytes,
            total_bytes: job.total_bytes,
            error: job.error.clone(),
            song: job.song.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Partial update merged into a job by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub phase: Option<String>,
    pub progress: Option<u8>,
    pub error: Option<String>,
    pub song: Option<CompletedSong>,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn progress(status: JobStatus, phase: impl Into<String>, progress: u8) -> Self {
        Self {
            status: Some(status),
            phase: Some(phase.into()),
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_song(mut self, song: CompletedSong) -> Self {
        self.song = Some(song);
        self
    }

    pub fn with_sizes(mut self, downloaded: Option<u64>, total: Option<u64>) -> Self {
        self.downloaded_bytes = downloaded;
        self.total_bytes = total;
        self
    }
}
