//! HTTP client for the automation sidecar that drives the remote page.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

use super::driver::{
    AutomationDriver, AutomationPhase, PageHandle, SearchOptions, SessionCredentials,
    SessionHandle, StageProgress, StageProgressFn,
};
use super::wire::{
    parse_stage_line, CandidateListResponse, DownloadRequestBody, SearchRequest, SessionRequest,
    SessionResponse, StageEvent,
};
use crate::download::DownloadSetting;
use crate::search::{SearchType, TrackCandidate};

pub struct HttpAutomationDriver {
    client: reqwest::Client,
    base_url: String,
    session: Mutex<Option<SessionHandle>>,
}

impl HttpAutomationDriver {
    /// Create a new sidecar driver.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the sidecar (e.g., "http://localhost:4100")
    /// * `connect_timeout` - Connection timeout; request lifetimes are bounded by the callers' races
    pub fn new(base_url: String, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        // Ensure base_url doesn't have trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            session: Mutex::new(None),
        })
    }

    fn page_url(&self, page: &PageHandle, action: &str) -> String {
        format!("{}/pages/{}/{}", self.base_url, page.id(), action)
    }
}

#[async_trait]
impl AutomationDriver for HttpAutomationDriver {
    async fn ensure_session_ready(
        &self,
        credentials: Option<&SessionCredentials>,
    ) -> Result<SessionHandle> {
        let url = format!("{}/session", self.base_url);
        let body = SessionRequest {
            username: credentials.map(|c| c.username.as_str()),
            password: credentials.map(|c| c.password.as_str()),
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to connect to automation sidecar")?;

        if !response.status().is_success() {
            bail!("Session setup failed with status: {}", response.status());
        }

        let session: SessionResponse = response
            .json()
            .await
            .context("Failed to parse session response")?;
        let handle = SessionHandle {
            session_id: session.session_id,
            page: PageHandle::new(session.page_id),
        };

        let mut current = self.session.lock().unwrap();
        if current.as_ref() != Some(&handle) {
            info!(
                "Automation session {} ready on page {}",
                handle.session_id,
                handle.page.id()
            );
        }
        *current = Some(handle.clone());
        Ok(handle)
    }

    fn current_page(&self) -> Result<PageHandle> {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.page.clone())
            .ok_or_else(|| anyhow!("No automation session; call ensure_session_ready first"))
    }

    async fn search(
        &self,
        page: &PageHandle,
        query: &str,
        search_type: SearchType,
        options: SearchOptions,
    ) -> Result<Vec<TrackCandidate>> {
        let url = self.page_url(page, "search");
        let body = SearchRequest {
            query,
            search_type: search_type.as_str(),
            limit: options.limit,
            fast_resolve: options.fast_resolve,
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send search to automation sidecar")?;

        if !response.status().is_success() {
            bail!(
                "Automation search for '{}' failed: status {}",
                query,
                response.status()
            );
        }

        let results: CandidateListResponse = response
            .json()
            .await
            .context("Failed to parse search response")?;
        let mut candidates = results.into_candidates();
        candidates.truncate(options.limit);
        debug!(
            "Automation search '{}' ({}) returned {} candidates",
            query,
            search_type,
            candidates.len()
        );
        Ok(candidates)
    }

    async fn download_from_candidate(
        &self,
        page: &PageHandle,
        candidate: &TrackCandidate,
        destination_dir: &Path,
        setting: DownloadSetting,
        on_progress: StageProgressFn,
    ) -> Result<String> {
        let element = candidate
            .element
            .as_ref()
            .ok_or_else(|| anyhow!("Candidate '{}' has no live element handle", candidate.title))?;
        let destination = destination_dir
            .to_str()
            .ok_or_else(|| anyhow!("Destination dir is not valid UTF-8: {:?}", destination_dir))?;

        let url = self.page_url(page, "download");
        let body = DownloadRequestBody {
            element_id: element.id(),
            destination_dir: destination,
            quality: setting,
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to start download on automation sidecar")?;

        if !response.status().is_success() {
            bail!(
                "Download of '{}' failed to start: status {}",
                candidate.title,
                response.status()
            );
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Download progress stream interrupted")?;
            for line in split_stage_lines(&mut buffer, &chunk)? {
                if let Some(filename) = handle_stage_line(&line, setting, &on_progress)? {
                    return Ok(filename);
                }
            }
        }
        if let Some(filename) = handle_stage_line(&buffer, setting, &on_progress)? {
            return Ok(filename);
        }

        bail!(
            "Download stream for '{}' ended before completion",
            candidate.title
        )
    }
}

const MAX_STAGE_LINE_BYTES: usize = 64 * 1024;

/// Appends `chunk` and splits off the complete lines. Fails once the
/// unterminated remainder grows past [`MAX_STAGE_LINE_BYTES`].
fn split_stage_lines(buffer: &mut Vec<u8>, chunk: &[u8]) -> Result<Vec<Vec<u8>>> {
    buffer.extend_from_slice(chunk);
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        lines.push(buffer.drain(..=pos).collect());
    }
    if buffer.len() > MAX_STAGE_LINE_BYTES {
        bail!(
            "Download progress line exceeds {} bytes without a newline",
            MAX_STAGE_LINE_BYTES
        );
    }
    Ok(lines)
}

/// Forwards one stage event. Returns the saved filename once `done` arrives.
fn handle_stage_line(
    line: &[u8],
    setting: DownloadSetting,
    on_progress: &StageProgressFn,
) -> Result<Option<String>> {
    let Some(StageEvent {
        phase,
        progress,
        setting: reported,
        filename,
        error,
    }) = parse_stage_line(line).context("Malformed download progress event")?
    else {
        return Ok(None);
    };

    if let Some(error) = error {
        bail!("{}", error);
    }
    let Some(phase) = phase else {
        return Ok(None);
    };

    on_progress(StageProgress {
        phase,
        progress: progress.unwrap_or(0).min(100),
        setting: reported.or(Some(setting)),
    });

    if phase == AutomationPhase::Done {
        let filename = filename.ok_or_else(|| anyhow!("Download finished without a filename"))?;
        return Ok(Some(filename));
    }
    Ok(None)
}
