//! JSON shapes exchanged with the automation sidecar and the fast lookup
//! service.

use serde::{Deserialize, Serialize};

use super::driver::AutomationPhase;
use crate::download::DownloadSetting;
use crate::search::{CandidateKind, ElementHandle, TrackCandidate};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireCandidate {
    #[serde(rename = "type")]
    pub kind: Option<CandidateKind>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub subtitle: Option<String>,
    pub duration: Option<u32>,
    pub artwork: Option<String>,
    pub downloadable: Option<bool>,
    pub url: Option<String>,
    pub catalog_id: Option<String>,
    pub element_id: Option<String>,
}

impl WireCandidate {
    pub fn into_candidate(self, index: usize) -> TrackCandidate {
        TrackCandidate {
            index,
            kind: self.kind.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            artist: self.artist.unwrap_or_default(),
            album: self.album.unwrap_or_default(),
            subtitle: self.subtitle.unwrap_or_default(),
            duration: self.duration.unwrap_or(0),
            artwork: self.artwork.filter(|a| !a.is_empty()),
            downloadable: self.downloadable.unwrap_or(true),
            url: self.url.filter(|u| !u.is_empty()),
            catalog_id: self.catalog_id.filter(|c| !c.is_empty()),
            element: self.element_id.filter(|e| !e.is_empty()).map(ElementHandle::new),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CandidateListResponse {
    #[serde(default)]
    pub results: Vec<WireCandidate>,
}

impl CandidateListResponse {
    pub fn into_candidates(self) -> Vec<TrackCandidate> {
        self.results
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.into_candidate(i))
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct SessionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub page_id: String,
}

#[derive(Debug, Serialize)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    #[serde(rename = "type")]
    pub search_type: &'a str,
    pub limit: usize,
    pub fast_resolve: bool,
}

#[derive(Debug, Serialize)]
pub struct DownloadRequestBody<'a> {
    pub element_id: &'a str,
    pub destination_dir: &'a str,
    pub quality: DownloadSetting,
}

/// One line of the sidecar's newline-delimited download progress stream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StageEvent {
    pub phase: Option<AutomationPhase>,
    pub progress: Option<u8>,
    pub setting: Option<DownloadSetting>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

/// Parses one NDJSON line. Blank lines yield `None`.
pub fn parse_stage_line(line: &[u8]) -> anyhow::Result<Option<StageEvent>> {
    let line = std::str::from_utf8(line)?.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}
