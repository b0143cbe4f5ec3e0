//! Search data models.
//!
//! Defines result types, catalog candidates, partial song references sent
//! back by callers, and the public shapes handed to the route layer.

use serde::{Deserialize, Serialize};

/// Kind of result requested from a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Tracks,
    Albums,
    Artists,
    Playlists,
}

impl SearchType {
    /// Lenient parse: trimmed, case-folded and prefix-matched
    /// ("track", "Tracks", "albums " ...). Anything unknown is `Tracks`.
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim().to_lowercase();
        if value.starts_with("album") {
            SearchType::Albums
        } else if value.starts_with("artist") {
            SearchType::Artists
        } else if value.starts_with("playlist") {
            SearchType::Playlists
        } else {
            SearchType::Tracks
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Tracks => "tracks",
            SearchType::Albums => "albums",
            SearchType::Artists => "artists",
            SearchType::Playlists => "playlists",
        }
    }

    /// Kind of candidate this search type yields.
    pub fn candidate_kind(&self) -> CandidateKind {
        match self {
            SearchType::Tracks => CandidateKind::Track,
            SearchType::Albums => CandidateKind::Album,
            SearchType::Artists => CandidateKind::Artist,
            SearchType::Playlists => CandidateKind::Playlist,
        }
    }
}

impl Default for SearchType {
    fn default() -> Self {
        SearchType::Tracks
    }
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Track,
    Album,
    Artist,
    Playlist,
}

impl Default for CandidateKind {
    fn default() -> Self {
        CandidateKind::Track
    }
}

/// Opaque handle into the live automation session.
///
/// Only valid for the session that produced it and never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// One catalog entry surfaced by a search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackCandidate {
    pub index: usize,
    pub kind: CandidateKind,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub subtitle: String,
    /// Seconds, 0 when unknown.
    pub duration: u32,
    pub artwork: Option<String>,
    pub downloadable: bool,
    pub url: Option<String>,
    pub catalog_id: Option<String>,
    pub element: Option<ElementHandle>,
}

impl TrackCandidate {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            downloadable: true,
            ..Default::default()
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_element(mut self, element: ElementHandle) -> Self {
        self.element = Some(element);
        self
    }

    /// True when the candidate can be handed to the download stage as is.
    pub fn has_live_handle(&self) -> bool {
        self.element.is_some()
    }

    pub fn to_public(&self) -> PublicTrack {
        PublicTrack::from(self)
    }
}

/// Partial song a caller remembers, typically from an earlier search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongRef {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub subtitle: Option<String>,
    pub duration: Option<u32>,
    pub artwork: Option<String>,
    pub url: Option<String>,
    pub catalog_id: Option<String>,
    pub downloadable: Option<bool>,
}

impl SongRef {
    /// True when the reference carries enough identity to search for.
    pub fn is_resolvable(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.title) || present(&self.url) || present(&self.catalog_id)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn artist(&self) -> &str {
        self.artist.as_deref().unwrap_or("")
    }

    pub fn album(&self) -> &str {
        self.album.as_deref().unwrap_or("")
    }

    pub fn duration(&self) -> u32 {
        self.duration.unwrap_or(0)
    }
}

impl From<&TrackCandidate> for SongRef {
    fn from(track: &TrackCandidate) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            title: non_empty(&track.title),
            artist: non_empty(&track.artist),
            album: non_empty(&track.album),
            subtitle: non_empty(&track.subtitle),
            duration: (track.duration > 0).then_some(track.duration),
            artwork: track.artwork.clone(),
            url: track.url.clone(),
            catalog_id: track.catalog_id.clone(),
            downloadable: Some(track.downloadable),
        }
    }
}

/// Candidate as exposed to API consumers, without the automation handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicTrack {
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: CandidateKind,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub subtitle: String,
    pub duration: u32,
    pub artwork: Option<String>,
    pub downloadable: bool,
    pub url: Option<String>,
    pub catalog_id: Option<String>,
}

impl From<&TrackCandidate> for PublicTrack {
    fn from(track: &TrackCandidate) -> Self {
        Self {
            index: track.index,
            kind: track.kind,
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            subtitle: track.subtitle.clone(),
            duration: track.duration,
            artwork: track.artwork.clone(),
            downloadable: track.downloadable,
            url: track.url.clone(),
            catalog_id: track.catalog_id.clone(),
        }
    }
}

/// Public payload of a finished download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSong {
    #[serde(flatten)]
    pub track: PublicTrack,
    /// Synthetic id the byte-streaming layer serves the file under.
    pub id: String,
    pub filename: String,
}
