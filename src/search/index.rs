//! The active result set and its identity index.
//!
//! The index is rebuilt in one pass every time the result set is replaced,
//! so a remembered song can be re-identified without another search.

use std::collections::HashMap;
use std::sync::RwLock;

use super::models::{SongRef, TrackCandidate};
use super::normalize::{extract_catalog_id, normalize_text, normalize_url};

const DURATION_BUCKET_SECS: u32 = 5;

fn fingerprint_key(title: &str, artist: &str, album: &str, bucket: u32) -> String {
    format!("{}|{}|{}|{}", title, artist, album, bucket)
}

fn title_artist_key(title: &str, artist: &str) -> String {
    format!("{}|{}", title, artist)
}

fn song_catalog_id(song: &SongRef) -> Option<String> {
    song.catalog_id
        .clone()
        .filter(|id| !id.is_empty())
        .or_else(|| song.url.as_deref().and_then(extract_catalog_id))
}

/// Four lookup maps into a result set, all holding positions.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_catalog_id: HashMap<String, usize>,
    by_url: HashMap<String, usize>,
    by_fingerprint: HashMap<String, Vec<usize>>,
    by_title_artist: HashMap<String, usize>,
}

impl IdentityIndex {
    pub fn build(songs: &[TrackCandidate]) -> Self {
        let mut index = Self::default();
        for (pos, song) in songs.iter().enumerate() {
            let catalog_id = song
                .catalog_id
                .clone()
                .or_else(|| song.url.as_deref().and_then(extract_catalog_id));
            if let Some(id) = catalog_id {
                index.by_catalog_id.entry(id).or_insert(pos);
            }
            if let Some(url) = song.url.as_deref().and_then(normalize_url) {
                index.by_url.entry(url).or_insert(pos);
            }

            let title = normalize_text(&song.title);
            if title.is_empty() {
                continue;
            }
            let artist = normalize_text(&song.artist);
            let album = normalize_text(&song.album);
            let bucket = song.duration / DURATION_BUCKET_SECS;
            index
                .by_fingerprint
                .entry(fingerprint_key(&title, &artist, &album, bucket))
                .or_default()
                .push(pos);
            index
                .by_title_artist
                .entry(title_artist_key(&title, &artist))
                .or_insert(pos);
        }
        index
    }

    /// Position of `song` in `songs`, trying exact identity first.
    pub fn lookup(&self, songs: &[TrackCandidate], song: &SongRef) -> Option<usize> {
        if let Some(pos) = song_catalog_id(song).and_then(|id| self.by_catalog_id.get(&id)) {
            return Some(*pos);
        }
        if let Some(pos) = song
            .url
            .as_deref()
            .and_then(normalize_url)
            .and_then(|url| self.by_url.get(&url))
        {
            return Some(*pos);
        }

        let title = normalize_text(song.title());
        if title.is_empty() {
            return None;
        }
        let artist = normalize_text(song.artist());
        let album = normalize_text(song.album());
        let duration = song.duration();

        if duration > 0 {
            let bucket = duration / DURATION_BUCKET_SECS;
            let closest = [bucket.saturating_sub(1), bucket, bucket + 1]
                .iter()
                .filter_map(|b| {
                    self.by_fingerprint
                        .get(&fingerprint_key(&title, &artist, &album, *b))
                })
                .flatten()
                .copied()
                .min_by_key(|pos| {
                    songs
                        .get(*pos)
                        .map(|s| s.duration.abs_diff(duration))
                        .unwrap_or(u32::MAX)
                });
            if closest.is_some() {
                return closest;
            }
        }

        self.by_title_artist
            .get(&title_artist_key(&title, &artist))
            .copied()
    }
}

/// True when `candidate` plausibly is the song the caller remembers.
fn is_same_song(candidate: &TrackCandidate, song: &SongRef) -> bool {
    let candidate_id = candidate
        .catalog_id
        .clone()
        .or_else(|| candidate.url.as_deref().and_then(extract_catalog_id));
    if let (Some(a), Some(b)) = (candidate_id, song_catalog_id(song)) {
        return a == b;
    }
    let title = normalize_text(song.title());
    if title.is_empty() {
        return true;
    }
    if normalize_text(&candidate.title) != title {
        return false;
    }
    let artist = normalize_text(song.artist());
    let candidate_artist = normalize_text(&candidate.artist);
    artist.is_empty()
        || candidate_artist.is_empty()
        || candidate_artist.contains(&artist)
        || artist.contains(&candidate_artist)
}

#[derive(Default)]
struct ResultSet {
    songs: Vec<TrackCandidate>,
    index: IdentityIndex,
}

/// The most recent result set of the single active caller context.
#[derive(Default)]
pub struct SearchContext {
    state: RwLock<ResultSet>,
}

impl SearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the active result set and rebuilds the index.
    pub fn set_last_search_songs(&self, songs: Vec<TrackCandidate>) {
        let index = IdentityIndex::build(&songs);
        let mut state = self.state.write().unwrap();
        *state = ResultSet { songs, index };
    }

    pub fn last_search_songs(&self) -> Vec<TrackCandidate> {
        self.state.read().unwrap().songs.clone()
    }

    /// Candidate for a request: by position when the index is valid and
    /// agrees with the remembered song, otherwise by identity.
    pub fn get_song_from_request(
        &self,
        index: Option<usize>,
        song: Option<&SongRef>,
    ) -> Option<TrackCandidate> {
        let state = self.state.read().unwrap();
        if let Some(candidate) = index.and_then(|i| state.songs.get(i)) {
            match song {
                Some(song) if song.is_resolvable() && !is_same_song(candidate, song) => {}
                _ => return Some(candidate.clone()),
            }
        }
        let song = song?;
        state
            .index
            .lookup(&state.songs, song)
            .and_then(|pos| state.songs.get(pos))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::models::ElementHandle;

    fn song(title: &str, artist: &str) -> SongRef {
        SongRef {
            title: Some(title.to_string()),
            artist: Some(artist.to_string()),
            ..Default::default()
        }
    }

    fn result_set() -> Vec<TrackCandidate> {
        vec![
            TrackCandidate::new("Intro", "Band")
                .with_url("https://music.example.com/us/song/intro/1000001"),
            TrackCandidate::new("Song", "Band")
                .with_album("Album")
                .with_duration(180)
                .with_element(ElementHandle::new("el-1")),
            TrackCandidate::new("Song", "Band")
                .with_album("Album")
                .with_duration(241)
                .with_element(ElementHandle::new("el-2")),
            TrackCandidate::new("Song", "Band").with_url("https://music.example.com/x/y"),
        ]
    }

    #[test]
    fn test_lookup_by_catalog_id_and_url() {
        let songs = result_set();
        let index = IdentityIndex::build(&songs);

        let by_id = SongRef {
            catalog_id: Some("1000001".to_string()),
            ..Default::default()
        };
        assert_eq!(index.lookup(&songs, &by_id), Some(0));

        let by_url = SongRef {
            url: Some("http://www.music.example.com/x/y/".to_string()),
            ..Default::default()
        };
        assert_eq!(index.lookup(&songs, &by_url), Some(3));
    }

    #[test]
    fn test_lookup_disambiguates_by_duration() {
        let songs = result_set();
        let index = IdentityIndex::build(&songs);

        let mut remembered = song("Song", "Band");
        remembered.album = Some("Album".to_string());
        remembered.duration = Some(243);
        assert_eq!(index.lookup(&songs, &remembered), Some(2));

        remembered.duration = Some(179);
        assert_eq!(index.lookup(&songs, &remembered), Some(1));
    }

    #[test]
    fn test_lookup_falls_back_to_title_artist() {
        let songs = result_set();
        let index = IdentityIndex::build(&songs);

        // First occurrence wins
        assert_eq!(index.lookup(&songs, &song("song", "BAND")), Some(1));
        assert_eq!(index.lookup(&songs, &song("Unknown", "Band")), None);
    }

    #[test]
    fn test_get_song_prefers_position() {
        let context = SearchContext::new();
        context.set_last_search_songs(result_set());

        let found = context.get_song_from_request(Some(2), None).unwrap();
        assert_eq!(found.element, Some(ElementHandle::new("el-2")));
        assert!(context.get_song_from_request(Some(10), None).is_none());
    }

    #[test]
    fn test_get_song_with_stale_index_uses_identity() {
        let context = SearchContext::new();
        context.set_last_search_songs(result_set());

        // Position 0 holds "Intro", so the index is stale for "Song"
        let found = context
            .get_song_from_request(Some(0), Some(&song("Song", "Band")))
            .unwrap();
        assert_eq!(found.title, "Song");

        let found = context
            .get_song_from_request(Some(9), Some(&song("Intro", "Band")))
            .unwrap();
        assert_eq!(found.title, "Intro");
    }

    #[test]
    fn test_new_search_replaces_result_set() {
        let context = SearchContext::new();
        context.set_last_search_songs(result_set());
        context.set_last_search_songs(vec![TrackCandidate::new("Other", "Someone")]);

        assert_eq!(context.last_search_songs().len(), 1);
        assert!(context
            .get_song_from_request(None, Some(&song("Song", "Band")))
            .is_none());
    }
}
