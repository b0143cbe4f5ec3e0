//! Search dispatch, the active result set and identity resolution.

mod cache;
mod dispatcher;
mod index;
mod models;
pub mod normalize;
mod resolver;
pub mod scoring;

pub use cache::BoundedCache;
pub use dispatcher::{derive_artists, ingest_candidates, SearchDispatcher};
pub use index::{IdentityIndex, SearchContext};
pub use models::{
    CandidateKind, CompletedSong, ElementHandle, PublicTrack, SearchType, SongRef, TrackCandidate,
};
pub use resolver::{build_resolve_queries, ResolveProgress, SongResolver};
pub use scoring::{score_candidate_match, TargetProfile};
