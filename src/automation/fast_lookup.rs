use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use super::driver::FastLookup;
use super::wire::CandidateListResponse;
use crate::search::TrackCandidate;

/// Catalog search endpoint that answers without touching the automation
/// session.
pub struct HttpFastLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFastLookup {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FastLookup for HttpFastLookup {
    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<TrackCandidate>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("term", query.to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .context("Failed to connect to fast lookup service")?;

        if !response.status().is_success() {
            bail!(
                "Fast lookup for '{}' failed: status {}",
                query,
                response.status()
            );
        }

        let results: CandidateListResponse = response
            .json()
            .await
            .context("Failed to parse fast lookup response")?;

        // Handles only exist inside the automation session
        let mut candidates = results.into_candidates();
        for candidate in candidates.iter_mut() {
            candidate.element = None;
        }
        candidates.truncate(limit);
        Ok(candidates)
    }
}
