use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub download_dir: Option<String>,
    pub automation_url: Option<String>,
    pub fast_lookup_url: Option<String>,
    pub saved_files_capacity: Option<usize>,

    // Feature configs
    pub credentials: Option<CredentialsConfig>,
    pub search: Option<SearchConfig>,
    pub resolver: Option<ResolverConfig>,
    pub jobs: Option<JobStoreConfig>,
    pub timeouts: Option<TimeoutsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CredentialsConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub cache_ttl_secs: Option<u64>,
    pub cache_capacity: Option<usize>,
    pub track_limit: Option<usize>,
    pub artist_limit: Option<usize>,
    /// Edge length artwork URLs are upgraded to, e.g. 1000 for "1000x1000"
    pub artwork_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ResolverConfig {
    pub exact_threshold: Option<i32>,
    pub strong_threshold: Option<i32>,
    pub batch_size: Option<usize>,
    pub max_variants: Option<usize>,
    pub max_variants_with_catalog_id: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct JobStoreConfig {
    pub max_jobs: Option<usize>,
    pub list_limit: Option<usize>,
}

/// All values in milliseconds.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub fast_lookup_ms: Option<u64>,
    pub session_init_ms: Option<u64>,
    pub track_search_ms: Option<u64>,
    pub track_task_ms: Option<u64>,
    pub artist_search_ms: Option<u64>,
    pub artist_task_ms: Option<u64>,
    pub resolve_query_ms: Option<u64>,
    pub resolve_step_ms: Option<u64>,
    pub pipeline_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
