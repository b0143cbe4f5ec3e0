mod file_config;

pub use file_config::{
    CredentialsConfig, FileConfig, JobStoreConfig, ResolverConfig, SearchConfig, TimeoutsConfig,
};

use crate::automation::SessionCredentials;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub download_dir: Option<PathBuf>,
    pub automation_url: Option<String>,
    pub fast_lookup_url: Option<String>,
    pub cache_ttl_secs: Option<u64>,
    pub pipeline_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub download_dir: PathBuf,
    pub automation_url: String,
    pub fast_lookup_url: Option<String>,
    pub credentials: Option<SessionCredentials>,
    pub saved_files_capacity: usize,

    // Feature settings (with defaults)
    pub search: SearchSettings,
    pub resolver: ResolverSettings,
    pub jobs: JobStoreSettings,
    pub timeouts: TimeoutSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let download_dir = file
            .download_dir
            .map(PathBuf::from)
            .or_else(|| cli.download_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "download_dir must be specified via --download-dir or in config file"
                )
            })?;

        if download_dir.exists() && !download_dir.is_dir() {
            bail!("download_dir is not a directory: {:?}", download_dir);
        }
        std::fs::create_dir_all(&download_dir)
            .with_context(|| format!("Failed to create download dir {:?}", download_dir))?;

        let automation_url = file
            .automation_url
            .or_else(|| cli.automation_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "automation_url must be specified via --automation-url or in config file"
                )
            })?;

        let fast_lookup_url = file
            .fast_lookup_url
            .or_else(|| cli.fast_lookup_url.clone());

        let credentials = file.credentials.and_then(|c| match (c.username, c.password) {
            (Some(username), Some(password)) => Some(SessionCredentials { username, password }),
            _ => None,
        });

        let defaults = SearchSettings::default();
        let search_file = file.search.unwrap_or_default();
        let search = SearchSettings {
            cache_ttl: search_file
                .cache_ttl_secs
                .or(cli.cache_ttl_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            cache_capacity: search_file
                .cache_capacity
                .unwrap_or(defaults.cache_capacity),
            track_limit: search_file.track_limit.unwrap_or(defaults.track_limit),
            artist_limit: search_file.artist_limit.unwrap_or(defaults.artist_limit),
            artwork_size: search_file.artwork_size.unwrap_or(defaults.artwork_size),
        };

        let defaults = ResolverSettings::default();
        let resolver_file = file.resolver.unwrap_or_default();
        let resolver = ResolverSettings {
            exact_threshold: resolver_file
                .exact_threshold
                .unwrap_or(defaults.exact_threshold),
            strong_threshold: resolver_file
                .strong_threshold
                .unwrap_or(defaults.strong_threshold),
            batch_size: resolver_file.batch_size.unwrap_or(defaults.batch_size),
            max_variants: resolver_file.max_variants.unwrap_or(defaults.max_variants),
            max_variants_with_catalog_id: resolver_file
                .max_variants_with_catalog_id
                .unwrap_or(defaults.max_variants_with_catalog_id),
        };

        let defaults = JobStoreSettings::default();
        let jobs_file = file.jobs.unwrap_or_default();
        let jobs = JobStoreSettings {
            max_jobs: jobs_file.max_jobs.unwrap_or(defaults.max_jobs),
            list_limit: jobs_file.list_limit.unwrap_or(defaults.list_limit),
        };

        let defaults = TimeoutSettings::default();
        let t = file.timeouts.unwrap_or_default();
        let ms = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_millis).unwrap_or(default)
        };
        let timeouts = TimeoutSettings {
            fast_lookup: ms(t.fast_lookup_ms, defaults.fast_lookup),
            session_init: ms(t.session_init_ms, defaults.session_init),
            track_search: ms(t.track_search_ms, defaults.track_search),
            track_task: ms(t.track_task_ms, defaults.track_task),
            artist_search: ms(t.artist_search_ms, defaults.artist_search),
            artist_task: ms(t.artist_task_ms, defaults.artist_task),
            resolve_query: ms(t.resolve_query_ms, defaults.resolve_query),
            resolve_step: ms(t.resolve_step_ms, defaults.resolve_step),
            pipeline: t
                .pipeline_ms
                .map(Duration::from_millis)
                .or(cli.pipeline_timeout_secs.map(Duration::from_secs))
                .unwrap_or(defaults.pipeline),
        };

        let saved_files_capacity = file.saved_files_capacity.unwrap_or(500);

        let config = Self {
            download_dir,
            automation_url,
            fast_lookup_url,
            credentials,
            saved_files_capacity,
            search,
            resolver,
            jobs,
            timeouts,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.search.cache_capacity == 0 {
            bail!("search.cache_capacity must be at least 1");
        }
        if self.jobs.max_jobs == 0 {
            bail!("jobs.max_jobs must be at least 1");
        }
        if self.saved_files_capacity == 0 {
            bail!("saved_files_capacity must be at least 1");
        }
        if self.resolver.batch_size == 0 || self.resolver.max_variants == 0 {
            bail!("resolver batch_size and max_variants must be at least 1");
        }
        let inner = self.timeouts.session_init + self.timeouts.resolve_step;
        if self.timeouts.pipeline <= inner {
            bail!(
                "timeouts.pipeline ({}ms) must exceed session init + resolve step ({}ms)",
                self.timeouts.pipeline.as_millis(),
                inner.as_millis()
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub track_limit: usize,
    pub artist_limit: usize,
    pub artwork_size: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 100,
            track_limit: 25,
            artist_limit: 10,
            artwork_size: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub exact_threshold: i32,
    pub strong_threshold: i32,
    pub batch_size: usize,
    pub max_variants: usize,
    pub max_variants_with_catalog_id: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            exact_threshold: 1000,
            strong_threshold: 140,
            batch_size: 8,
            max_variants: 5,
            max_variants_with_catalog_id: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobStoreSettings {
    pub max_jobs: usize,
    pub list_limit: usize,
}

impl Default for JobStoreSettings {
    fn default() -> Self {
        Self {
            max_jobs: 200,
            list_limit: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutSettings {
    pub fast_lookup: Duration,
    pub session_init: Duration,
    pub track_search: Duration,
    pub track_task: Duration,
    pub artist_search: Duration,
    pub artist_task: Duration,
    pub resolve_query: Duration,
    pub resolve_step: Duration,
    pub pipeline: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            fast_lookup: Duration::from_secs(12),
            session_init: Duration::from_secs(10),
            track_search: Duration::from_secs(18),
            track_task: Duration::from_secs(30),
            artist_search: Duration::from_secs(6),
            artist_task: Duration::from_secs(9),
            resolve_query: Duration::from_secs(9),
            resolve_step: Duration::from_secs(9),
            pipeline: Duration::from_secs(60),
        }
    }
}
