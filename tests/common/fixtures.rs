//! Service construction and polling helpers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use pezzottify_fetcher::automation::{AutomationDriver, FastLookup};
use pezzottify_fetcher::config::{
    JobStoreSettings, ResolverSettings, SearchSettings, TimeoutSettings,
};
use pezzottify_fetcher::search::{ElementHandle, TrackCandidate};
use pezzottify_fetcher::{AppConfig, FetchService, JobView};

use super::constants::{
    BOHEMIAN_CATALOG_ID, JOB_POLL_INTERVAL, JOB_SETTLE_TIMEOUT, NIGHT_AT_THE_OPERA, QUEEN,
};
use super::fakes::{FakeDriver, FakeFastLookup};

/// Config with default settings writing into `download_dir`.
pub fn test_config(download_dir: PathBuf) -> AppConfig {
    AppConfig {
        download_dir,
        automation_url: "http://127.0.0.1:9".to_string(),
        fast_lookup_url: None,
        credentials: None,
        saved_files_capacity: 16,
        search: SearchSettings::default(),
        resolver: ResolverSettings::default(),
        jobs: JobStoreSettings::default(),
        timeouts: TimeoutSettings::default(),
    }
}

/// `count` Bohemian Rhapsody candidates with live handles. The third one
/// (index 2) is a music video and is not downloadable.
pub fn bohemian_candidates(count: usize) -> Vec<TrackCandidate> {
    (0..count)
        .map(|i| {
            let mut candidate = TrackCandidate::new("Bohemian Rhapsody", QUEEN)
                .with_album(NIGHT_AT_THE_OPERA)
                .with_duration(354 + i as u32 * 10)
                .with_url(format!(
                    "https://music.example.com/us/album/a-night-at-the-opera/1440806000?i={}",
                    if i == 0 {
                        BOHEMIAN_CATALOG_ID.to_string()
                    } else {
                        format!("14408060{:02}", 50 + i)
                    }
                ))
                .with_element(ElementHandle::new(format!("el-{}", i)));
            candidate.index = i;
            candidate.artwork = Some(format!("https://img.example.com/{}/100x100bb.jpg", i));
            if i == 2 {
                candidate.title = "Bohemian Rhapsody (Official Video)".to_string();
                candidate.downloadable = false;
            }
            candidate
        })
        .collect()
}

pub struct TestHarness {
    pub service: FetchService,
    pub driver: Arc<FakeDriver>,
    pub fast_lookup: Option<Arc<FakeFastLookup>>,
    pub download_dir: PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::default()
    }

    pub fn fast_calls(&self) -> usize {
        self.fast_lookup.as_ref().map_or(0, |f| f.calls())
    }
}

#[derive(Default)]
pub struct TestHarnessBuilder {
    driver: Option<FakeDriver>,
    fast_lookup: Option<FakeFastLookup>,
    search: Option<SearchSettings>,
    timeouts: Option<TimeoutSettings>,
}

impl TestHarnessBuilder {
    pub fn driver(mut self, driver: FakeDriver) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn fast_results(mut self, results: Vec<TrackCandidate>) -> Self {
        self.fast_lookup = Some(FakeFastLookup::returning(results));
        self
    }

    pub fn fast_failing(mut self, message: &str) -> Self {
        self.fast_lookup = Some(FakeFastLookup::failing(message));
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        let mut search = self.search.unwrap_or_default();
        search.cache_ttl = ttl;
        self.search = Some(search);
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutSettings) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> TestHarness {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let download_dir = temp_dir.path().join("downloads");
        std::fs::create_dir_all(&download_dir).expect("Failed to create download dir");

        let mut config = test_config(download_dir.clone());
        if let Some(search) = self.search {
            config.search = search;
        }
        if let Some(timeouts) = self.timeouts {
            config.timeouts = timeouts;
        }

        let driver = Arc::new(self.driver.unwrap_or_default());
        let fast_lookup = self.fast_lookup.map(Arc::new);
        let service = FetchService::with_collaborators(
            &config,
            driver.clone() as Arc<dyn AutomationDriver>,
            fast_lookup.clone().map(|f| f as Arc<dyn FastLookup>),
        );

        TestHarness {
            service,
            driver,
            fast_lookup,
            download_dir,
            _temp_dir: temp_dir,
        }
    }
}

/// Polls until `done` accepts the job, panicking after the settle timeout.
pub async fn wait_for_job(
    service: &FetchService,
    job_id: &str,
    done: impl Fn(&JobView) -> bool,
) -> JobView {
    let deadline = tokio::time::Instant::now() + JOB_SETTLE_TIMEOUT;
    loop {
        let job = service.get_job(job_id).expect("job should exist");
        if done(&job) {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {} stuck in {:?} at {}%",
            job_id,
            job.status,
            job.progress
        );
        tokio::time::sleep(JOB_POLL_INTERVAL).await;
    }
}

pub async fn wait_for_terminal(service: &FetchService, job_id: &str) -> JobView {
    wait_for_job(service, job_id, |job| job.status.is_terminal()).await
}
