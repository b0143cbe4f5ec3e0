//! End-to-end tests for download jobs
//!
//! Tests job creation, the pipeline through the automation gate, progress
//! rules, retry, cancel and the pipeline timeout.

mod common;

use std::time::Duration;

use common::{
    bohemian_candidates, wait_for_job, wait_for_terminal, FakeDriver, TestHarness,
    BOHEMIAN_QUERY,
};
use pezzottify_fetcher::config::TimeoutSettings;
use pezzottify_fetcher::search::SearchType;
use pezzottify_fetcher::{DownloadRequest, DownloadSetting, FetchError, JobStatus};

fn harness_with_results(driver: FakeDriver) -> TestHarness {
    driver.script_type(SearchType::Tracks, bohemian_candidates(5));
    TestHarness::builder().driver(driver).build()
}

async fn search_bohemian(harness: &TestHarness) {
    let tracks = harness
        .service
        .search(BOHEMIAN_QUERY, SearchType::Tracks)
        .await
        .unwrap();
    assert_eq!(tracks.len(), 5);
}

#[tokio::test]
async fn test_not_downloadable_index_is_rejected_without_job() {
    let harness = harness_with_results(FakeDriver::new());
    search_bohemian(&harness).await;

    let err = harness
        .service
        .enqueue_download(DownloadRequest::for_index(2, DownloadSetting::CdLossless))
        .unwrap_err();

    assert!(matches!(err, FetchError::NotDownloadable(_)));
    assert_eq!(err.status_code(), 422);
    assert!(harness.service.list_jobs(None).is_empty());
}

#[tokio::test]
async fn test_unknown_index_without_song_is_not_found() {
    let harness = harness_with_results(FakeDriver::new());
    search_bohemian(&harness).await;

    let err = harness
        .service
        .enqueue_download(DownloadRequest::for_index(9, DownloadSetting::CdLossless))
        .unwrap_err();

    assert_eq!(err.status_code(), 404);
    assert!(harness.service.list_jobs(None).is_empty());
}

#[tokio::test]
async fn test_download_runs_to_done() {
    let harness = harness_with_results(FakeDriver::new());
    search_bohemian(&harness).await;

    let job = harness
        .service
        .enqueue_download(DownloadRequest::for_index(0, DownloadSetting::HiRes))
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.progress, 0);
    assert_eq!(job.title, "Bohemian Rhapsody");
    assert_eq!(job.request_index, Some(0));
    assert_eq!(job.download_setting, DownloadSetting::HiRes);

    let job = wait_for_terminal(&harness.service, &job.id).await;
    assert_eq!(job.status, JobStatus::Done, "{:?}", job.error);
    assert_eq!(job.progress, 100);
    assert!(job.error.is_none());
    assert_eq!(job.total_bytes, Some(16));
    assert_eq!(job.downloaded_bytes, Some(16));

    let song = job.song.expect("done job carries its song");
    assert_eq!(song.filename, "el-0.m4a");
    assert_eq!(song.track.catalog_id.as_deref(), Some("1440806041"));
    let path = harness.service.saved_file(&song.id).expect("file registered");
    assert_eq!(path, harness.download_dir.join("el-0.m4a"));
    assert!(path.exists());

    // Listing search only, no resolution needed for a live handle
    assert_eq!(harness.driver.search_calls(), 1);
    assert_eq!(harness.driver.download_calls(), 1);
}

#[tokio::test]
async fn test_progress_never_moves_backwards() {
    let driver = FakeDriver::new();
    driver.set_download_delay(Some(Duration::from_millis(100)));
    let harness = harness_with_results(driver);
    search_bohemian(&harness).await;

    let job = harness
        .service
        .enqueue_download(DownloadRequest::for_index(1, DownloadSetting::CdLossless))
        .unwrap();

    let mut seen = vec![job.progress];
    loop {
        let current = harness.service.get_job(&job.id).unwrap();
        seen.push(current.progress);
        if current.status.is_terminal() {
            assert_eq!(current.status, JobStatus::Done);
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    assert_eq!(seen.last(), Some(&100));
}

#[tokio::test]
async fn test_downloads_take_turns_on_the_session() {
    let driver = FakeDriver::new();
    driver.set_download_delay(Some(Duration::from_millis(300)));
    let harness = harness_with_results(driver);
    search_bohemian(&harness).await;

    let first = harness
        .service
        .enqueue_download(DownloadRequest::for_index(0, DownloadSetting::CdLossless))
        .unwrap();
    let second = harness
        .service
        .enqueue_download(DownloadRequest::for_index(1, DownloadSetting::CdLossless))
        .unwrap();

    wait_for_job(&harness.service, &first.id, |job| job.progress >= 10).await;
    let waiting = harness.service.get_job(&second.id).unwrap();
    assert_eq!(waiting.status, JobStatus::Queued);
    assert_eq!(waiting.progress, 0);

    assert_eq!(
        wait_for_terminal(&harness.service, &first.id).await.status,
        JobStatus::Done
    );
    assert_eq!(
        wait_for_terminal(&harness.service, &second.id).await.status,
        JobStatus::Done
    );
    assert_eq!(harness.service.list_jobs(None)[0].id, second.id);
}

#[tokio::test]
async fn test_failed_job_can_be_retried() {
    let driver = FakeDriver::new();
    driver.set_fail_downloads(true);
    let harness = harness_with_results(driver);
    search_bohemian(&harness).await;

    let job = harness
        .service
        .enqueue_download(DownloadRequest::for_index(0, DownloadSetting::CdLossless))
        .unwrap();
    let failed = wait_for_terminal(&harness.service, &job.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed
        .error
        .as_deref()
        .is_some_and(|e| e.contains("download button")));
    assert!(failed.song.is_none());

    harness.driver.set_fail_downloads(false);
    let retried = harness.service.retry_job(&job.id).unwrap();
    assert_eq!(retried.id, job.id);
    assert_eq!(retried.status, JobStatus::Queued);
    assert_eq!(retried.progress, 0);
    assert!(retried.error.is_none());

    let done = wait_for_terminal(&harness.service, &job.id).await;
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(harness.service.list_jobs(None).len(), 1);
    assert_eq!(harness.driver.download_calls(), 2);
}

#[tokio::test]
async fn test_retry_of_active_job_conflicts() {
    let driver = FakeDriver::new();
    driver.set_download_delay(Some(Duration::from_millis(500)));
    let harness = harness_with_results(driver);
    search_bohemian(&harness).await;

    let job = harness
        .service
        .enqueue_download(DownloadRequest::for_index(0, DownloadSetting::CdLossless))
        .unwrap();

    let err = harness.service.retry_job(&job.id).unwrap_err();
    assert!(matches!(err, FetchError::Conflict(_)));
    assert_eq!(err.status_code(), 409);

    let done = wait_for_terminal(&harness.service, &job.id).await;
    assert_eq!(done.status, JobStatus::Done);
}

#[tokio::test]
async fn test_retry_and_cancel_of_unknown_job_are_not_found() {
    let harness = harness_with_results(FakeDriver::new());

    assert!(matches!(
        harness.service.retry_job("job_0_deadbeef"),
        Err(FetchError::NotFound(_))
    ));
    assert!(matches!(
        harness.service.cancel_job("job_0_deadbeef"),
        Err(FetchError::NotFound(_))
    ));
    assert!(matches!(
        harness.service.get_job("job_0_deadbeef"),
        Err(FetchError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_cancel_removes_job_but_not_running_work() {
    let driver = FakeDriver::new();
    driver.set_download_delay(Some(Duration::from_millis(200)));
    let harness = harness_with_results(driver);
    search_bohemian(&harness).await;

    let job = harness
        .service
        .enqueue_download(DownloadRequest::for_index(0, DownloadSetting::CdLossless))
        .unwrap();
    wait_for_job(&harness.service, &job.id, |job| job.progress >= 10).await;

    let cancelled = harness.service.cancel_job(&job.id).unwrap();
    assert_eq!(cancelled.id, job.id);
    assert!(matches!(
        harness.service.get_job(&job.id),
        Err(FetchError::NotFound(_))
    ));

    // The automation work finishes on its own and does not resurrect the job
    harness.service.shutdown().await;
    assert_eq!(harness.driver.download_calls(), 1);
    assert_eq!(harness.driver.downloaded().len(), 1);
    assert!(harness.service.list_jobs(None).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_timeout_fails_the_job() {
    let driver = FakeDriver::new();
    driver.set_download_delay(Some(Duration::from_secs(60)));
    driver.script_type(SearchType::Tracks, bohemian_candidates(5));
    let harness = TestHarness::builder()
        .driver(driver)
        .timeouts(TimeoutSettings {
            pipeline: Duration::from_secs(2),
            ..TimeoutSettings::default()
        })
        .build();
    search_bohemian(&harness).await;

    let job = harness
        .service
        .enqueue_download(DownloadRequest::for_index(0, DownloadSetting::CdLossless))
        .unwrap();
    let failed = wait_for_terminal(&harness.service, &job.id).await;

    assert_eq!(failed.status, JobStatus::Failed);
    assert!(
        failed
            .error
            .as_deref()
            .is_some_and(|e| e.contains("download pipeline timed out")),
        "{:?}",
        failed.error
    );
    assert!(failed.progress < 100);
}

#[tokio::test(start_paused = true)]
async fn test_progress_from_timed_out_attempt_is_ignored_after_retry() {
    let driver = FakeDriver::new();
    driver.set_download_delay(Some(Duration::from_secs(6)));
    driver.script_type(SearchType::Tracks, bohemian_candidates(5));
    let harness = TestHarness::builder()
        .driver(driver)
        .timeouts(TimeoutSettings {
            pipeline: Duration::from_secs(4),
            ..TimeoutSettings::default()
        })
        .build();
    search_bohemian(&harness).await;

    let job = harness
        .service
        .enqueue_download(DownloadRequest::for_index(0, DownloadSetting::CdLossless))
        .unwrap();
    assert_eq!(
        wait_for_terminal(&harness.service, &job.id).await.status,
        JobStatus::Failed
    );

    // The first attempt keeps the session until its download finishes at 6s
    // and reports downloading/saving/done then. The retry only gets the
    // session afterwards and stalls in its own download stage.
    harness.driver.set_download_delay(Some(Duration::from_secs(30)));
    let retried = harness.service.retry_job(&job.id).unwrap();
    assert_eq!(retried.status, JobStatus::Queued);

    tokio::time::sleep(Duration::from_secs(3)).await;
    let current = harness.service.get_job(&job.id).unwrap();
    assert_eq!(current.status, JobStatus::Preparing);
    assert!(current.progress < 20, "progress {}", current.progress);
    assert!(current.song.is_none());
    assert_eq!(harness.driver.downloaded().len(), 1);
}

#[tokio::test]
async fn test_saved_file_outside_download_dir_fails_the_job() {
    let driver = FakeDriver::new();
    driver.set_reported_filename("../x.m4a");
    let harness = harness_with_results(driver);
    search_bohemian(&harness).await;

    let job = harness
        .service
        .enqueue_download(DownloadRequest::for_index(0, DownloadSetting::CdLossless))
        .unwrap();
    let failed = wait_for_terminal(&harness.service, &job.id).await;

    assert_eq!(failed.status, JobStatus::Failed);
    assert!(
        failed
            .error
            .as_deref()
            .is_some_and(|e| e.contains("outside the download directory")),
        "{:?}",
        failed.error
    );
    assert!(failed.song.is_none());
    assert_eq!(harness.driver.download_calls(), 1);
}
