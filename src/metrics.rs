use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all fetcher metrics
const PREFIX: &str = "pezzottify_fetcher";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Search Metrics
    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_search_requests_total"), "Search requests by result type and source"),
        &["search_type", "source"]
    ).expect("Failed to create search_requests_total metric");

    // Automation Gate Metrics
    pub static ref AUTOMATION_TASK_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_automation_task_duration_seconds"),
            "Time an exclusive automation task held the session"
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0]),
        &["label"]
    ).expect("Failed to create automation_task_duration_seconds metric");

    pub static ref TIMEOUTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_timeouts_total"), "Layered timeouts that elapsed"),
        &["stage"]
    ).expect("Failed to create timeouts_total metric");

    // Resolver Metrics
    pub static ref RESOLVE_ATTEMPTS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_resolve_attempts_total"),
        "Query variants issued while re-resolving a song"
    ).expect("Failed to create resolve_attempts_total metric");

    // Download Metrics
    pub static ref DOWNLOAD_JOBS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_download_jobs_total"), "Download jobs by outcome"),
        &["outcome"]
    ).expect("Failed to create download_jobs_total metric");

    pub static ref DOWNLOAD_JOBS_CURRENT: Gauge = Gauge::new(
        format!("{PREFIX}_download_jobs_current"),
        "Jobs currently held in the job store"
    ).expect("Failed to create download_jobs_current metric");
}

pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(SEARCH_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(AUTOMATION_TASK_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(TIMEOUTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(RESOLVE_ATTEMPTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DOWNLOAD_JOBS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DOWNLOAD_JOBS_CURRENT.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record a served search and where its results came from
pub fn record_search(search_type: &str, source: &str) {
    SEARCH_REQUESTS_TOTAL
        .with_label_values(&[search_type, source])
        .inc();
}

pub fn record_automation_task(label: &str, duration: Duration) {
    AUTOMATION_TASK_DURATION_SECONDS
        .with_label_values(&[label])
        .observe(duration.as_secs_f64());
}

pub fn record_timeout(stage: &str) {
    TIMEOUTS_TOTAL.with_label_values(&[stage]).inc();
}

pub fn record_resolve_attempt() {
    RESOLVE_ATTEMPTS_TOTAL.inc();
}

/// Record a job outcome ("created", "done", "failed", "retried", "cancelled")
pub fn record_download_job(outcome: &str) {
    DOWNLOAD_JOBS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn set_current_jobs(count: usize) {
    DOWNLOAD_JOBS_CURRENT.set(count as f64);
}

/// Text exposition of every registered metric.
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => String::from_utf8(buffer).unwrap_or_default(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            format!("Failed to encode metrics: {}", e)
        }
    }
}
