//! Shared constants for end-to-end tests

use std::time::Duration;

pub const BOHEMIAN_QUERY: &str = "Bohemian Rhapsody";

pub const QUEEN: &str = "Queen";

pub const NIGHT_AT_THE_OPERA: &str = "A Night at the Opera";

/// Catalog id carried by the first scripted Bohemian Rhapsody candidate.
pub const BOHEMIAN_CATALOG_ID: &str = "1440806041";

/// Upper bound for a job to reach a terminal state in real-time tests.
pub const JOB_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

pub const JOB_POLL_INTERVAL: Duration = Duration::from_millis(10);
