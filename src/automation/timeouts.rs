use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::FetchError;
use crate::metrics;

/// Races `future` against a `limit` timer.
///
/// Losing the race drops only this future. Work already handed to the gate
/// worker keeps running against the session.
pub async fn race<T, F>(stage: &'static str, limit: Duration, future: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} timed out after {:?}", stage, limit);
            metrics::record_timeout(stage);
            Err(FetchError::Timeout {
                stage,
                after: limit,
            })
        }
    }
}
