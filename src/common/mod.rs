pub mod backoff;
pub mod errors;
pub mod http;
pub mod logger;
pub mod types;

pub use backoff::*;
pub use errors::*;
pub use http::*;
pub use types::*;

use std::{future::Future, time::Duration};

/// Bounds an external call. Elapsed calls fail the triggering operation and
/// are never retried here.
pub async fn with_timeout<T>(
    what: &'static str,
    limit: Duration,
    fut: impl Future<Output = T>,
) -> Result<T, MusicError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| MusicError::Timeout {
            what,
            after_ms: limit.as_millis() as u64,
        })
}
