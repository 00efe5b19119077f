use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::UpstreamError;

/// Bounded retry for upstream calls
///
/// Only [`UpstreamError::Transient`] failures are retried; the wait grows
/// linearly with the attempt number.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}",
                        what, attempt, self.max_attempts, e
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
