use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded retry with a fixed delay between attempts.
///
/// Both the page fetcher and the notification service go through this instead
/// of carrying their own ad-hoc retry loops.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `attempts` is the total number of tries, including the first one.
    pub const fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    /// Runs `op` until it succeeds or the attempt budget is exhausted,
    /// returning the last error in that case.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts.max(1) => {
                    warn!(operation = what, attempt, error = %e, "Attempt failed, retrying after backoff.");
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
