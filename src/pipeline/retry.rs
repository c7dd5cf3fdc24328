use std::future::Future;
use std::time::Duration;

use crate::{GrabError, Result};

/// Bounded retries with a linear backoff: the wait after failed attempt `n` is `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A single attempt, no waiting
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Wait after failed attempt `attempt`, `None` when no attempt follows
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            None
        } else {
            Some(self.base_delay * attempt)
        }
    }

    /// Every wait the policy can insert, in order
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts)
            .filter_map(|attempt| self.delay_after(attempt))
            .collect()
    }
}

fn is_retryable(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<GrabError>()
        .map(GrabError::is_retryable)
        .unwrap_or(false)
}

/// Call `op(attempt)` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. The last error is returned in the latter cases.
pub async fn run_with_retries<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        if policy.max_attempts > 1 {
            println!("\n🔄 Attempt {}/{}", attempt, policy.max_attempts);
        }

        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        tracing::debug!("Attempt {} failed: {:#}", attempt, error);

        if !is_retryable(&error) {
            return Err(error);
        }

        match policy.delay_after(attempt) {
            Some(delay) => {
                println!("⚠️ {}", error);
                println!("⏳ Waiting {} seconds before retry...", delay.as_secs());
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            None => {
                if policy.max_attempts > 1 {
                    println!("\n❌ Failed after {} attempts", policy.max_attempts);
                }
                return Err(error);
            }
        }
    }
}
