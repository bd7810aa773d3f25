use std::future::Future;
use std::time::Duration;

/// Attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Fixed wait between attempts.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(2);

/// Bounded retry with a fixed (non-growing) wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    pub wait: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, wait: Duration) -> Self {
        Self {
            max_attempts,
            wait,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_WAIT)
    }
}

/// The error from the last attempt once the budget is exhausted.
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last: E,
}

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// `op` receives the 1-based attempt number. `before_sleep` is called with
/// the attempt number, its error, and the upcoming wait before every sleep;
/// there is no sleep after the final attempt.
pub async fn retry<T, E, Op, Fut, B>(
    policy: RetryPolicy,
    mut op: Op,
    mut before_sleep: B,
) -> Result<T, RetryError<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    B: FnMut(u32, &E, Duration),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(last) if attempt >= max_attempts => {
                return Err(RetryError {
                    attempts: attempt,
                    last,
                });
            }
            Err(e) => {
                before_sleep(attempt, &e, policy.wait);
                tokio::time::sleep(policy.wait).await;
                attempt += 1;
            }
        }
    }
}
