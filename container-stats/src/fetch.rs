use std::time::Instant;

use tracing::{error, warn};

use crate::client::StatsSource;
use crate::derive::derive;
use crate::error::{FetchError, StatsError, StatsResult};
use crate::record::MetricRecord;
use crate::retry::{RetryPolicy, retry};

/// One robust fetch-and-normalize cycle per call: request, parse, derive,
/// with the retry policy wrapped around the whole attempt.
pub struct StatsFetcher<S> {
    source: S,
    policy: RetryPolicy,
}

impl<S: StatsSource> StatsFetcher<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch and derive a sample for `container`.
    ///
    /// Returns [`FetchError`] only after every attempt has failed. The
    /// record's `duration_ms` covers the successful attempt alone.
    pub async fn fetch(&self, container: &str) -> Result<MetricRecord, FetchError> {
        let max_attempts = self.policy.max_attempts;
        retry(
            self.policy,
            move |_| self.attempt(container),
            move |attempt, e: &StatsError, wait| {
                warn!(
                    container,
                    attempt,
                    max_attempts,
                    wait_secs = wait.as_secs_f64(),
                    error = %e,
                    "stats fetch failed, retrying"
                );
            },
        )
        .await
        .map_err(|e| FetchError {
            container: container.to_string(),
            attempts: e.attempts,
            source: e.last,
        })
    }

    async fn attempt(&self, container: &str) -> StatsResult<MetricRecord> {
        let started = Instant::now();
        let stats = self.source.stats(container).await.inspect_err(|e| {
            error!(container, error = %e, "error getting stats");
        })?;
        Ok(derive(&stats, started.elapsed()))
    }
}
