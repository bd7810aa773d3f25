use std::time::Duration;

use container_stats::{ErrorRecord, FetchError, MetricRecord, Record, StatsFetcher, StatsSource};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::MonitorResult;
use crate::sink::JsonlSink;

/// The long-running sampling loop for one container.
///
/// Every tick writes exactly one line: a sample on success, an error record
/// when the fetcher gives up. Only sink failures end the loop early.
pub struct Sampler<S> {
    fetcher: StatsFetcher<S>,
    container: String,
    interval: Duration,
}

impl<S: StatsSource> Sampler<S> {
    pub fn new(fetcher: StatsFetcher<S>, container: String, interval: Duration) -> Self {
        Self {
            fetcher,
            container,
            interval,
        }
    }

    /// Sample until `cancel` fires. Returns the number of records written.
    ///
    /// Cancellation is honoured while fetching and while waiting for the
    /// next tick; a tick cancelled mid-fetch writes nothing.
    pub async fn run(&self, sink: &mut JsonlSink, cancel: &CancellationToken) -> MonitorResult<u64> {
        info!(
            container = %self.container,
            path = %sink.path().display(),
            interval_secs = self.interval.as_secs(),
            max_attempts = self.fetcher.policy().max_attempts,
            "starting monitoring"
        );

        let mut written = 0u64;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.fetcher.fetch(&self.container) => outcome,
            };

            sink.write(&tick_record(outcome)).await?;
            written += 1;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(container = %self.container, written, "monitoring stopped");
        Ok(written)
    }
}

fn tick_record(outcome: Result<MetricRecord, FetchError>) -> Record {
    match outcome {
        Ok(record) => Record::Sample(record),
        Err(e) => {
            error!(
                container = %e.container,
                attempts = e.attempts,
                error = %e.source,
                "failed to collect stats"
            );
            Record::Error(ErrorRecord::new(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use container_stats::{RetryPolicy, StatsError, StatsResult};
    use serde_json::{Value, json};

    use super::*;

    /// Scripted stats source. Pops one response per call; cancels the
    /// token on the `cancel_on`-th call so loops end deterministically.
    struct Scripted {
        responses: Mutex<VecDeque<StatsResult<Value>>>,
        calls: AtomicU32,
        cancel_on: Option<(u32, CancellationToken)>,
    }

    impl Scripted {
        fn new(responses: Vec<StatsResult<Value>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
                cancel_on: None,
            }
        }

        fn cancel_on(mut self, call: u32, token: CancellationToken) -> Self {
            self.cancel_on = Some((call, token));
            self
        }
    }

    #[async_trait]
    impl StatsSource for Scripted {
        async fn stats(&self, _container: &str) -> StatsResult<Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((at, token)) = &self.cancel_on
                && *at == call
            {
                token.cancel();
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(refused()))
        }
    }

    /// Never answers.
    struct Hung;

    #[async_trait]
    impl StatsSource for Hung {
        async fn stats(&self, _container: &str) -> StatsResult<Value> {
            std::future::pending().await
        }
    }

    fn refused() -> StatsError {
        StatsError::Connect {
            path: "/podman.sock".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        }
    }

    fn healthy(total: u64) -> Value {
        json!({
            "cpu_stats": {
                "cpu_usage": { "total_usage": total },
                "system_cpu_usage": 2000,
                "online_cpus": 1
            },
            "precpu_stats": {
                "cpu_usage": { "total_usage": 0 },
                "system_cpu_usage": 1000
            },
            "memory_stats": { "usage": 50, "limit": 100 }
        })
    }

    fn sampler<S: StatsSource>(source: S, policy: RetryPolicy) -> Sampler<S> {
        Sampler::new(
            StatsFetcher::new(source, policy),
            "ruost".to_string(),
            Duration::from_secs(10),
        )
    }

    fn read_lines(path: &std::path::Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn every_tick_writes_exactly_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.jsonl");
        let mut sink = JsonlSink::open(path.clone()).await.unwrap();
        let cancel = CancellationToken::new();

        // Two attempts per tick: success, exhausted failure, success after a retry, success.
        let source = Scripted::new(vec![
            Ok(healthy(100)),
            Err(refused()),
            Err(refused()),
            Err(refused()),
            Ok(healthy(200)),
            Ok(healthy(300)),
        ])
        .cancel_on(6, cancel.clone());
        let sampler = sampler(source, RetryPolicy::new(2, Duration::from_secs(2)));

        let written = sampler.run(&mut sink, &cancel).await.unwrap();
        assert_eq!(written, 4);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 4);

        assert_eq!(lines[0]["cpu_percent"], 10.0);
        assert_eq!(lines[0]["memory"]["usage_percent"], 50.0);
        assert!(lines[0].get("duration_ms").is_some());
        assert!(lines[0].get("error").is_none());

        assert_eq!(lines[1]["cpu_percent"], 0.0);
        assert_eq!(lines[1]["memory"], json!({ "usage": 0, "limit": 0, "usage_percent": 0.0 }));
        assert!(lines[1]["error"].as_str().unwrap().contains("after 2 attempts"));
        assert!(lines[1].get("duration_ms").is_none());

        assert_eq!(lines[2]["cpu_percent"], 20.0);
        assert_eq!(lines[3]["cpu_percent"], 30.0);

        let timestamps: Vec<&str> = lines.iter().map(|l| l["timestamp"].as_str().unwrap()).collect();
        assert!(timestamps.windows(2).all(|w| w[0] <= w[1]), "{timestamps:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_interval_between_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlSink::open(dir.path().join("stats.jsonl")).await.unwrap();
        let cancel = CancellationToken::new();
        let source = Scripted::new(vec![Ok(healthy(1)), Ok(healthy(2)), Ok(healthy(3))])
            .cancel_on(3, cancel.clone());
        let sampler = sampler(source, RetryPolicy::default());
        let start = tokio::time::Instant::now();

        sampler.run(&mut sink, &cancel).await.unwrap();

        // ticks at 0s, 10s and 20s; cancelled before the third sleep
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_waits_for_retries_then_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.jsonl");
        let mut sink = JsonlSink::open(path.clone()).await.unwrap();
        let cancel = CancellationToken::new();
        // 5 failures exhaust tick one, the 6th call is tick two.
        let mut script: Vec<StatsResult<Value>> = (0..5).map(|_| Err(refused())).collect();
        script.push(Ok(healthy(100)));
        let source = Scripted::new(script).cancel_on(6, cancel.clone());
        let sampler = sampler(source, RetryPolicy::default());
        let start = tokio::time::Instant::now();

        let written = sampler.run(&mut sink, &cancel).await.unwrap();

        assert_eq!(written, 2);
        // 4 backoffs of 2s, then the 10s sample interval
        assert_eq!(start.elapsed(), Duration::from_secs(18));
        let lines = read_lines(&path);
        assert!(lines[0].get("error").is_some());
        assert!(lines[1].get("error").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_sleep_leaves_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.jsonl");
        let mut sink = JsonlSink::open(path.clone()).await.unwrap();
        let cancel = CancellationToken::new();
        let source = Scripted::new((0..10).map(|i| Ok(healthy(i * 10 + 1))).collect());
        let sampler = sampler(source, RetryPolicy::default());

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            stopper.cancel();
        });

        let written = sampler.run(&mut sink, &cancel).await.unwrap();

        assert_eq!(written, 3);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with('\n'));
        assert_eq!(read_lines(&path).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_fetch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.jsonl");
        let mut sink = JsonlSink::open(path.clone()).await.unwrap();
        let cancel = CancellationToken::new();
        let sampler = sampler(Hung, RetryPolicy::default());

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            stopper.cancel();
        });

        let written = sampler.run(&mut sink, &cancel).await.unwrap();

        assert_eq!(written, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_exits_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.jsonl");
        let mut sink = JsonlSink::open(path.clone()).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let source = Scripted::new(vec![Ok(healthy(1))]);
        let sampler = sampler(source, RetryPolicy::default());

        assert_eq!(sampler.run(&mut sink, &cancel).await.unwrap(), 0);
        assert_eq!(sampler.fetcher_calls(), 0);
    }

    impl Sampler<Scripted> {
        fn fetcher_calls(&self) -> u32 {
            self.fetcher.source().calls.load(Ordering::SeqCst)
        }
    }
}
