//! Resource-usage sampling for a single container.
//!
//! Talks to the container runtime's administrative HTTP API over a Unix
//! domain socket, retries failed requests with a fixed backoff, and turns
//! the raw stats snapshot into a [`MetricRecord`]:
//!
//! - [`UnixSocketClient`]: one `GET .../stats?stream=false` per call
//! - [`retry`]: bounded attempts with a fixed wait between them
//! - [`StatsFetcher`]: retry + derive + timing, the unit a sampling loop calls
//! - [`derive`]: CPU and memory percentages from cumulative counters

mod client;
pub mod derive;
mod error;
mod fetch;
mod record;
mod retry;

pub use client::{DEFAULT_API_VERSION, DEFAULT_SOCKET_PATH, DEFAULT_TIMEOUT, StatsSource, UnixSocketClient};
pub use error::{FetchError, StatsError, StatsResult};
pub use fetch::StatsFetcher;
pub use record::{ErrorRecord, MemoryUsage, MetricRecord, Record, round2, timestamp};
pub use retry::{RetryError, RetryPolicy, retry};
