use std::path::PathBuf;
use std::time::Duration;

/// Failure of a single request to the runtime API. Every variant is
/// treated as transient by the fetcher.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("connect {}: {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed stats body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("stats body is not a JSON object")]
    NotAnObject,
}

pub type StatsResult<T> = Result<T, StatsError>;

/// Raised once the retry budget for a fetch is spent. Carries the error
/// from the final attempt.
#[derive(Debug, thiserror::Error)]
#[error("stats for {container} failed after {attempts} attempts: {source}")]
pub struct FetchError {
    pub container: String,
    pub attempts: u32,
    #[source]
    pub source: StatsError,
}
