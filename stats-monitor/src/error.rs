use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("config error: {0}")]
    Config(String),

    /// The stats log could not be created, opened or written.
    #[error("log destination {}: {source}", .path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
