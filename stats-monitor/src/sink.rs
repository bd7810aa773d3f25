use std::path::{Path, PathBuf};

use container_stats::Record;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{MonitorError, MonitorResult};

/// Append-only JSONL writer for the stats log. One record per line, flushed
/// before `write` returns.
pub struct JsonlSink {
    path: PathBuf,
    file: File,
}

impl JsonlSink {
    /// Create the parent directory if needed and open `path` for appending.
    pub async fn open(path: PathBuf) -> MonitorResult<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| MonitorError::Sink {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| MonitorError::Sink {
                path: path.clone(),
                source,
            })?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&mut self, record: &Record) -> MonitorResult<()> {
        let line = record.to_line()?;
        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|source| MonitorError::Sink {
                path: self.path.clone(),
                source,
            })?;
        self.file.flush().await.map_err(|source| MonitorError::Sink {
            path: self.path.clone(),
            source,
        })
    }
}
