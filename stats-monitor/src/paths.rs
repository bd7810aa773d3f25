use std::path::{Path, PathBuf};

/// Output paths derived from the log directory.
pub struct LogPaths {
    dir: PathBuf,
}

impl LogPaths {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stats(&self) -> PathBuf {
        self.dir.join("stats.jsonl")
    }
}
