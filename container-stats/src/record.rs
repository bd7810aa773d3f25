use serde::Serialize;
use serde_json::Value;

/// Memory figures for one sample. `limit` is the raw reported value; the
/// percentage is computed against `limit`, or 1 when the limit is 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub usage: u64,
    pub limit: u64,
    pub usage_percent: f64,
}

impl MemoryUsage {
    pub fn zeroed() -> Self {
        Self {
            usage: 0,
            limit: 0,
            usage_percent: 0.0,
        }
    }
}

/// A successful sample, one per tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub timestamp: String,
    pub cpu_percent: f64,
    pub memory: MemoryUsage,
    pub networks: Value,
    pub duration_ms: f64,
}

/// Degraded record written when a tick could not produce a sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub timestamp: String,
    pub error: String,
    pub cpu_percent: f64,
    pub memory: MemoryUsage,
}

impl ErrorRecord {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp(),
            error: error.into(),
            cpu_percent: 0.0,
            memory: MemoryUsage::zeroed(),
        }
    }
}

/// One line of the stats log.
///
/// Serialized untagged: consumers see the plain field set of whichever
/// variant was written, and error lines carry no `duration_ms`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Sample(MetricRecord),
    Error(ErrorRecord),
}

impl Record {
    pub fn timestamp(&self) -> &str {
        match self {
            Record::Sample(r) => &r.timestamp,
            Record::Error(r) => &r.timestamp,
        }
    }

    /// Render as a single JSON object terminated by `\n`.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

impl From<MetricRecord> for Record {
    fn from(r: MetricRecord) -> Self {
        Record::Sample(r)
    }
}

impl From<ErrorRecord> for Record {
    fn from(r: ErrorRecord) -> Self {
        Record::Error(r)
    }
}

/// Current UTC time as RFC 3339 with microseconds and a `+00:00` offset.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
