//! Turns one raw stats snapshot into a [`MetricRecord`].
//!
//! The snapshot carries both the current (`cpu_stats`) and the previous
//! (`precpu_stats`) cumulative counters, so a single response is enough to
//! compute a CPU rate. Nothing here fails: missing fields read as zero and
//! malformed ones degrade the affected figure to zero.

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::record::{MemoryUsage, MetricRecord, round2, timestamp};

#[derive(Debug, thiserror::Error)]
enum DeriveError {
    #[error("`{0}` is not an object")]
    NotAnObject(&'static str),

    #[error("`{0}` is not a number")]
    NotANumber(&'static str),
}

/// A raw counter. Integers are kept exact so that deltas between two large
/// nanosecond totals do not lose precision before the division.
#[derive(Debug, Clone, Copy)]
enum Counter {
    Int(i128),
    Float(f64),
}

impl Counter {
    fn minus(self, earlier: Counter) -> f64 {
        match (self, earlier) {
            (Counter::Int(a), Counter::Int(b)) => (a - b) as f64,
            (a, b) => a.as_f64() - b.as_f64(),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Counter::Int(v) => v as f64,
            Counter::Float(v) => v,
        }
    }
}

/// Build a full sample record. `elapsed` is the time spent obtaining the
/// snapshot; the timestamp is taken now.
pub fn derive(stats: &Value, elapsed: Duration) -> MetricRecord {
    let cpu_percent = cpu_percent(stats);
    let memory = memory_usage(stats);
    let networks = networks(stats);
    MetricRecord {
        timestamp: timestamp(),
        cpu_percent,
        memory,
        networks,
        duration_ms: round2(elapsed.as_secs_f64() * 1000.0),
    }
}

/// CPU utilisation in percent, rounded to two decimals. Returns `0.0` when
/// either delta is not positive or when the snapshot is malformed.
pub fn cpu_percent(stats: &Value) -> f64 {
    match try_cpu_percent(stats) {
        Ok(pct) if pct.is_finite() && pct >= 0.0 => pct,
        Ok(pct) => {
            debug!(cpu_percent = pct, "discarding out-of-range cpu percent");
            0.0
        }
        Err(e) => {
            error!(error = %e, "cpu calculation failed");
            0.0
        }
    }
}

fn try_cpu_percent(stats: &Value) -> Result<f64, DeriveError> {
    let empty = Map::new();
    let cpu_stats = object(stats, "cpu_stats")?.unwrap_or(&empty);
    let precpu_stats = object(stats, "precpu_stats")?.unwrap_or(&empty);
    let cpu_usage = nested(cpu_stats, "cpu_usage", "cpu_stats.cpu_usage")?.unwrap_or(&empty);
    let precpu_usage =
        nested(precpu_stats, "cpu_usage", "precpu_stats.cpu_usage")?.unwrap_or(&empty);

    let total = counter(cpu_usage, "total_usage", "cpu_stats.cpu_usage.total_usage")?;
    let pre_total = counter(
        precpu_usage,
        "total_usage",
        "precpu_stats.cpu_usage.total_usage",
    )?;
    let system = counter(cpu_stats, "system_cpu_usage", "cpu_stats.system_cpu_usage")?;
    let pre_system = counter(
        precpu_stats,
        "system_cpu_usage",
        "precpu_stats.system_cpu_usage",
    )?;

    let cpu_delta = total.minus(pre_total);
    let system_delta = system.minus(pre_system);
    let online_cpus = online_cpus(cpu_stats, cpu_usage)?;

    if system_delta <= 0.0 || cpu_delta <= 0.0 {
        return Ok(0.0);
    }

    Ok(round2((cpu_delta / system_delta) * 100.0 * online_cpus))
}

/// Number of CPUs to scale by: the reported `online_cpus` when it is a
/// positive number, else the length of a non-empty `percpu_usage`, else 1.
///
/// A reported `online_cpus` of 0 is treated like an absent one and falls
/// through to the per-CPU array, matching older runtime versions that only
/// filled in `percpu_usage`. Any other non-numeric value is an error.
fn online_cpus(
    cpu_stats: &Map<String, Value>,
    cpu_usage: &Map<String, Value>,
) -> Result<f64, DeriveError> {
    match cpu_stats.get("online_cpus") {
        None | Some(Value::Null) => {}
        Some(Value::Number(n)) => {
            if let Some(n) = n.as_f64()
                && n > 0.0
            {
                return Ok(n);
            }
        }
        Some(_) => return Err(DeriveError::NotANumber("cpu_stats.online_cpus")),
    }
    Ok(match cpu_usage.get("percpu_usage") {
        Some(Value::Array(per_cpu)) if !per_cpu.is_empty() => per_cpu.len() as f64,
        _ => 1.0,
    })
}

/// Memory usage, limit and percentage. The percentage uses a denominator of
/// 1 when the limit is absent or zero.
pub fn memory_usage(stats: &Value) -> MemoryUsage {
    let Some(memory_stats) = stats.get("memory_stats").and_then(Value::as_object) else {
        debug!("memory_stats missing from snapshot");
        return MemoryUsage::zeroed();
    };

    let usage = bytes(memory_stats, "usage");
    let limit = bytes(memory_stats, "limit");
    let denominator = if limit == 0 { 1 } else { limit };

    MemoryUsage {
        usage,
        limit,
        usage_percent: round2(usage as f64 / denominator as f64 * 100.0),
    }
}

/// Network counters, passed through verbatim. `{}` when absent.
pub fn networks(stats: &Value) -> Value {
    stats
        .get("networks")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn object<'a>(
    value: &'a Value,
    key: &'static str,
) -> Result<Option<&'a Map<String, Value>>, DeriveError> {
    match value.get(key) {
        None => {
            debug!(field = key, "missing cpu metric");
            Ok(None)
        }
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(DeriveError::NotAnObject(key)),
    }
}

fn nested<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    path: &'static str,
) -> Result<Option<&'a Map<String, Value>>, DeriveError> {
    match map.get(key) {
        None => {
            debug!(field = path, "missing cpu metric");
            Ok(None)
        }
        Some(Value::Object(inner)) => Ok(Some(inner)),
        Some(_) => Err(DeriveError::NotAnObject(path)),
    }
}

fn counter(
    map: &Map<String, Value>,
    key: &str,
    path: &'static str,
) -> Result<Counter, DeriveError> {
    let Some(value) = map.get(key) else {
        return Ok(Counter::Int(0));
    };
    if let Some(v) = value.as_u64() {
        return Ok(Counter::Int(i128::from(v)));
    }
    if let Some(v) = value.as_i64() {
        return Ok(Counter::Int(i128::from(v)));
    }
    value
        .as_f64()
        .map(Counter::Float)
        .ok_or(DeriveError::NotANumber(path))
}

fn bytes(map: &Map<String, Value>, key: &str) -> u64 {
    match map.get(key) {
        None => 0,
        Some(value) => {
            if let Some(v) = value.as_u64() {
                return v;
            }
            match value.as_f64() {
                Some(v) if v.is_finite() && v >= 0.0 => v as u64,
                _ => {
                    debug!(field = key, value = %value, "ignoring malformed memory metric");
                    0
                }
            }
        }
    }
}
