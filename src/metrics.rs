//! Metrics Module
//!
//! Fire-and-forget metric records for external observability. The cache
//! core is a producer only; sinks decide what to do with records.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

// == Metric Kind ==
/// Type of metric record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Timer,
}

// == Metric Record ==
/// A single timestamped observation tagged with operation and outcome.
#[derive(Debug, Clone, Serialize)]
pub struct MetricRecord {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub unit: &'static str,
    pub tags: HashMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl MetricRecord {
    /// Builds a timer record for an operation outcome.
    pub fn timer(name: impl Into<String>, value_ms: f64, operation: &str, outcome: &str) -> Self {
        let mut tags = HashMap::new();
        tags.insert("operation".to_string(), operation.to_string());
        tags.insert("outcome".to_string(), outcome.to_string());
        Self {
            name: name.into(),
            kind: MetricKind::Timer,
            value: value_ms,
            unit: "ms",
            tags,
            recorded_at: Utc::now(),
        }
    }
}

// == Metrics Sink ==
/// Collector for metric records.
///
/// Implementations must not block or fail; recording is fire-and-forget
/// from the caller's point of view.
pub trait MetricsSink: Send + Sync {
    fn record(&self, record: MetricRecord);
}

// == Tracing Sink ==
/// Default sink: emits each record as a debug-level log line.
#[derive(Debug, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&self, record: MetricRecord) {
        debug!(
            metric = %record.name,
            value = record.value,
            unit = record.unit,
            operation = record.tags.get("operation").map(String::as_str).unwrap_or(""),
            outcome = record.tags.get("outcome").map(String::as_str).unwrap_or(""),
            "metric recorded"
        );
    }
}

// == Noop Sink ==
/// Sink used when monitoring is disabled.
#[derive(Debug, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record(&self, _record: MetricRecord) {}
}

// == Memory Sink ==
/// Accumulating sink for tests and in-process inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<MetricRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<MetricRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl MetricsSink for MemorySink {
    fn record(&self, record: MetricRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_record_tags() {
        let record = MetricRecord::timer("cache_operation", 12.5, "get", "hit");
        assert_eq!(record.kind, MetricKind::Timer);
        assert_eq!(record.unit, "ms");
        assert_eq!(record.tags.get("operation").unwrap(), "get");
        assert_eq!(record.tags.get("outcome").unwrap(), "hit");
    }

    #[test]
    fn test_memory_sink_accumulates() {
        let sink = MemorySink::new();
        sink.record(MetricRecord::timer("op", 1.0, "get", "hit"));
        sink.record(MetricRecord::timer("op", 2.0, "set", "success"));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].value, 2.0);
    }

    #[test]
    fn test_record_serializes() {
        let record = MetricRecord::timer("op", 3.0, "delete", "success");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"timer\""));
        assert!(json.contains("\"ms\""));
    }
}
