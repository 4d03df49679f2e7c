//! Telemetry record written once per log interval.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::engine::LinkStatus;
use crate::sim::BenchCounters;

/// One JSONL line: a timestamped link snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    /// RFC 3339 UTC timestamp with millisecond precision
    pub timestamp: String,
    pub link: LinkStatus,
    /// Air counters, present when running against the bench transmitter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bench: Option<BenchCounters>,
}

impl TelemetryRecord {
    /// Stamps `link` with the current time.
    #[must_use]
    pub fn now(link: LinkStatus) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            link,
            bench: None,
        }
    }

    #[must_use]
    pub fn with_bench(mut self, counters: BenchCounters) -> Self {
        self.bench = Some(counters);
        self
    }
}
