//! Observability: match-time event telemetry and update-only runtime
//! counters. Core logic must never depend on a sink being installed;
//! events carry no control-flow semantics.

mod events;
mod metrics;

pub use events::{MatchEvent, MatchEventSink};
pub use metrics::{MetricsSnapshot, metrics_reset, metrics_snapshot};

pub(crate) use metrics::record;
