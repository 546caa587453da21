//! Module: obs::events
//! Responsibility: the strategy/selection event taxonomy and its sink
//! boundary.
//! Does not own: metrics counters.
//! Boundary: sinks are optional, injected by the caller, and must not
//! affect execution semantics.

use crate::{datom::DatomPosition, key::IndexKind, matcher::JoinStrategy};

///
/// MatchEvent
///

#[derive(Clone, Debug)]
pub enum MatchEvent {
    /// Emitted before a pattern executes, once the strategy is final.
    JoinStrategy {
        strategy: JoinStrategy,
        index: IndexKind,
        position: Option<DatomPosition>,
        binding_size: usize,
    },

    /// Emitted when a nested-loop scan is reused across sorted bindings.
    SeekReuse {
        index: IndexKind,
        bindings: usize,
    },

    IndexSelection {
        index: IndexKind,
        pattern: String,
    },

    /// Emitted when a scan-backed relation is exhausted or dropped.
    StorageScan {
        index: IndexKind,
        datoms_scanned: u64,
        datoms_matched: u64,
        pattern: String,
    },
}

impl MatchEvent {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::JoinStrategy { .. } => "storage/join-strategy",
            Self::SeekReuse { .. } => "storage/reuse-strategy",
            Self::IndexSelection { .. } => "pattern/index-selection",
            Self::StorageScan { .. } => "pattern/storage-scan",
        }
    }
}

///
/// MatchEventSink
///

pub trait MatchEventSink: Send + Sync {
    fn on_event(&self, event: &MatchEvent);
}

impl<F> MatchEventSink for F
where
    F: Fn(&MatchEvent) + Send + Sync,
{
    fn on_event(&self, event: &MatchEvent) {
        self(event);
    }
}

///
/// TESTS
///
