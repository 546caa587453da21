//! Module: obs::metrics
//! Responsibility: process-wide, update-only runtime counters.
//! Does not own: event routing.
//! Boundary: counters are pressure indicators, not latency measurements;
//! nothing reads them on a hot path.

use crate::matcher::JoinStrategy;
use std::sync::{
    OnceLock,
    atomic::{AtomicU64, Ordering},
};

///
/// CoreMetrics
///

#[derive(Default)]
struct CoreMetrics {
    scans_opened: AtomicU64,
    datoms_scanned: AtomicU64,
    datoms_matched: AtomicU64,
    tuples_emitted: AtomicU64,
    commits: AtomicU64,
    datoms_asserted: AtomicU64,
    datoms_retracted: AtomicU64,

    strategy_unbound: AtomicU64,
    strategy_nested_loop: AtomicU64,
    strategy_hash_join: AtomicU64,
    strategy_merge_join: AtomicU64,
    point_lookups: AtomicU64,
}

static METRICS: OnceLock<CoreMetrics> = OnceLock::new();

fn metrics() -> &'static CoreMetrics {
    METRICS.get_or_init(CoreMetrics::default)
}

pub(crate) mod record {
    use super::{JoinStrategy, Ordering, metrics};

    pub(crate) fn scan_opened() {
        metrics().scans_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn datoms_scanned(count: u64) {
        metrics().datoms_scanned.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn datoms_matched(count: u64) {
        metrics().datoms_matched.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn tuple_emitted() {
        metrics().tuples_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn commit(asserted: u64, retracted: u64) {
        metrics().commits.fetch_add(1, Ordering::Relaxed);
        metrics()
            .datoms_asserted
            .fetch_add(asserted, Ordering::Relaxed);
        metrics()
            .datoms_retracted
            .fetch_add(retracted, Ordering::Relaxed);
    }

    pub(crate) fn strategy(strategy: JoinStrategy) {
        let counter = match strategy {
            JoinStrategy::UnboundScan => &metrics().strategy_unbound,
            JoinStrategy::NestedLoop => &metrics().strategy_nested_loop,
            JoinStrategy::HashJoin => &metrics().strategy_hash_join,
            JoinStrategy::MergeJoin => &metrics().strategy_merge_join,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn point_lookup() {
        metrics().point_lookups.fetch_add(1, Ordering::Relaxed);
    }
}

///
/// MetricsSnapshot
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MetricsSnapshot {
    pub scans_opened: u64,
    pub datoms_scanned: u64,
    pub datoms_matched: u64,
    pub tuples_emitted: u64,
    pub commits: u64,
    pub datoms_asserted: u64,
    pub datoms_retracted: u64,
    pub strategy_unbound: u64,
    pub strategy_nested_loop: u64,
    pub strategy_hash_join: u64,
    pub strategy_merge_join: u64,
    pub point_lookups: u64,
}

#[must_use]
pub fn metrics_snapshot() -> MetricsSnapshot {
    let state = metrics();
    MetricsSnapshot {
        scans_opened: state.scans_opened.load(Ordering::Relaxed),
        datoms_scanned: state.datoms_scanned.load(Ordering::Relaxed),
        datoms_matched: state.datoms_matched.load(Ordering::Relaxed),
        tuples_emitted: state.tuples_emitted.load(Ordering::Relaxed),
        commits: state.commits.load(Ordering::Relaxed),
        datoms_asserted: state.datoms_asserted.load(Ordering::Relaxed),
        datoms_retracted: state.datoms_retracted.load(Ordering::Relaxed),
        strategy_unbound: state.strategy_unbound.load(Ordering::Relaxed),
        strategy_nested_loop: state.strategy_nested_loop.load(Ordering::Relaxed),
        strategy_hash_join: state.strategy_hash_join.load(Ordering::Relaxed),
        strategy_merge_join: state.strategy_merge_join.load(Ordering::Relaxed),
        point_lookups: state.point_lookups.load(Ordering::Relaxed),
    }
}

/// Zero every counter. Test isolation hook.
pub fn metrics_reset() {
    let state = metrics();
    for counter in [
        &state.scans_opened,
        &state.datoms_scanned,
        &state.datoms_matched,
        &state.tuples_emitted,
        &state.commits,
        &state.datoms_asserted,
        &state.datoms_retracted,
        &state.strategy_unbound,
        &state.strategy_nested_loop,
        &state.strategy_hash_join,
        &state.strategy_merge_join,
        &state.point_lookups,
    ] {
        counter.store(0, Ordering::Relaxed);
    }
}

///
/// TESTS
///
