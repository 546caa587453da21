//! Module: matcher::emit
//! Responsibility: the post-scan obligations every strategy shares:
//! transaction-view filter, residual constant checks, constraint
//! AND-reduction, repeated-variable consistency, and tuple emission with
//! end-of-scan telemetry.
//! Does not own: candidate production (each strategy is its own source).
//! Boundary: a candidate that clears the filter yields one tuple per
//! match, never deduplicated.

use crate::{
    datom::{Datom, DatomPosition, PositionSet},
    error::CoreError,
    key::IndexKind,
    obs::{MatchEvent, MatchEventSink, record},
    pattern::{Constraints, Pattern},
    relation::{Tuple, TupleBuilder, TupleStream},
};
use std::sync::Arc;

///
/// CandidateSource
///
/// Strategy-side iteration: yields datoms that already satisfy the
/// strategy's own join discipline, with the number of binding rows that
/// matched (1 for unbound scans).
///

pub(super) trait CandidateSource: Send {
    fn next_match(&mut self) -> Result<Option<(Datom, usize)>, CoreError>;

    fn datoms_scanned(&self) -> u64;
}

///
/// MatchFilter
///

pub(super) struct MatchFilter {
    pub(super) t_view: u64,
    pub(super) pattern: Pattern,
    pub(super) covered: PositionSet,
    pub(super) constraints: Constraints,
    duplicate_pairs: Vec<(DatomPosition, DatomPosition)>,
}

impl MatchFilter {
    pub(super) fn new(
        t_view: u64,
        pattern: Pattern,
        covered: PositionSet,
        constraints: Constraints,
    ) -> Self {
        let mut duplicate_pairs = Vec::new();
        for (i, &left) in DatomPosition::ALL.iter().enumerate() {
            let Some(symbol) = pattern.variable_at(left) else {
                continue;
            };
            for &right in &DatomPosition::ALL[i + 1..] {
                if pattern.variable_at(right) == Some(symbol) {
                    duplicate_pairs.push((left, right));
                }
            }
        }

        Self {
            t_view,
            pattern,
            covered,
            constraints,
            duplicate_pairs,
        }
    }

    pub(super) fn admit(&self, datom: &Datom) -> bool {
        if self.t_view > 0 && datom.t.sequence() > self.t_view {
            return false;
        }
        if !self.pattern.residual_matches(datom, self.covered) {
            return false;
        }
        for &(left, right) in &self.duplicate_pairs {
            if datom.cell(left) != datom.cell(right) {
                return false;
            }
        }

        self.constraints.admit(datom)
    }
}

///
/// ScanTelemetry
///

pub(super) struct ScanTelemetry {
    sink: Option<Arc<dyn MatchEventSink>>,
    index: IndexKind,
    pattern: String,
    matched: u64,
    reported: bool,
}

impl ScanTelemetry {
    pub(super) fn new(
        sink: Option<Arc<dyn MatchEventSink>>,
        index: IndexKind,
        pattern: String,
    ) -> Self {
        Self {
            sink,
            index,
            pattern,
            matched: 0,
            reported: false,
        }
    }

    fn emitted(&mut self, count: u64) {
        self.matched += count;
    }

    fn finish(&mut self, scanned: u64) {
        if self.reported {
            return;
        }
        self.reported = true;

        record::datoms_matched(self.matched);
        if let Some(sink) = &self.sink {
            sink.on_event(&MatchEvent::StorageScan {
                index: self.index,
                datoms_scanned: scanned,
                datoms_matched: self.matched,
                pattern: self.pattern.clone(),
            });
        }
    }
}

///
/// MatchStream
///
/// The shared strategy wrapper: pulls candidates, applies the filter,
/// builds one freshly owned tuple per match, and reports the scan summary
/// when the stream ends or is dropped early.
///

pub(super) struct MatchStream<S: CandidateSource> {
    source: S,
    filter: MatchFilter,
    builder: Arc<TupleBuilder>,
    telemetry: ScanTelemetry,
    pending: Option<(Tuple, usize)>,
}

impl<S: CandidateSource> MatchStream<S> {
    pub(super) fn new(
        source: S,
        filter: MatchFilter,
        builder: Arc<TupleBuilder>,
        telemetry: ScanTelemetry,
    ) -> Self {
        Self {
            source,
            filter,
            builder,
            telemetry,
            pending: None,
        }
    }
}

impl<S: CandidateSource> TupleStream for MatchStream<S> {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, CoreError> {
        if let Some((tuple, remaining)) = self.pending.take() {
            record::tuple_emitted();
            self.telemetry.emitted(1);
            if remaining > 1 {
                self.pending = Some((tuple.clone(), remaining - 1));
            }
            return Ok(Some(tuple));
        }

        loop {
            let Some((datom, multiplicity)) = self.source.next_match()? else {
                self.telemetry.finish(self.source.datoms_scanned());
                return Ok(None);
            };

            if multiplicity == 0 || !self.filter.admit(&datom) {
                continue;
            }

            let tuple = self.builder.build(&datom);
            record::tuple_emitted();
            self.telemetry.emitted(1);
            if multiplicity > 1 {
                self.pending = Some((tuple.clone(), multiplicity - 1));
            }
            return Ok(Some(tuple));
        }
    }
}

impl<S: CandidateSource> Drop for MatchStream<S> {
    fn drop(&mut self) {
        self.telemetry.finish(self.source.datoms_scanned());
    }
}
