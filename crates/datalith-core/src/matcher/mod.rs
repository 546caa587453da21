//! Module: matcher
//! Responsibility: translate `(pattern, bindings, constraints)` into a
//! streaming relation via one of the join strategies.
//! Does not own: key layout, index storage, or relation consumption.
//! Boundary: query-level mismatches are empty relations; only underlying
//! KV failures surface as errors. The executor consumes the returned
//! relation without knowing which strategy produced it.

mod binding;
mod cardinality;
mod emit;
mod hash_join;
mod merge_join;
mod nested_loop;
mod unbound;

#[cfg(test)]
mod tests;

pub use cardinality::{CardinalityEstimator, FixedCardinality};

use crate::{
    datom::{Datom, DatomPosition, PositionSet},
    error::CoreError,
    key::{IndexKind, prefix_upper_bound},
    kv::DatomStore,
    obs::{MatchEvent, MatchEventSink, record},
    pattern::{Constraints, Pattern},
    relation::{Columns, Relation, RowsRelation, TupleBuilder, TupleBuilderCache},
    select::{choose_index, index_for_bound_positions},
};
use binding::{ProjectedBinding, choose_binding};
use emit::{MatchFilter, MatchStream, ScanTelemetry};
use hash_join::HashJoinSource;
use merge_join::MergeJoinSource;
use nested_loop::{BindingRun, NestedLoopSource, binding_runs};
use std::{fmt, sync::Arc};
use unbound::UnboundSource;

///
/// JoinStrategy
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinStrategy {
    UnboundScan,
    NestedLoop,
    HashJoin,
    MergeJoin,
}

impl JoinStrategy {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::UnboundScan => "unbound-scan",
            Self::NestedLoop => "index-nested-loop",
            Self::HashJoin => "hash-join",
            Self::MergeJoin => "merge-join",
        }
    }
}

impl fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

///
/// Matcher
///
/// Shares the store, the tuple-builder cache, and the interning tables
/// with every view derived from it; `as_of` copies only the view filter.
/// The matcher holds the store, never the reverse.
///

pub struct Matcher {
    store: Arc<DatomStore>,
    builders: Arc<TupleBuilderCache>,
    estimator: Arc<dyn CardinalityEstimator>,
    sink: Option<Arc<dyn MatchEventSink>>,
    t_view: u64,
    force: Option<JoinStrategy>,
}

impl Matcher {
    #[must_use]
    pub fn new(store: Arc<DatomStore>) -> Self {
        let default_cardinality = store.config().default_cardinality;
        Self {
            store,
            builders: Arc::new(TupleBuilderCache::new()),
            estimator: Arc::new(FixedCardinality(default_cardinality)),
            sink: None,
            t_view: 0,
            force: None,
        }
    }

    /// An independent view as-of `t_view`; datoms with a transaction id
    /// strictly greater are invisible. `0` means the latest view.
    #[must_use]
    pub fn as_of(&self, t_view: u64) -> Self {
        Self {
            store: Arc::clone(&self.store),
            builders: Arc::clone(&self.builders),
            estimator: Arc::clone(&self.estimator),
            sink: self.sink.clone(),
            t_view,
            force: self.force,
        }
    }

    #[must_use]
    pub const fn t_view(&self) -> u64 {
        self.t_view
    }

    #[must_use]
    pub fn store(&self) -> Arc<DatomStore> {
        Arc::clone(&self.store)
    }

    pub fn set_event_handler(&mut self, sink: Arc<dyn MatchEventSink>) {
        self.sink = Some(sink);
    }

    pub fn set_cardinality_estimator(&mut self, estimator: Arc<dyn CardinalityEstimator>) {
        self.estimator = estimator;
    }

    /// Pin the join strategy; a testing hook. Seek and merge disciplines
    /// still fall back to hash-join when the chosen index cannot order
    /// the join position.
    pub fn force_strategy(&mut self, strategy: Option<JoinStrategy>) {
        self.force = strategy;
    }

    fn emit(&self, event: &MatchEvent) {
        if let Some(sink) = &self.sink {
            sink.on_event(event);
        }
    }

    /// Match a pattern against the store, constrained by the best of the
    /// supplied binding relations. Columns of the result are the
    /// pattern's variables in positional order.
    pub fn match_pattern(
        &self,
        pattern: &Pattern,
        bindings: Vec<Relation>,
        constraints: Constraints,
    ) -> Result<Relation, CoreError> {
        let columns = Columns::from_symbols(
            pattern
                .variables()
                .into_iter()
                .map(|(_, symbol)| symbol)
                .collect(),
        );
        let builder = self.builders.obtain(pattern, &columns)?;

        if pattern.is_fully_constant() {
            return self.point_lookup(pattern, &columns, &builder, &constraints);
        }

        let Some(projected) = choose_binding(pattern, bindings)? else {
            return self.unbound_scan(pattern, columns, builder, constraints);
        };
        if projected.rows.is_empty() {
            return Ok(Relation::empty(columns));
        }

        let (join_position, join_column) = projected.join();
        let binding_size = projected.rows.len();
        let config = self.store.config();

        let mut strategy = self.force.unwrap_or_else(|| {
            let cardinality = self.estimator.estimate(pattern).max(1);
            #[expect(clippy::cast_precision_loss)]
            let selectivity = binding_size as f64 / cardinality as f64;

            if binding_size <= config.k_inl {
                JoinStrategy::NestedLoop
            } else if binding_size <= config.hash_join_upper
                || selectivity < config.selectivity_merge_threshold
            {
                JoinStrategy::HashJoin
            } else {
                JoinStrategy::MergeJoin
            }
        });

        if strategy == JoinStrategy::UnboundScan {
            return self.unbound_scan(pattern, columns, builder, constraints);
        }

        // Seek reuse and merge need the join position ordered right after
        // the constant prefix on the chosen index.
        let ordered = ordered_join_index(pattern, join_position);
        if matches!(strategy, JoinStrategy::NestedLoop | JoinStrategy::MergeJoin)
            && ordered.is_none()
        {
            strategy = JoinStrategy::HashJoin;
        }

        tracing::debug!(
            pattern = %pattern,
            strategy = %strategy,
            position = %join_position,
            binding_size,
            "join strategy selected"
        );
        record::strategy(strategy);

        match strategy {
            JoinStrategy::NestedLoop => {
                let ordered = ordered.expect("guard above replaced unordered nested-loop");
                self.nested_loop(
                    pattern,
                    columns,
                    builder,
                    constraints,
                    &projected,
                    join_column,
                    join_position,
                    &ordered,
                )
            }
            JoinStrategy::MergeJoin => {
                let ordered = ordered.expect("guard above replaced unordered merge");
                self.merge_join(
                    pattern,
                    columns,
                    builder,
                    constraints,
                    &projected,
                    join_column,
                    join_position,
                    &ordered,
                )
            }
            JoinStrategy::HashJoin => self.hash_join(
                pattern,
                columns,
                builder,
                constraints,
                &projected,
                join_column,
                join_position,
            ),
            JoinStrategy::UnboundScan => unreachable!("handled before dispatch"),
        }
    }

    /// Every position constant: a single-datom point lookup via the exact
    /// AEVT key.
    fn point_lookup(
        &self,
        pattern: &Pattern,
        columns: &Columns,
        builder: &Arc<TupleBuilder>,
        constraints: &Constraints,
    ) -> Result<Relation, CoreError> {
        let constants = pattern.constants();
        let datom = Datom::new(
            constants.e.expect("fully constant pattern").clone(),
            constants.a.expect("fully constant pattern").clone(),
            constants.v.expect("fully constant pattern").clone(),
            constants.t.expect("fully constant pattern"),
        );

        let key = self.store.encoder().encode_key(IndexKind::Aevt, &datom);
        record::point_lookup();
        self.emit(&MatchEvent::IndexSelection {
            index: IndexKind::Aevt,
            pattern: pattern.cache_key(),
        });

        let present = self.store.get(&key)?.is_some();
        let visible = present
            && (self.t_view == 0 || datom.t.sequence() <= self.t_view)
            && constraints.admit(&datom);

        let rows = if visible {
            vec![builder.build(&datom)]
        } else {
            Vec::new()
        };

        Ok(Relation::rows(RowsRelation::new(columns.clone(), rows)))
    }

    fn unbound_scan(
        &self,
        pattern: &Pattern,
        columns: Columns,
        builder: Arc<TupleBuilder>,
        constraints: Constraints,
    ) -> Result<Relation, CoreError> {
        let encoder = self.store.encoder();
        let selection = choose_index(encoder.as_ref(), &pattern.constants());

        record::strategy(JoinStrategy::UnboundScan);
        self.emit(&MatchEvent::IndexSelection {
            index: selection.index,
            pattern: pattern.cache_key(),
        });
        self.emit(&MatchEvent::JoinStrategy {
            strategy: JoinStrategy::UnboundScan,
            index: selection.index,
            position: None,
            binding_size: 0,
        });

        let scan = self
            .store
            .scan(selection.index, &selection.start, &selection.end, false)?;

        let filter = MatchFilter::new(
            self.t_view,
            pattern.clone(),
            selection.covered,
            constraints,
        );
        let telemetry =
            ScanTelemetry::new(self.sink.clone(), selection.index, pattern.cache_key());

        Ok(Relation::streaming(
            columns,
            Box::new(MatchStream::new(
                UnboundSource::new(scan),
                filter,
                builder,
                telemetry,
            )),
        ))
    }

    #[expect(clippy::too_many_arguments)]
    fn nested_loop(
        &self,
        pattern: &Pattern,
        columns: Columns,
        builder: Arc<TupleBuilder>,
        constraints: Constraints,
        projected: &ProjectedBinding,
        join_column: usize,
        join_position: DatomPosition,
        ordered: &OrderedJoin,
    ) -> Result<Relation, CoreError> {
        let encoder = self.store.encoder();
        let runs: Vec<BindingRun> =
            binding_runs(projected, join_column, join_position, |constant| {
                encoder.encode_prefix(ordered.index, &constant.fill(pattern.constants()))
            });
        if runs.is_empty() {
            return Ok(Relation::empty(columns));
        }

        self.emit(&MatchEvent::IndexSelection {
            index: ordered.index,
            pattern: pattern.cache_key(),
        });
        self.emit(&MatchEvent::JoinStrategy {
            strategy: JoinStrategy::NestedLoop,
            index: ordered.index,
            position: Some(join_position),
            binding_size: projected.rows.len(),
        });
        self.emit(&MatchEvent::SeekReuse {
            index: ordered.index,
            bindings: runs.len(),
        });

        // One scan over the union range, reused across sorted bindings.
        let start = runs
            .first()
            .expect("runs checked non-empty")
            .prefix
            .clone();
        let end = prefix_upper_bound(&runs.last().expect("runs checked non-empty").prefix);
        let scan = self.store.scan(ordered.index, &start, &end, false)?;

        let filter = MatchFilter::new(
            self.t_view,
            pattern.clone(),
            ordered.seek_covered,
            constraints,
        );
        let telemetry = ScanTelemetry::new(self.sink.clone(), ordered.index, pattern.cache_key());

        Ok(Relation::streaming(
            columns,
            Box::new(MatchStream::new(
                NestedLoopSource::new(scan, runs, projected.verify_positions()),
                filter,
                builder,
                telemetry,
            )),
        ))
    }

    fn hash_join(
        &self,
        pattern: &Pattern,
        columns: Columns,
        builder: Arc<TupleBuilder>,
        constraints: Constraints,
        projected: &ProjectedBinding,
        join_column: usize,
        join_position: DatomPosition,
    ) -> Result<Relation, CoreError> {
        let encoder = self.store.encoder();
        let selection = choose_index(encoder.as_ref(), &pattern.constants());

        self.emit(&MatchEvent::IndexSelection {
            index: selection.index,
            pattern: pattern.cache_key(),
        });
        self.emit(&MatchEvent::JoinStrategy {
            strategy: JoinStrategy::HashJoin,
            index: selection.index,
            position: Some(join_position),
            binding_size: projected.rows.len(),
        });

        let scan = self
            .store
            .scan(selection.index, &selection.start, &selection.end, false)?;

        let source = HashJoinSource::new(
            scan,
            projected,
            join_column,
            join_position,
            projected.verify_positions(),
        );
        let filter = MatchFilter::new(
            self.t_view,
            pattern.clone(),
            selection.covered,
            constraints,
        );
        let telemetry =
            ScanTelemetry::new(self.sink.clone(), selection.index, pattern.cache_key());

        Ok(Relation::streaming(
            columns,
            Box::new(MatchStream::new(source, filter, builder, telemetry)),
        ))
    }

    #[expect(clippy::too_many_arguments)]
    fn merge_join(
        &self,
        pattern: &Pattern,
        columns: Columns,
        builder: Arc<TupleBuilder>,
        constraints: Constraints,
        projected: &ProjectedBinding,
        join_column: usize,
        join_position: DatomPosition,
        ordered: &OrderedJoin,
    ) -> Result<Relation, CoreError> {
        let encoder = self.store.encoder();
        let runs: Vec<BindingRun> = binding_runs(projected, join_column, join_position, |constant| {
            constant.component_bytes()
        });
        if runs.is_empty() {
            return Ok(Relation::empty(columns));
        }

        self.emit(&MatchEvent::IndexSelection {
            index: ordered.index,
            pattern: pattern.cache_key(),
        });
        self.emit(&MatchEvent::JoinStrategy {
            strategy: JoinStrategy::MergeJoin,
            index: ordered.index,
            position: Some(join_position),
            binding_size: projected.rows.len(),
        });

        let (start, end) = encoder.encode_prefix_range(ordered.index, &pattern.constants());
        let scan = self.store.scan(ordered.index, &start, &end, false)?;

        let filter = MatchFilter::new(
            self.t_view,
            pattern.clone(),
            ordered.leading_covered,
            constraints,
        );
        let telemetry = ScanTelemetry::new(self.sink.clone(), ordered.index, pattern.cache_key());

        Ok(Relation::streaming(
            columns,
            Box::new(MatchStream::new(
                MergeJoinSource::new(
                    scan,
                    runs,
                    join_position,
                    projected.verify_positions(),
                ),
                filter,
                builder,
                telemetry,
            )),
        ))
    }
}

///
/// OrderedJoin
///
/// The index whose composite puts the join position immediately after a
/// run of pattern constants, the precondition for seek reuse and merge.
///

struct OrderedJoin {
    index: IndexKind,
    /// Constants captured ahead of the join position (the scan range).
    leading_covered: PositionSet,
    /// Everything a per-binding seek prefix captures: leading constants,
    /// the join position, and any constants contiguous after it.
    seek_covered: PositionSet,
}

fn ordered_join_index(pattern: &Pattern, join_position: DatomPosition) -> Option<OrderedJoin> {
    let bound_at = |position: DatomPosition| {
        position == join_position || pattern.is_constant_at(position)
    };
    let index = index_for_bound_positions(
        bound_at(DatomPosition::Entity),
        bound_at(DatomPosition::Attribute),
        bound_at(DatomPosition::Value),
        bound_at(DatomPosition::Tx),
    );

    let composite = index.composite();
    let mut leading_covered = PositionSet::empty();
    let mut slot = 0;
    for (i, &position) in composite.iter().enumerate() {
        if position == join_position {
            slot = i;
            break;
        }
        if !pattern.is_constant_at(position) {
            return None;
        }
        leading_covered = leading_covered.with(position);
    }

    let mut seek_covered = leading_covered.with(join_position);
    for &position in &composite[slot + 1..] {
        if !pattern.is_constant_at(position) {
            break;
        }
        seek_covered = seek_covered.with(position);
    }

    Some(OrderedJoin {
        index,
        leading_covered,
        seek_covered,
    })
}
