//! Module: select
//! Responsibility: map the bound datom positions of a lookup to the index
//! that serves it and the `[start, end)` range to scan.
//! Does not own: join-strategy choice or post-scan filtering.
//! Boundary: deterministic; the same bound shape always picks the same
//! index. Bound positions the prefix cannot capture are reported back as
//! residuals for the caller to filter per datom.

use crate::{
    datom::{DatomPosition, PositionSet},
    key::{IndexKind, KeyEncoder, KeyPrefix},
};

///
/// IndexSelection
///

#[derive(Clone, Debug)]
pub struct IndexSelection {
    pub index: IndexKind,
    pub start: Vec<u8>,
    pub end: Vec<u8>,
    /// Bound positions captured by the scan prefix. Anything bound but
    /// not in here must be re-checked per datom.
    pub covered: PositionSet,
}

/// Choose the index and scan range for a set of bound positions.
///
/// Ranking rationale: when both E and A are known, AEVT's `A || E` prefix
/// is tighter than EAVT's `E` prefix because an attribute is usually far
/// more selective than a single entity across the database; AVET is the
/// value-lookup index for a known attribute; VAET is the only index with
/// V first, so reverse-reference lookup stays a prefix scan. Bound shapes
/// outside the table collapse to the tightest applicable row, with the
/// rest as residuals.
#[must_use]
pub fn choose_index(encoder: &dyn KeyEncoder, bound: &KeyPrefix<'_>) -> IndexSelection {
    let index = index_for_bound_positions(
        bound.has(DatomPosition::Entity),
        bound.has(DatomPosition::Attribute),
        bound.has(DatomPosition::Value),
        bound.has(DatomPosition::Tx),
    );

    let covered = bound.coverage(index);
    let (start, end) = encoder.encode_prefix_range(index, bound);

    IndexSelection {
        index,
        start,
        end,
        covered,
    }
}

/// The selection table over bound-position flags alone. The matcher also
/// consults it with the join position marked bound to find the index
/// whose order serves a seek or merge discipline.
#[must_use]
pub(crate) const fn index_for_bound_positions(e: bool, a: bool, v: bool, t: bool) -> IndexKind {
    match (e, a, v, t) {
        // E and A known: AEVT, with V extending the prefix when bound.
        (true, true, _, _) => IndexKind::Aevt,
        // E known alone (possibly with V or T residuals).
        (true, false, _, _) => IndexKind::Eavt,
        // A known with a value: equality lookup.
        (false, true, true, _) => IndexKind::Avet,
        // A known alone.
        (false, true, false, _) => IndexKind::Aevt,
        // Reverse reference lookup.
        (false, false, true, _) => IndexKind::Vaet,
        // Time-ordered replay.
        (false, false, false, true) => IndexKind::Taev,
        // Nothing bound: full scan of the EAVT namespace.
        (false, false, false, false) => IndexKind::Eavt,
    }
}

///
/// TESTS
///
