//! Module: matcher::cardinality
//! Responsibility: the pattern-cardinality estimate feeding strategy
//! dispatch.
//! Does not own: the dispatch thresholds themselves.
//! Boundary: estimates are conservative and advisory; a wrong estimate
//! changes the strategy, never the result.

use crate::pattern::Pattern;

///
/// CardinalityEstimator
///
/// Callers with real statistics install their own; the default is a
/// fixed conservative guess.
///

pub trait CardinalityEstimator: Send + Sync {
    fn estimate(&self, pattern: &Pattern) -> u64;
}

///
/// FixedCardinality
///

#[derive(Clone, Copy, Debug)]
pub struct FixedCardinality(pub u64);

impl CardinalityEstimator for FixedCardinality {
    fn estimate(&self, _pattern: &Pattern) -> u64 {
        self.0.max(1)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{CardinalityEstimator, FixedCardinality};
    use crate::pattern::{Pattern, Slot, Symbol};

    #[test]
    fn fixed_estimator_never_reports_zero() {
        let pattern = Pattern::new(
            Slot::Variable(Symbol::new("?e")),
            Slot::Blank,
            Slot::Blank,
        );

        assert_eq!(FixedCardinality(0).estimate(&pattern), 1);
        assert_eq!(FixedCardinality(500).estimate(&pattern), 500);
    }
}
