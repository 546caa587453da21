//! Module: pattern::constraint
//! Responsibility: opaque per-datom predicates pushed down into scans.
//! Does not own: range narrowing; constraints only filter, they never
//! tighten the scanned range.
//! Boundary: constraints are ANDed; an empty set admits everything.

use crate::datom::Datom;
use derive_more::Deref;
use std::{fmt, sync::Arc};

///
/// StorageConstraint
///

pub trait StorageConstraint: Send + Sync {
    fn evaluate(&self, datom: &Datom) -> bool;
}

impl<F> StorageConstraint for F
where
    F: Fn(&Datom) -> bool + Send + Sync,
{
    fn evaluate(&self, datom: &Datom) -> bool {
        self(datom)
    }
}

///
/// Constraints
///

#[derive(Clone, Default, Deref)]
pub struct Constraints(Vec<Arc<dyn StorageConstraint>>);

impl Constraints {
    #[must_use]
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn single(constraint: impl StorageConstraint + 'static) -> Self {
        Self(vec![Arc::new(constraint)])
    }

    pub fn push(&mut self, constraint: impl StorageConstraint + 'static) {
        self.0.push(Arc::new(constraint));
    }

    /// AND-reduction over every constraint.
    #[must_use]
    pub fn admit(&self, datom: &Datom) -> bool {
        self.0.iter().all(|constraint| constraint.evaluate(datom))
    }
}

impl fmt::Debug for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constraints(n={})", self.0.len())
    }
}

///
/// TESTS
///
