//! Module: pattern
//! Responsibility: the pattern model (a 3- or 4-element description with
//! constant, variable, and blank elements) and the opaque per-datom
//! constraints evaluated during scans.
//! Does not own: index selection or join execution.
//! Boundary: pattern elements are a closed sum type; processing them is
//! exhaustive matching, no runtime type assertions.

mod constraint;

pub use constraint::{Constraints, StorageConstraint};

use crate::{
    datom::{Datom, DatomPosition, Identity, Keyword, PositionSet, TxId},
    key::KeyPrefix,
    value::Value,
};
use derive_more::Display;
use std::{fmt, sync::Arc};

///
/// Symbol
///
/// A query-variable name, cheap to clone and compare.
///

#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{_0}")]
pub struct Symbol(Arc<str>);

impl Symbol {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

///
/// Slot
///
/// One pattern element: a constant to match exactly, a variable to bind,
/// or a blank that matches anything and binds nothing.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Slot<C> {
    Constant(C),
    Variable(Symbol),
    Blank,
}

impl<C> Slot<C> {
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }

    #[must_use]
    pub const fn constant(&self) -> Option<&C> {
        match self {
            Self::Constant(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn variable(&self) -> Option<&Symbol> {
        match self {
            Self::Variable(symbol) => Some(symbol),
            _ => None,
        }
    }
}

impl<C: fmt::Display> fmt::Display for Slot<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "{value}"),
            Self::Variable(symbol) => write!(f, "{symbol}"),
            Self::Blank => f.write_str("_"),
        }
    }
}

///
/// Pattern
///
/// `[E A V]` or `[E A V T]`. Output columns are the pattern's variables in
/// positional order (E, A, V, T), skipping constants and blanks; a symbol
/// repeated across positions binds once, at its first position.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pattern {
    pub e: Slot<Identity>,
    pub a: Slot<Keyword>,
    pub v: Slot<Value>,
    pub t: Slot<TxId>,
}

impl Pattern {
    /// Three-element pattern; the transaction position is blank.
    #[must_use]
    pub const fn new(e: Slot<Identity>, a: Slot<Keyword>, v: Slot<Value>) -> Self {
        Self {
            e,
            a,
            v,
            t: Slot::Blank,
        }
    }

    #[must_use]
    pub const fn with_tx(e: Slot<Identity>, a: Slot<Keyword>, v: Slot<Value>, t: Slot<TxId>) -> Self {
        Self { e, a, v, t }
    }

    #[must_use]
    pub fn variable_at(&self, position: DatomPosition) -> Option<&Symbol> {
        match position {
            DatomPosition::Entity => self.e.variable(),
            DatomPosition::Attribute => self.a.variable(),
            DatomPosition::Value => self.v.variable(),
            DatomPosition::Tx => self.t.variable(),
        }
    }

    #[must_use]
    pub fn is_constant_at(&self, position: DatomPosition) -> bool {
        match position {
            DatomPosition::Entity => self.e.is_constant(),
            DatomPosition::Attribute => self.a.is_constant(),
            DatomPosition::Value => self.v.is_constant(),
            DatomPosition::Tx => self.t.is_constant(),
        }
    }

    /// Variables in positional order, first occurrence wins.
    #[must_use]
    pub fn variables(&self) -> Vec<(DatomPosition, Symbol)> {
        let mut out: Vec<(DatomPosition, Symbol)> = Vec::with_capacity(4);
        for position in DatomPosition::ALL {
            if let Some(symbol) = self.variable_at(position) {
                if out.iter().all(|(_, seen)| seen != symbol) {
                    out.push((position, symbol.clone()));
                }
            }
        }

        out
    }

    /// First position binding `symbol`, if any.
    #[must_use]
    pub fn position_of(&self, symbol: &Symbol) -> Option<DatomPosition> {
        DatomPosition::ALL
            .into_iter()
            .find(|&position| self.variable_at(position) == Some(symbol))
    }

    /// The constant positions as prefix material for index selection.
    #[must_use]
    pub fn constants(&self) -> KeyPrefix<'_> {
        KeyPrefix {
            e: self.e.constant(),
            a: self.a.constant(),
            v: self.v.constant(),
            t: self.t.constant().copied(),
        }
    }

    #[must_use]
    pub fn is_fully_constant(&self) -> bool {
        DatomPosition::ALL
            .into_iter()
            .all(|position| self.is_constant_at(position))
    }

    /// Check the constant positions the scan prefix did not capture.
    #[must_use]
    pub fn residual_matches(&self, datom: &Datom, covered: PositionSet) -> bool {
        if let Some(e) = self.e.constant() {
            if !covered.contains(DatomPosition::Entity) && datom.e != *e {
                return false;
            }
        }
        if let Some(a) = self.a.constant() {
            if !covered.contains(DatomPosition::Attribute) && datom.a != *a {
                return false;
            }
        }
        if let Some(v) = self.v.constant() {
            if !covered.contains(DatomPosition::Value) && datom.v != *v {
                return false;
            }
        }
        if let Some(t) = self.t.constant() {
            if !covered.contains(DatomPosition::Tx) && datom.t != *t {
                return false;
            }
        }

        true
    }

    /// Stable textual form; the tuple-builder cache keys on it.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("[{} {} {} {}]", self.e, self.a, self.v, self.t)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{Pattern, Slot, Symbol};
    use crate::{
        datom::{Datom, DatomPosition, Identity, Keyword, PositionSet, TxId},
        value::Value,
    };

    fn pattern_eav() -> Pattern {
        Pattern::new(
            Slot::Variable(Symbol::new("?e")),
            Slot::Constant(Keyword::intern(":person/age")),
            Slot::Variable(Symbol::new("?age")),
        )
    }

    #[test]
    fn variables_skip_constants_and_blanks_in_positional_order() {
        let vars = pattern_eav().variables();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0], (DatomPosition::Entity, Symbol::new("?e")));
        assert_eq!(vars[1], (DatomPosition::Value, Symbol::new("?age")));
    }

    #[test]
    fn repeated_symbol_binds_at_its_first_position() {
        let pattern = Pattern::new(
            Slot::Variable(Symbol::new("?x")),
            Slot::Blank,
            Slot::Variable(Symbol::new("?x")),
        );

        let vars = pattern.variables();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].0, DatomPosition::Entity);
        assert_eq!(pattern.position_of(&Symbol::new("?x")), Some(DatomPosition::Entity));
    }

    #[test]
    fn constants_surface_as_prefix_material() {
        let pattern = pattern_eav();
        let constants = pattern.constants();

        assert!(constants.e.is_none());
        assert_eq!(constants.a, Some(&Keyword::intern(":person/age")));
        assert!(constants.v.is_none());
        assert!(!pattern.is_fully_constant());
    }

    #[test]
    fn residual_check_skips_covered_positions() {
        let pattern = pattern_eav();
        let hit = Datom::new(
            Identity::of_str("alice"),
            Keyword::intern(":person/age"),
            Value::Int(33),
            TxId::from_sequence(1),
        );
        let miss = Datom::new(
            Identity::of_str("alice"),
            Keyword::intern(":person/name"),
            Value::Str("Alice".into()),
            TxId::from_sequence(1),
        );

        let uncovered = PositionSet::empty();
        assert!(pattern.residual_matches(&hit, uncovered));
        assert!(!pattern.residual_matches(&miss, uncovered));

        // Once the prefix covers A, the mismatch is no longer re-checked.
        let covered = PositionSet::empty().with(DatomPosition::Attribute);
        assert!(pattern.residual_matches(&miss, covered));
    }

    #[test]
    fn cache_key_is_stable_and_readable() {
        let key = pattern_eav().cache_key();
        assert_eq!(key, "[?e :person/age ?age _]");
    }
}
