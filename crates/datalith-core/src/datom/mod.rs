//! Module: datom
//! Responsibility: the canonical entity/attribute/value/transaction types
//! and their process-wide interning tables.
//! Does not own: byte encodings (value/ and key/ are the codec authorities).
//! Boundary: everything above the KV layer speaks these types.

mod identity;
mod intern;
mod keyword;
mod tx;

pub use identity::{Identity, IdentityLenError};
pub use keyword::Keyword;
pub use tx::{TxId, TxIdLenError};

use crate::value::Value;
use std::fmt;

///
/// Datom
///
/// The 4-tuple `(E, A, V, T)`; the unit of storage. A datom with
/// `T > t_view` is invisible to a view as-of `t_view`.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Datom {
    pub e: Identity,
    pub a: Keyword,
    pub v: Value,
    pub t: TxId,
}

impl Datom {
    #[must_use]
    pub const fn new(e: Identity, a: Keyword, v: Value, t: TxId) -> Self {
        Self { e, a, v, t }
    }

    /// Read the field at a datom position as a tuple cell value.
    ///
    /// E maps to a reference value, A to a keyword value, and T to the
    /// integer head of the transaction id, so that relations produced by
    /// one match can feed the next as binding relations.
    #[must_use]
    pub fn cell(&self, position: DatomPosition) -> Value {
        match position {
            DatomPosition::Entity => Value::Ref(self.e.clone()),
            DatomPosition::Attribute => Value::Keyword(self.a.clone()),
            DatomPosition::Value => self.v.clone(),
            DatomPosition::Tx => Value::Int(self.t.sequence().cast_signed()),
        }
    }
}

impl fmt::Display for Datom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {} {:?} {}]", self.e, self.a, self.v, self.t)
    }
}

///
/// DatomPosition
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum DatomPosition {
    Entity,
    Attribute,
    Value,
    Tx,
}

impl DatomPosition {
    pub const ALL: [Self; 4] = [Self::Entity, Self::Attribute, Self::Value, Self::Tx];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Entity => "e",
            Self::Attribute => "a",
            Self::Value => "v",
            Self::Tx => "t",
        }
    }
}

impl fmt::Display for DatomPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

///
/// PositionSet
///
/// Small set of datom positions, used to record which bound positions an
/// index prefix captured and which remain post-scan filters.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PositionSet(u8);

impl PositionSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn with(self, position: DatomPosition) -> Self {
        Self(self.0 | Self::bit(position))
    }

    #[must_use]
    pub const fn contains(self, position: DatomPosition) -> bool {
        self.0 & Self::bit(position) != 0
    }

    const fn bit(position: DatomPosition) -> u8 {
        match position {
            DatomPosition::Entity => 1,
            DatomPosition::Attribute => 2,
            DatomPosition::Value => 4,
            DatomPosition::Tx => 8,
        }
    }
}

///
/// TESTS
///
