//! Core runtime for Datalith: the datom model, five-index key layout,
//! ordered-KV adapters, key-only scans, and the pattern-match join core
//! that hands streaming relations to the executor above.

// public exports are one module level down
pub mod config;
pub mod datom;
pub mod error;
pub mod key;
pub mod kv;
pub mod matcher;
pub mod obs;
pub mod pattern;
pub mod relation;
pub mod scan;
pub mod select;
pub mod serialize;
pub mod txn;
pub mod value;


///
/// CONSTANTS
///

/// Number of indices every datom is written under.
pub const INDEX_COUNT: usize = 5;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No engines, encoders, scans, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        datom::{Datom, DatomPosition, Identity, Keyword, TxId},
        key::IndexKind,
        matcher::Matcher,
        pattern::{Constraints, Pattern, Slot, Symbol},
        relation::{Relation, Tuple},
        value::Value,
    };
}
