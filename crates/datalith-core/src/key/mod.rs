//! Module: key
//! Responsibility: composite index-key construction and decomposition for
//! the five datom indices; prefix and range construction.
//! Does not own: value payload encoding (value::codec) or scan policy.
//! Boundary: this module is the storage-key authority. Within one index,
//! encoded-byte order must exactly match the logical composite order.

mod binary;
mod printable;
mod range;


pub use binary::BinaryKeyEncoder;
pub use printable::PrintableKeyEncoder;
pub(crate) use range::prefix_upper_bound;

use crate::{
    config::EncoderKind,
    datom::{Datom, DatomPosition, Identity, Keyword, PositionSet, TxId},
    error::CoreError,
    value::{Value, ValueDecodeError, decode_value},
};
use std::{fmt, sync::Arc};
use thiserror::Error as ThisError;

pub(crate) const ENTITY_LEN: usize = Identity::LEN;
pub(crate) const ATTR_LEN: usize = Keyword::FIELD_LEN;
pub(crate) const TX_LEN: usize = TxId::LEN;

// Smallest possible value component: a one-byte tag plus a one-byte payload.
pub(crate) const MIN_VALUE_LEN: usize = 2;

///
/// IndexKind
///
/// One of the five orderings over the set of datoms, each persisted in its
/// own keyspace behind a single-byte namespace tag.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum IndexKind {
    Eavt,
    Aevt,
    Avet,
    Vaet,
    Taev,
}

impl IndexKind {
    pub const ALL: [Self; 5] = [Self::Eavt, Self::Aevt, Self::Avet, Self::Vaet, Self::Taev];

    /// Namespace tag for the compact binary encoding.
    #[must_use]
    pub(crate) const fn tag(self) -> u8 {
        match self {
            Self::Eavt => 0x10,
            Self::Aevt => 0x11,
            Self::Avet => 0x12,
            Self::Vaet => 0x13,
            Self::Taev => 0x14,
        }
    }

    /// Namespace tag for the printable encoding.
    #[must_use]
    pub(crate) const fn printable_tag(self) -> u8 {
        match self {
            Self::Eavt => b'E',
            Self::Aevt => b'A',
            Self::Avet => b'V',
            Self::Vaet => b'R',
            Self::Taev => b'T',
        }
    }

    /// Composite component order of this index.
    #[must_use]
    pub const fn composite(self) -> [DatomPosition; 4] {
        use DatomPosition::{Attribute, Entity, Tx, Value};
        match self {
            Self::Eavt => [Entity, Attribute, Value, Tx],
            Self::Aevt => [Attribute, Entity, Value, Tx],
            Self::Avet => [Attribute, Value, Entity, Tx],
            Self::Vaet => [Value, Attribute, Entity, Tx],
            Self::Taev => [Tx, Attribute, Entity, Value],
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Eavt => "eavt",
            Self::Aevt => "aevt",
            Self::Avet => "avet",
            Self::Vaet => "vaet",
            Self::Taev => "taev",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

///
/// KeyParts
///
/// Raw component bytes of a decoded key, in canonical E, A, V, T order
/// regardless of the index layout. `v` is always `[type_tag][payload]`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyParts {
    pub e: [u8; ENTITY_LEN],
    pub a: [u8; ATTR_LEN],
    pub v: Vec<u8>,
    pub t: [u8; TX_LEN],
}

impl KeyParts {
    /// Reconstruct the datom through the interning tables. The attribute
    /// field resolves via the shared attribute-string cache, so repeated
    /// scans of the same attribute do not re-allocate its name.
    pub fn into_datom(self) -> Result<Datom, KeyDecodeError> {
        let (value, consumed) = decode_value(&self.v)?;
        if consumed != self.v.len() {
            return Err(KeyDecodeError::TrailingValueBytes {
                extra: self.v.len() - consumed,
            });
        }

        Ok(Datom::new(
            Identity::intern(self.e),
            Keyword::from_field(&self.a),
            value,
            TxId::from_bytes(self.t),
        ))
    }
}

///
/// KeyPrefix
///
/// Bound components available for prefix construction, in canonical
/// positions. Encoders consume the longest leading run the index layout
/// admits; components after a gap are simply absent from the prefix.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct KeyPrefix<'a> {
    pub e: Option<&'a Identity>,
    pub a: Option<&'a Keyword>,
    pub v: Option<&'a Value>,
    pub t: Option<TxId>,
}

impl KeyPrefix<'_> {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            e: None,
            a: None,
            v: None,
            t: None,
        }
    }

    #[must_use]
    pub const fn has(&self, position: DatomPosition) -> bool {
        match position {
            DatomPosition::Entity => self.e.is_some(),
            DatomPosition::Attribute => self.a.is_some(),
            DatomPosition::Value => self.v.is_some(),
            DatomPosition::Tx => self.t.is_some(),
        }
    }

    /// The set of positions a prefix over `index` would actually capture:
    /// the longest leading run of present components in composite order.
    #[must_use]
    pub fn coverage(&self, index: IndexKind) -> PositionSet {
        let mut covered = PositionSet::empty();
        for position in index.composite() {
            if !self.has(position) {
                break;
            }
            covered = covered.with(position);
        }

        covered
    }
}

///
/// KeyDecodeError
///

#[derive(Debug, ThisError)]
pub enum KeyDecodeError {
    #[error("key namespace tag {got:#04x} does not match index {index}")]
    WrongNamespace { index: &'static str, got: u8 },

    #[error("key too short for index {index}: {len} bytes")]
    TooShort { index: &'static str, len: usize },

    #[error("value component carries {extra} undecoded trailing bytes")]
    TrailingValueBytes { extra: usize },

    #[error("printable key malformed: {message}")]
    Malformed { message: &'static str },

    #[error(transparent)]
    Value(#[from] ValueDecodeError),
}

impl From<KeyDecodeError> for CoreError {
    fn from(err: KeyDecodeError) -> Self {
        Self::decode(format!("index key is not decodable: {err}"))
    }
}

///
/// KeyEncoder
///
/// One of two interchangeable key-encoding strategies. Both must yield
/// identical decode results and identical relative key order within an
/// index; they differ only in the bytes on disk. The strategy is fixed
/// for the lifetime of a store.
///

pub trait KeyEncoder: Send + Sync {
    fn kind(&self) -> EncoderKind;

    /// Full composite key for one datom under one index.
    fn encode_key(&self, index: IndexKind, datom: &Datom) -> Vec<u8>;

    /// Split a key back into raw component bytes in canonical order.
    fn decode_key(&self, index: IndexKind, bytes: &[u8]) -> Result<KeyParts, KeyDecodeError>;

    /// Prefix key over the longest leading run of present components.
    fn encode_prefix(&self, index: IndexKind, prefix: &KeyPrefix<'_>) -> Vec<u8>;

    /// Half-open `[start, end)` range covering exactly the keys extending
    /// the given prefix.
    fn encode_prefix_range(&self, index: IndexKind, prefix: &KeyPrefix<'_>) -> (Vec<u8>, Vec<u8>) {
        let start = self.encode_prefix(index, prefix);
        let end = prefix_upper_bound(&start);

        (start, end)
    }
}

#[must_use]
pub fn encoder_for(kind: EncoderKind) -> Arc<dyn KeyEncoder> {
    match kind {
        EncoderKind::Binary => Arc::new(BinaryKeyEncoder),
        EncoderKind::Printable => Arc::new(PrintableKeyEncoder),
    }
}
