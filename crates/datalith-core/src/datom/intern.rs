//! Module: datom::intern
//! Responsibility: process-wide canonicalization tables for identities,
//! keywords, and attribute storage fields.
//! Does not own: key encoding or scan-time decoding policy.
//! Boundary: the only mutable global state in the crate; single-writer,
//! many-reader, idempotent inserts.

use crate::datom::{Identity, Keyword};
use dashmap::DashMap;
use std::sync::OnceLock;

///
/// InternTables
///
/// Lazily initialized on first use; cleared only at shutdown (or between
/// test cases through the reset hook). Readers may observe either the new
/// or the old canonical instance during a racing insert; both compare
/// equal, which is the whole contract.
///

pub(crate) struct InternTables {
    pub(crate) identities: DashMap<[u8; Identity::LEN], Identity>,
    pub(crate) keywords: DashMap<String, Keyword>,
    pub(crate) attr_fields: DashMap<[u8; Keyword::FIELD_LEN], Keyword>,
}

static TABLES: OnceLock<InternTables> = OnceLock::new();

pub(crate) fn interner() -> &'static InternTables {
    TABLES.get_or_init(|| InternTables {
        identities: DashMap::new(),
        keywords: DashMap::new(),
        attr_fields: DashMap::new(),
    })
}

/// Drop every canonical instance. Test isolation hook; never called by
/// production code paths.
#[cfg(test)]
pub(crate) fn reset_interner() {
    let tables = interner();
    tables.identities.clear();
    tables.keywords.clear();
    tables.attr_fields.clear();
}

///
/// TESTS
///
