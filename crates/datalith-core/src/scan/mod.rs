//! Module: scan
//! Responsibility: the index-order datom iterator, a key-only scan that
//! reconstructs datoms straight from index keys.
//! Does not own: which range to scan (select/) or match semantics
//! (matcher/).
//! Boundary: no value fetch, ever; every index key already contains
//! E, A, V, T.

use crate::{
    datom::Datom,
    error::CoreError,
    key::{IndexKind, KeyEncoder},
    kv::{KvScan, KvSnapshot},
    obs::record,
};
use std::sync::Arc;

///
/// DatomScan
///
/// Owns the underlying KV snapshot for its lifetime. `close` is
/// idempotent and releases the snapshot; dropping the scan closes it on
/// every exit path. A per-datom decode failure ends the iteration; the
/// latched error is retrievable after `next_datom` returns `None`.
///

pub struct DatomScan {
    index: IndexKind,
    encoder: Arc<dyn KeyEncoder>,
    snapshot: Option<Arc<dyn KvSnapshot>>,
    scan: Option<Box<dyn KvScan>>,
    start: Vec<u8>,
    end: Vec<u8>,
    last_error: Option<CoreError>,
    scanned: u64,
}

impl DatomScan {
    pub(crate) fn open(
        index: IndexKind,
        encoder: Arc<dyn KeyEncoder>,
        snapshot: Arc<dyn KvSnapshot>,
        scan: Box<dyn KvScan>,
        start: Vec<u8>,
        end: Vec<u8>,
    ) -> Self {
        Self {
            index,
            encoder,
            snapshot: Some(snapshot),
            scan: Some(scan),
            start,
            end,
            last_error: None,
            scanned: 0,
        }
    }

    #[must_use]
    pub const fn index(&self) -> IndexKind {
        self.index
    }

    #[must_use]
    pub const fn bounds(&self) -> (&Vec<u8>, &Vec<u8>) {
        (&self.start, &self.end)
    }

    /// Keys inspected so far, decoded or not.
    #[must_use]
    pub const fn datoms_scanned(&self) -> u64 {
        self.scanned
    }

    pub fn next_datom(&mut self) -> Option<Datom> {
        self.next_with_key().map(|(_, datom)| datom)
    }

    /// The raw key travels with the datom so callers can run prefix
    /// checks without re-encoding.
    pub(crate) fn next_with_key(&mut self) -> Option<(Vec<u8>, Datom)> {
        let scan = self.scan.as_mut()?;

        let entry = match scan.next_entry() {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                self.last_error = Some(err.into());
                self.close();
                return None;
            }
        };

        self.scanned += 1;

        let decoded = self
            .encoder
            .decode_key(self.index, &entry.key)
            .map_err(CoreError::from)
            .and_then(|parts| parts.into_datom().map_err(CoreError::from));
        match decoded {
            Ok(datom) => Some((entry.key, datom)),
            Err(err) => {
                self.last_error = Some(err);
                self.close();
                None
            }
        }
    }

    /// Reposition to the first key `>= key` within the original bounds.
    pub fn seek(&mut self, key: &[u8]) -> Result<(), CoreError> {
        let scan = self
            .scan
            .as_mut()
            .ok_or_else(|| CoreError::closed("seek on a closed datom scan"))?;

        scan.seek(key)?;
        Ok(())
    }

    /// Release the scan and its snapshot. Safe to call more than once.
    pub fn close(&mut self) {
        if self.scan.is_none() && self.snapshot.is_none() {
            return;
        }

        self.scan = None;
        self.snapshot = None;
        record::datoms_scanned(self.scanned);
        tracing::trace!(index = %self.index, scanned = self.scanned, "datom scan closed");
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.scan.is_none()
    }

    pub fn take_error(&mut self) -> Option<CoreError> {
        self.last_error.take()
    }
}

impl Drop for DatomScan {
    fn drop(&mut self) {
        self.close();
    }
}

///
/// TESTS
///
