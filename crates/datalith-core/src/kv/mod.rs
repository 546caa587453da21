//! Module: kv
//! Responsibility: the narrow ordered-KV boundary (atomic batch write,
//! half-open ascending scan, point get, scoped snapshot) and the datom
//! store that fans each datom out across the five indices.
//! Does not own: key interpretation; that is the encoder's job.
//! Boundary: engines never look inside keys.

mod memory;
mod sled_engine;
mod store;

pub use memory::MemoryEngine;
pub use sled_engine::SledEngine;
pub use store::{DatomStore, StoreReport};

use crate::error::CoreError;
use std::sync::Arc;
use thiserror::Error as ThisError;

///
/// EngineError
///

#[derive(Debug, ThisError)]
pub enum EngineError {
    #[error("kv engine i/o failure: {message}")]
    Io { message: String },

    #[error("kv engine corruption: {message}")]
    Corruption { message: String },

    #[error("kv snapshot failure: {message}")]
    Snapshot { message: String },
}

impl EngineError {
    pub(crate) fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

impl From<EngineError> for CoreError {
    fn from(err: EngineError) -> Self {
        Self::storage(err.to_string())
    }
}

///
/// ScanOptions
///

#[derive(Clone, Copy, Debug)]
pub struct ScanOptions {
    /// When false the scan must expose keys only and skip value fetch
    /// wherever the engine can.
    pub fetch_values: bool,
    pub prefetch_count: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            fetch_values: false,
            prefetch_count: 10_000,
        }
    }
}

///
/// KvEntry
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KvEntry {
    pub key: Vec<u8>,
    /// Present only when the scan was opened with `fetch_values`.
    pub value: Option<Vec<u8>>,
}

///
/// KvEngine
///
/// Write contract: within one batch, deletes apply before writes, so a
/// batch deleting and re-writing the same key lands as a write. The batch
/// is atomic as a whole.
///

pub trait KvEngine: Send + Sync {
    fn batch_write(
        &self,
        writes: &[(Vec<u8>, Vec<u8>)],
        deletes: &[Vec<u8>],
    ) -> Result<(), EngineError>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError>;

    /// Acquire a read snapshot. The snapshot is released when the last
    /// holder drops it, on every exit path.
    fn snapshot(&self) -> Result<Arc<dyn KvSnapshot>, EngineError>;
}

///
/// KvSnapshot
///

pub trait KvSnapshot: Send + Sync {
    /// Keys in `[start, end)` in ascending byte order.
    fn scan(
        self: Arc<Self>,
        start: &[u8],
        end: &[u8],
        opts: ScanOptions,
    ) -> Result<Box<dyn KvScan>, EngineError>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError>;
}

///
/// KvScan
///

pub trait KvScan: Send {
    fn next_entry(&mut self) -> Result<Option<KvEntry>, EngineError>;

    /// Reposition to the first key `>= key` within the scan's original
    /// bounds.
    fn seek(&mut self, key: &[u8]) -> Result<(), EngineError>;
}
