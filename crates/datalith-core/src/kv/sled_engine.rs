//! Module: kv::sled_engine
//! Responsibility: the durable engine over sled.
//! Does not own: key interpretation or snapshot isolation policy.
//! Boundary: sled batches are atomic; sled iterators are read-committed,
//! not point-in-time, so snapshot leases here guarantee release semantics
//! and bounds, while isolation is the memory engine's department.

use crate::kv::{EngineError, KvEngine, KvEntry, KvScan, KvSnapshot, ScanOptions};
use std::{path::Path, sync::Arc};

fn backend(err: &sled::Error) -> EngineError {
    EngineError::io(format!("sled: {err}"))
}

///
/// SledEngine
///
/// A store is a directory path; the encoder strategy used against it is
/// fixed for its lifetime.
///

pub struct SledEngine {
    db: sled::Db,
}

impl SledEngine {
    pub fn open(path: &Path, cache_capacity_bytes: Option<u64>) -> Result<Self, EngineError> {
        let mut config = sled::Config::new().path(path);
        if let Some(bytes) = cache_capacity_bytes {
            config = config.cache_capacity(bytes);
        }

        let db = config.open().map_err(|err| backend(&err))?;
        Ok(Self { db })
    }
}

impl KvEngine for SledEngine {
    fn batch_write(
        &self,
        writes: &[(Vec<u8>, Vec<u8>)],
        deletes: &[Vec<u8>],
    ) -> Result<(), EngineError> {
        let mut batch = sled::Batch::default();
        // Removes first: sled applies batch operations in insertion order,
        // which is what gives delete-then-write its assert semantics.
        for key in deletes {
            batch.remove(key.as_slice());
        }
        for (key, value) in writes {
            batch.insert(key.as_slice(), value.as_slice());
        }

        self.db.apply_batch(batch).map_err(|err| backend(&err))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self
            .db
            .get(key)
            .map_err(|err| backend(&err))?
            .map(|value| value.to_vec()))
    }

    fn snapshot(&self) -> Result<Arc<dyn KvSnapshot>, EngineError> {
        Ok(Arc::new(SledSnapshot {
            db: self.db.clone(),
        }))
    }
}

///
/// SledSnapshot
///

pub struct SledSnapshot {
    db: sled::Db,
}

impl KvSnapshot for SledSnapshot {
    fn scan(
        self: Arc<Self>,
        start: &[u8],
        end: &[u8],
        opts: ScanOptions,
    ) -> Result<Box<dyn KvScan>, EngineError> {
        Ok(Box::new(SledScan {
            iter: self.db.range(start.to_vec()..end.to_vec()),
            db: self.db.clone(),
            start: start.to_vec(),
            end: end.to_vec(),
            fetch_values: opts.fetch_values,
        }))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self
            .db
            .get(key)
            .map_err(|err| backend(&err))?
            .map(|value| value.to_vec()))
    }
}

///
/// SledScan
///

struct SledScan {
    iter: sled::Iter,
    db: sled::Db,
    start: Vec<u8>,
    end: Vec<u8>,
    fetch_values: bool,
}

impl KvScan for SledScan {
    fn next_entry(&mut self) -> Result<Option<KvEntry>, EngineError> {
        match self.iter.next() {
            None => Ok(None),
            Some(Err(err)) => Err(backend(&err)),
            Some(Ok((key, value))) => Ok(Some(KvEntry {
                key: key.to_vec(),
                value: self.fetch_values.then(|| value.to_vec()),
            })),
        }
    }

    fn seek(&mut self, key: &[u8]) -> Result<(), EngineError> {
        let from = if key < self.start.as_slice() {
            self.start.clone()
        } else {
            key.to_vec()
        };

        self.iter = self.db.range(from..self.end.clone());
        Ok(())
    }
}

///
/// TESTS
///
