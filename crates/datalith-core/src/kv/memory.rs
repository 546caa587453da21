//! Module: kv::memory
//! Responsibility: the in-memory reference engine.
//! Does not own: durability.
//! Boundary: generational copy-on-write. Writers swap a fresh tree in,
//! snapshots pin the generation they were opened against, so readers get
//! real point-in-time isolation.

use crate::kv::{EngineError, KvEngine, KvEntry, KvScan, KvSnapshot, ScanOptions};
use std::{
    collections::{BTreeMap, VecDeque},
    ops::Bound,
    sync::{Arc, RwLock},
};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

///
/// MemoryEngine
///

#[derive(Default)]
pub struct MemoryEngine {
    current: RwLock<Arc<Tree>>,
}

impl MemoryEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn generation(&self) -> Result<Arc<Tree>, EngineError> {
        self.current
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| EngineError::Snapshot {
                message: "memory engine lock poisoned".to_string(),
            })
    }
}

impl KvEngine for MemoryEngine {
    fn batch_write(
        &self,
        writes: &[(Vec<u8>, Vec<u8>)],
        deletes: &[Vec<u8>],
    ) -> Result<(), EngineError> {
        let mut guard = self.current.write().map_err(|_| EngineError::Io {
            message: "memory engine lock poisoned".to_string(),
        })?;

        let mut next = Tree::clone(&guard);
        for key in deletes {
            next.remove(key);
        }
        for (key, value) in writes {
            next.insert(key.clone(), value.clone());
        }

        *guard = Arc::new(next);
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self.generation()?.get(key).cloned())
    }

    fn snapshot(&self) -> Result<Arc<dyn KvSnapshot>, EngineError> {
        Ok(Arc::new(MemorySnapshot {
            view: self.generation()?,
        }))
    }
}

///
/// MemorySnapshot
///

pub struct MemorySnapshot {
    view: Arc<Tree>,
}

impl KvSnapshot for MemorySnapshot {
    fn scan(
        self: Arc<Self>,
        start: &[u8],
        end: &[u8],
        opts: ScanOptions,
    ) -> Result<Box<dyn KvScan>, EngineError> {
        Ok(Box::new(MemoryScan {
            view: Arc::clone(&self.view),
            lower: Bound::Included(start.to_vec()),
            start: start.to_vec(),
            end: end.to_vec(),
            opts,
            buffer: VecDeque::new(),
            exhausted: false,
        }))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self.view.get(key).cloned())
    }
}

///
/// MemoryScan
///
/// Pulls keys out of the pinned generation in prefetch-sized batches.
///

struct MemoryScan {
    view: Arc<Tree>,
    lower: Bound<Vec<u8>>,
    start: Vec<u8>,
    end: Vec<u8>,
    opts: ScanOptions,
    buffer: VecDeque<KvEntry>,
    exhausted: bool,
}

impl MemoryScan {
    fn fill(&mut self) {
        let range = (self.lower.clone(), Bound::Excluded(self.end.clone()));
        let batch = self.opts.prefetch_count.max(1);

        let mut fetched = 0;
        let mut last_key: Option<Vec<u8>> = None;
        for (key, value) in self.view.range::<Vec<u8>, _>(range).take(batch) {
            self.buffer.push_back(KvEntry {
                key: key.clone(),
                value: self.opts.fetch_values.then(|| value.clone()),
            });
            last_key = Some(key.clone());
            fetched += 1;
        }

        if fetched < batch {
            self.exhausted = true;
        } else if let Some(key) = last_key {
            self.lower = Bound::Excluded(key);
        }
    }
}

impl KvScan for MemoryScan {
    fn next_entry(&mut self) -> Result<Option<KvEntry>, EngineError> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill();
        }

        Ok(self.buffer.pop_front())
    }

    fn seek(&mut self, key: &[u8]) -> Result<(), EngineError> {
        let target = if key < self.start.as_slice() {
            self.start.clone()
        } else {
            key.to_vec()
        };

        self.lower = Bound::Included(target);
        self.buffer.clear();
        self.exhausted = false;
        Ok(())
    }
}

///
/// TESTS
///
