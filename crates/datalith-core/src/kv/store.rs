//! Module: kv::store
//! Responsibility: the datom-level adapter over a KV engine: five-index
//! fan-out per datom, scan/get plumbing, and transaction-id headroom.
//! Does not own: join strategy or pattern semantics.
//! Boundary: every assert writes all five index keys in one atomic batch;
//! every retract deletes all five.

use crate::{
    config::{StoreConfig, TxIdSource},
    datom::{Datom, TxId},
    error::CoreError,
    key::{IndexKind, KeyEncoder, encoder_for},
    kv::{KvEngine, MemoryEngine, ScanOptions, SledEngine},
    obs::record,
    scan::DatomScan,
    serialize::datom_payload,
};
use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

// Meta namespace sits below every index namespace in both encodings.
const META_NS: u8 = 0x00;
const TX_HEAD_KEY: [u8; 3] = [META_NS, b't', b'x'];

///
/// DatomStore
///
/// The storage half of the core: a KV engine, the key encoder fixed at
/// construction, and the monotonic transaction-id head.
///

pub struct DatomStore {
    engine: Arc<dyn KvEngine>,
    encoder: Arc<dyn KeyEncoder>,
    config: StoreConfig,
    tx_head: AtomicU64,
}

impl DatomStore {
    /// Open (or create) a durable store at a directory path.
    pub fn open(path: &Path, config: StoreConfig) -> Result<Arc<Self>, CoreError> {
        let engine = SledEngine::open(path, config.cache_capacity_bytes)?;
        Self::with_engine(Arc::new(engine), config)
    }

    /// An ephemeral store over the in-memory reference engine.
    pub fn in_memory(config: StoreConfig) -> Result<Arc<Self>, CoreError> {
        Self::with_engine(Arc::new(MemoryEngine::new()), config)
    }

    pub fn with_engine(
        engine: Arc<dyn KvEngine>,
        config: StoreConfig,
    ) -> Result<Arc<Self>, CoreError> {
        config.validate()?;
        let encoder = encoder_for(config.encoder);

        let tx_head = match engine.get(&TX_HEAD_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    CoreError::decode("transaction head meta key is malformed")
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };

        tracing::debug!(encoder = %config.encoder, tx_head, "datom store opened");

        Ok(Arc::new(Self {
            engine,
            encoder,
            config,
            tx_head: AtomicU64::new(tx_head),
        }))
    }

    #[must_use]
    pub fn encoder(&self) -> Arc<dyn KeyEncoder> {
        Arc::clone(&self.encoder)
    }

    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Assert datoms outside a transaction; callers own the tx ids.
    pub fn assert_datoms(&self, datoms: &[Datom]) -> Result<(), CoreError> {
        self.apply(datoms, &[], None)
    }

    pub fn retract_datoms(&self, datoms: &[Datom]) -> Result<(), CoreError> {
        self.apply(&[], datoms, None)
    }

    /// One atomic batch: retract deletes first, assert writes second, and
    /// optionally the persisted transaction head.
    pub(crate) fn apply(
        &self,
        asserts: &[Datom],
        retracts: &[Datom],
        persist_tx_head: Option<u64>,
    ) -> Result<(), CoreError> {
        let mut writes = Vec::with_capacity(asserts.len() * IndexKind::ALL.len() + 1);
        let mut deletes = Vec::with_capacity(retracts.len() * IndexKind::ALL.len());

        for datom in retracts {
            for index in IndexKind::ALL {
                deletes.push(self.encoder.encode_key(index, datom));
            }
        }

        for datom in asserts {
            let payload = datom_payload(datom)?;
            for index in IndexKind::ALL {
                writes.push((self.encoder.encode_key(index, datom), payload.clone()));
            }
        }

        if let Some(head) = persist_tx_head {
            writes.push((TX_HEAD_KEY.to_vec(), head.to_be_bytes().to_vec()));
        }

        self.engine.batch_write(&writes, &deletes)?;
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self.engine.get(key)?)
    }

    /// Open a scan over `[start, end)` under one index. Key-only mode
    /// skips value fetch entirely; all matcher scans run key-only.
    pub fn scan(
        &self,
        index: IndexKind,
        start: &[u8],
        end: &[u8],
        fetch_values: bool,
    ) -> Result<DatomScan, CoreError> {
        let snapshot = self.engine.snapshot()?;
        let opts = ScanOptions {
            fetch_values,
            prefetch_count: self.config.prefetch_count_key_only,
        };
        let scan = snapshot.clone().scan(start, end, opts)?;

        record::scan_opened();
        Ok(DatomScan::open(
            index,
            Arc::clone(&self.encoder),
            snapshot,
            scan,
            start.to_vec(),
            end.to_vec(),
        ))
    }

    /// Allocate the next transaction id from the configured source.
    /// The returned head is persisted by the caller's commit batch.
    pub(crate) fn allocate_tx_id(&self) -> TxId {
        let head = match self.config.tx_id_source {
            TxIdSource::Counter => self.tx_head.fetch_add(1, Ordering::SeqCst) + 1,
            TxIdSource::WallTimeNanos => {
                let now = chrono::Utc::now()
                    .timestamp_nanos_opt()
                    .map_or(0, i64::cast_unsigned);
                self.tx_head
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                        Some(now.max(prev + 1))
                    })
                    .map_or(now, |prev| now.max(prev + 1))
            }
        };

        TxId::from_sequence(head)
    }

    /// Per-index key counts, scanned key-only.
    pub fn report(&self) -> Result<StoreReport, CoreError> {
        let mut per_index = Vec::with_capacity(IndexKind::ALL.len());
        for index in IndexKind::ALL {
            let (start, end) = self
                .encoder
                .encode_prefix_range(index, &crate::key::KeyPrefix::empty());
            let snapshot = self.engine.snapshot()?;
            let mut scan = snapshot.clone().scan(
                &start,
                &end,
                ScanOptions {
                    fetch_values: false,
                    prefetch_count: self.config.prefetch_count_key_only,
                },
            )?;

            let mut count = 0u64;
            while scan.next_entry()?.is_some() {
                count += 1;
            }
            per_index.push((index, count));
        }

        Ok(StoreReport { per_index })
    }
}

///
/// StoreReport
///

#[derive(Clone, Debug)]
pub struct StoreReport {
    pub per_index: Vec<(IndexKind, u64)>,
}

impl StoreReport {
    #[must_use]
    pub fn count(&self, index: IndexKind) -> u64 {
        self.per_index
            .iter()
            .find(|(kind, _)| *kind == index)
            .map_or(0, |(_, count)| *count)
    }
}

///
/// TESTS
///
