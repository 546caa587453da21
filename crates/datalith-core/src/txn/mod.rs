//! Module: txn
//! Responsibility: mutation discipline. Accumulate asserts and retracts
//! in memory, assign the transaction id at commit, and apply retracts
//! before asserts in one atomic batch.
//! Does not own: tx-id policy beyond monotonicity (the store allocates).
//! Boundary: the commit batch is durable before the best-effort
//! transaction-metadata datom is attempted; metadata failure is logged,
//! never fatal.

use crate::{
    datom::{Datom, Identity, Keyword, TxId},
    error::CoreError,
    kv::DatomStore,
    obs::record,
    value::Value,
};
use std::sync::Arc;

const TX_INSTANT_ATTR: &str = ":db/txInstant";

///
/// Transaction
///
/// Single-owner accumulator. A same-transaction retract-then-assert of
/// one datom lands as an assert, because deletes apply before writes
/// inside the commit batch.
///

pub struct Transaction {
    store: Arc<DatomStore>,
    asserts: Vec<(Identity, Keyword, Value)>,
    retracts: Vec<Datom>,
    committed: bool,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("asserts", &self.asserts)
            .field("retracts", &self.retracts)
            .field("committed", &self.committed)
            .finish()
    }
}

impl Transaction {
    #[must_use]
    pub const fn new(store: Arc<DatomStore>) -> Self {
        Self {
            store,
            asserts: Vec::new(),
            retracts: Vec::new(),
            committed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), CoreError> {
        if self.committed {
            return Err(CoreError::closed("transaction already committed"));
        }
        Ok(())
    }

    /// Stage an assertion; the transaction id is attached at commit.
    pub fn assert(
        &mut self,
        e: Identity,
        a: Keyword,
        v: Value,
    ) -> Result<&mut Self, CoreError> {
        self.ensure_open()?;
        self.asserts.push((e, a, v));
        Ok(self)
    }

    /// Stage a retraction of an existing datom, transaction id included.
    pub fn retract(&mut self, datom: Datom) -> Result<&mut Self, CoreError> {
        self.ensure_open()?;
        self.retracts.push(datom);
        Ok(self)
    }

    #[must_use]
    pub fn pending_asserts(&self) -> usize {
        self.asserts.len()
    }

    #[must_use]
    pub fn pending_retracts(&self) -> usize {
        self.retracts.len()
    }

    /// Assign the transaction id, apply retracts then asserts atomically,
    /// and follow up with the `[tx :db/txInstant <wall-time>]` metadata
    /// datom.
    pub fn commit(&mut self) -> Result<TxId, CoreError> {
        self.ensure_open()?;
        self.committed = true;

        let t = self.store.allocate_tx_id();
        let datoms: Vec<Datom> = self
            .asserts
            .drain(..)
            .map(|(e, a, v)| Datom::new(e, a, v, t))
            .collect();
        let retracts = std::mem::take(&mut self.retracts);

        self.store
            .apply(&datoms, &retracts, Some(t.sequence()))?;
        record::commit(
            datoms.len() as u64,
            retracts.len() as u64,
        );
        tracing::debug!(
            tx = %t,
            asserted = datoms.len(),
            retracted = retracts.len(),
            "transaction committed"
        );

        self.write_tx_metadata(t);
        Ok(t)
    }

    // The commit batch is already durable here; a metadata failure only
    // costs the instant datom.
    fn write_tx_metadata(&self, t: TxId) {
        let wall_ns = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);
        let metadata = Datom::new(
            Identity::intern(*t.as_bytes()),
            Keyword::intern(TX_INSTANT_ATTR),
            Value::Inst(wall_ns),
            t,
        );

        if let Err(err) = self.store.apply(&[metadata], &[], None) {
            tracing::warn!(tx = %t, error = %err, "transaction metadata write failed");
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::Transaction;
    use crate::{
        config::StoreConfig,
        datom::{Datom, Identity, Keyword},
        key::{IndexKind, KeyPrefix},
        kv::DatomStore,
        value::Value,
    };

    fn store() -> std::sync::Arc<DatomStore> {
        DatomStore::in_memory(StoreConfig::default()).expect("store")
    }

    fn scan_count(store: &DatomStore, index: IndexKind, prefix: &KeyPrefix<'_>) -> usize {
        let (start, end) = store.encoder().encode_prefix_range(index, prefix);
        let mut scan = store.scan(index, &start, &end, false).expect("scan");
        let mut count = 0;
        while scan.next_datom().is_some() {
            count += 1;
        }
        count
    }

    #[test]
    fn commit_assigns_one_tx_id_to_every_assert() {
        let store = store();
        let mut txn = Transaction::new(store.clone());
        txn.assert(
            Identity::of_str("alice"),
            Keyword::intern(":person/name"),
            Value::Str("Alice".into()),
        )
        .expect("stage");
        txn.assert(
            Identity::of_str("alice"),
            Keyword::intern(":person/age"),
            Value::Int(33),
        )
        .expect("stage");

        let t = txn.commit().expect("commit");
        assert!(t.sequence() > 0);

        let alice = Identity::of_str("alice");
        let prefix = KeyPrefix {
            e: Some(&alice),
            ..KeyPrefix::empty()
        };
        assert_eq!(scan_count(&store, IndexKind::Eavt, &prefix), 2);
    }

    #[test]
    fn commit_writes_the_tx_instant_metadata_datom() {
        let store = store();
        let mut txn = Transaction::new(store.clone());
        txn.assert(
            Identity::of_str("bob"),
            Keyword::intern(":person/age"),
            Value::Int(4),
        )
        .expect("stage");
        let t = txn.commit().expect("commit");

        let tx_entity = Identity::intern(*t.as_bytes());
        let prefix = KeyPrefix {
            e: Some(&tx_entity),
            ..KeyPrefix::empty()
        };
        let (start, end) = store
            .encoder()
            .encode_prefix_range(IndexKind::Eavt, &prefix);
        let mut scan = store
            .scan(IndexKind::Eavt, &start, &end, false)
            .expect("scan");

        let metadata = scan.next_datom().expect("metadata datom present");
        assert_eq!(metadata.a, Keyword::intern(":db/txInstant"));
        assert!(matches!(metadata.v, Value::Inst(_)));
        assert_eq!(metadata.t, t);
    }

    #[test]
    fn retract_then_assert_of_the_same_datom_lands_as_assert() {
        let store = store();
        let e = Identity::of_str("carol");
        let a = Keyword::intern(":person/age");

        let mut txn = Transaction::new(store.clone());
        txn.assert(e.clone(), a.clone(), Value::Int(30)).expect("stage");
        let first = txn.commit().expect("commit");
        let original = Datom::new(e.clone(), a.clone(), Value::Int(30), first);

        // Same txn: retract the old fact and re-assert the same (E, A, V).
        let mut txn = Transaction::new(store.clone());
        txn.retract(original).expect("stage retract");
        txn.assert(e.clone(), a.clone(), Value::Int(30)).expect("stage assert");
        let second = txn.commit().expect("commit");

        let prefix = KeyPrefix {
            e: Some(&e),
            a: Some(&a),
            ..KeyPrefix::empty()
        };
        let (start, end) = store
            .encoder()
            .encode_prefix_range(IndexKind::Aevt, &prefix);
        let mut scan = store
            .scan(IndexKind::Aevt, &start, &end, false)
            .expect("scan");

        let datom = scan.next_datom().expect("re-asserted datom survives");
        assert_eq!(datom.t, second);
        assert!(scan.next_datom().is_none(), "old revision must be gone");
    }

    #[test]
    fn committed_transactions_reject_reuse() {
        let store = store();
        let mut txn = Transaction::new(store);
        txn.commit().expect("empty commit");

        let err = txn
            .assert(
                Identity::of_str("x"),
                Keyword::intern(":a/b"),
                Value::Int(1),
            )
            .expect_err("assert after commit must fail");
        assert!(err.is_closed());

        let err = txn.commit().expect_err("double commit must fail");
        assert!(err.is_closed());
    }
}
