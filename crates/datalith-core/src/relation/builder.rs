//! Module: relation::builder
//! Responsibility: cached tuple construction plans mapping pattern
//! variables to output columns.
//! Does not own: which tuples get emitted (strategies filter first).
//! Boundary: the cache is keyed by `(pattern key, columns)`; the first
//! caller's builder wins and every later caller receives the same one.

use crate::{
    datom::{Datom, DatomPosition},
    error::CoreError,
    pattern::Pattern,
    relation::{Columns, Tuple},
};
use dashmap::DashMap;
use std::sync::Arc;

///
/// TupleBuilder
///
/// An index map from output columns to datom positions. `build` reads the
/// mapped field per column and produces a freshly owned tuple; interned
/// identities and keywords are reused, so the hot path allocates only the
/// tuple shell.
///

#[derive(Debug)]
pub struct TupleBuilder {
    columns: Columns,
    sources: Box<[DatomPosition]>,
}

impl TupleBuilder {
    pub(crate) fn plan(pattern: &Pattern, columns: &Columns) -> Result<Self, CoreError> {
        let sources = columns
            .iter()
            .map(|symbol| {
                pattern.position_of(symbol).ok_or_else(|| {
                    CoreError::config(format!(
                        "column {symbol} is not bound by pattern {pattern}"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_boxed_slice();

        Ok(Self {
            columns: columns.clone(),
            sources,
        })
    }

    #[must_use]
    pub const fn columns(&self) -> &Columns {
        &self.columns
    }

    /// A new independently owned tuple per call; never a reused buffer.
    #[must_use]
    pub fn build(&self, datom: &Datom) -> Tuple {
        let cells = self
            .sources
            .iter()
            .map(|&position| datom.cell(position))
            .collect();

        Tuple::from_cells(cells)
    }
}

///
/// TupleBuilderCache
///

#[derive(Debug, Default)]
pub struct TupleBuilderCache {
    inner: DashMap<(String, Columns), Arc<TupleBuilder>>,
}

impl TupleBuilderCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or lazily create the builder for a pattern/columns pairing.
    /// Compare-and-insert: concurrent callers for the same key all end up
    /// holding the same builder.
    pub fn obtain(
        &self,
        pattern: &Pattern,
        columns: &Columns,
    ) -> Result<Arc<TupleBuilder>, CoreError> {
        let key = (pattern.cache_key(), columns.clone());

        if let Some(existing) = self.inner.get(&key) {
            return Ok(Arc::clone(&existing));
        }

        let built = Arc::new(TupleBuilder::plan(pattern, columns)?);
        let entry = self.inner.entry(key).or_insert(built);

        Ok(Arc::clone(&entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::TupleBuilderCache;
    use crate::{
        datom::{Datom, Identity, Keyword, TxId},
        pattern::{Pattern, Slot, Symbol},
        relation::Columns,
        value::Value,
    };
    use std::sync::Arc;

    fn pattern() -> Pattern {
        Pattern::new(
            Slot::Variable(Symbol::new("?e")),
            Slot::Constant(Keyword::intern(":person/age")),
            Slot::Variable(Symbol::new("?age")),
        )
    }

    fn datom(age: i64) -> Datom {
        Datom::new(
            Identity::of_str("alice"),
            Keyword::intern(":person/age"),
            Value::Int(age),
            TxId::from_sequence(3),
        )
    }

    #[test]
    fn builder_maps_columns_to_datom_positions() {
        let cache = TupleBuilderCache::new();
        let columns = Columns::from_symbols(vec![Symbol::new("?age"), Symbol::new("?e")]);
        let builder = cache.obtain(&pattern(), &columns).expect("builder");

        let tuple = builder.build(&datom(42));
        assert_eq!(tuple.get(0), Some(&Value::Int(42)));
        assert_eq!(
            tuple.get(1),
            Some(&Value::Ref(Identity::of_str("alice")))
        );
    }

    #[test]
    fn cache_returns_the_same_builder_for_the_same_key() {
        let cache = TupleBuilderCache::new();
        let columns = Columns::from_symbols(vec![Symbol::new("?e")]);

        let first = cache.obtain(&pattern(), &columns).expect("builder");
        let second = cache.obtain(&pattern(), &columns).expect("builder");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unknown_column_is_a_construction_error() {
        let cache = TupleBuilderCache::new();
        let columns = Columns::from_symbols(vec![Symbol::new("?missing")]);

        assert!(cache.obtain(&pattern(), &columns).is_err());
    }

    #[test]
    fn built_tuples_are_independent_of_later_builds() {
        let cache = TupleBuilderCache::new();
        let columns = Columns::from_symbols(vec![Symbol::new("?age")]);
        let builder = cache.obtain(&pattern(), &columns).expect("builder");

        let first = builder.build(&datom(1));
        let second = builder.build(&datom(2));

        assert_eq!(first.get(0), Some(&Value::Int(1)));
        assert_eq!(second.get(0), Some(&Value::Int(2)));
    }
}
