//! Module: relation
//! Responsibility: the relation contract handed back to the executor:
//! a columns header plus tuples, either streamed lazily off one scan or
//! materialized as rows.
//! Does not own: how tuples are produced (matcher strategies do that).
//! Boundary: a streaming relation wraps exactly one iterator and may be
//! iterated once; `is_empty` must never consume from it.

mod builder;
mod tuple;

pub use builder::{TupleBuilder, TupleBuilderCache};
pub use tuple::Tuple;

use crate::{error::CoreError, pattern::Symbol};
use std::{fmt, sync::Arc};

///
/// Columns
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Columns(Arc<[Symbol]>);

impl Columns {
    #[must_use]
    pub fn from_symbols(symbols: Vec<Symbol>) -> Self {
        Self(symbols.into())
    }

    #[must_use]
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn index_of(&self, symbol: &Symbol) -> Option<usize> {
        self.0.iter().position(|candidate| candidate == symbol)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Symbol] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.0.iter()
    }
}

impl fmt::Display for Columns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, symbol) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{symbol}")?;
        }
        f.write_str("]")
    }
}

///
/// TupleStream
///
/// Pull-based stream contract for lazy tuple production. Implementations
/// must emit independently owned tuples on every call.
///

pub trait TupleStream: Send {
    fn next_tuple(&mut self) -> Result<Option<Tuple>, CoreError>;

    /// Exact emission count when it is knowable without consuming.
    fn exact_size_hint(&self) -> Option<usize> {
        None
    }
}

///
/// RowsRelation
///

#[derive(Clone, Debug)]
pub struct RowsRelation {
    columns: Columns,
    rows: Vec<Tuple>,
}

impl RowsRelation {
    #[must_use]
    pub const fn new(columns: Columns, rows: Vec<Tuple>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub const fn columns(&self) -> &Columns {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Tuple] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Tuple> {
        self.rows
    }
}

///
/// Relation
///
/// `size` reports `None` for "unknown until consumed", the streaming
/// analogue of a -1 size. Use `materialize` when a size or repeatable
/// iteration is required.
///

pub enum Relation {
    Streaming {
        columns: Columns,
        stream: Box<dyn TupleStream>,
    },
    Rows(RowsRelation),
}

impl Relation {
    #[must_use]
    pub fn streaming(columns: Columns, stream: Box<dyn TupleStream>) -> Self {
        Self::Streaming { columns, stream }
    }

    #[must_use]
    pub const fn rows(rows: RowsRelation) -> Self {
        Self::Rows(rows)
    }

    #[must_use]
    pub const fn empty(columns: Columns) -> Self {
        Self::Rows(RowsRelation {
            columns,
            rows: Vec::new(),
        })
    }

    #[must_use]
    pub const fn columns(&self) -> &Columns {
        match self {
            Self::Streaming { columns, .. } => columns,
            Self::Rows(rows) => rows.columns(),
        }
    }

    #[must_use]
    pub fn size(&self) -> Option<usize> {
        match self {
            Self::Streaming { stream, .. } => stream.exact_size_hint(),
            Self::Rows(rows) => Some(rows.len()),
        }
    }

    /// Non-consuming emptiness probe. On a streaming relation with no
    /// size hint this answers `false` rather than consuming the first
    /// tuple; consuming here would corrupt downstream iteration.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size().is_some_and(|size| size == 0)
    }

    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    /// Drain into rows. Surfaces any error the stream latched mid-way.
    pub fn materialize(self) -> Result<RowsRelation, CoreError> {
        match self {
            Self::Rows(rows) => Ok(rows),
            Self::Streaming {
                columns,
                mut stream,
            } => {
                let mut rows = Vec::new();
                while let Some(tuple) = stream.next_tuple()? {
                    rows.push(tuple);
                }

                Ok(RowsRelation { columns, rows })
            }
        }
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Streaming { columns, .. } => {
                write!(f, "Relation::Streaming(columns={columns})")
            }
            Self::Rows(rows) => write!(
                f,
                "Relation::Rows(columns={}, n={})",
                rows.columns(),
                rows.len()
            ),
        }
    }
}

impl IntoIterator for Relation {
    type Item = Tuple;
    type IntoIter = RelationIter;

    fn into_iter(self) -> RelationIter {
        match self {
            Self::Streaming { columns, stream } => RelationIter {
                columns,
                inner: RelationIterInner::Stream(stream),
                error: None,
            },
            Self::Rows(rows) => RelationIter {
                columns: rows.columns.clone(),
                inner: RelationIterInner::Rows(rows.rows.into_iter()),
                error: None,
            },
        }
    }
}

///
/// RelationIter
///
/// One-shot tuple iterator. A storage or decode failure ends iteration;
/// the latched error is retrievable afterwards.
///

pub struct RelationIter {
    columns: Columns,
    inner: RelationIterInner,
    error: Option<CoreError>,
}

enum RelationIterInner {
    Rows(std::vec::IntoIter<Tuple>),
    Stream(Box<dyn TupleStream>),
}

impl RelationIter {
    #[must_use]
    pub const fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn take_error(&mut self) -> Option<CoreError> {
        self.error.take()
    }
}

impl Iterator for RelationIter {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        if self.error.is_some() {
            return None;
        }

        match &mut self.inner {
            RelationIterInner::Rows(rows) => rows.next(),
            RelationIterInner::Stream(stream) => match stream.next_tuple() {
                Ok(next) => next,
                Err(err) => {
                    self.error = Some(err);
                    None
                }
            },
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{Columns, Relation, RowsRelation, Tuple, TupleStream};
    use crate::{error::CoreError, pattern::Symbol, value::Value};

    struct CountingStream {
        remaining: usize,
    }

    impl TupleStream for CountingStream {
        fn next_tuple(&mut self) -> Result<Option<Tuple>, CoreError> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(Tuple::from_cells(vec![Value::Int(
                self.remaining.try_into().expect("small count"),
            )])))
        }
    }

    fn columns() -> Columns {
        Columns::from_symbols(vec![Symbol::new("?x")])
    }

    #[test]
    fn is_empty_does_not_consume_streaming_relations() {
        let relation = Relation::streaming(columns(), Box::new(CountingStream { remaining: 1 }));

        assert!(!relation.is_empty());
        assert_eq!(relation.size(), None);

        let collected: Vec<Tuple> = relation.into_iter().collect();
        assert_eq!(collected.len(), 1, "the probe must not have eaten the tuple");
    }

    #[test]
    fn rows_relation_reports_exact_size() {
        let relation = Relation::rows(RowsRelation::new(
            columns(),
            vec![Tuple::from_cells(vec![Value::Int(1)])],
        ));

        assert_eq!(relation.size(), Some(1));
        assert!(!relation.is_empty());
        assert!(Relation::empty(columns()).is_empty());
    }

    #[test]
    fn materialize_drains_the_stream_once() {
        let relation = Relation::streaming(columns(), Box::new(CountingStream { remaining: 3 }));
        let rows = relation.materialize().expect("materialize");

        assert_eq!(rows.len(), 3);
        assert_eq!(rows.columns().len(), 1);
    }

    #[test]
    fn column_lookup_finds_positions() {
        let columns = Columns::from_symbols(vec![Symbol::new("?a"), Symbol::new("?b")]);

        assert_eq!(columns.index_of(&Symbol::new("?b")), Some(1));
        assert_eq!(columns.index_of(&Symbol::new("?missing")), None);
    }
}
