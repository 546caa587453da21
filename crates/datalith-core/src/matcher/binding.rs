//! Module: matcher::binding
//! Responsibility: binding-relation selection and projection, and the
//! join-key material derived from binding cells.
//! Does not own: strategy choice.
//! Boundary: the matcher consumes at most one binding relation (the one
//! sharing the most pattern variables, ties broken by input order), and
//! only its pattern-variable columns survive projection.

use crate::{
    datom::{Datom, DatomPosition, Identity, Keyword, TxId},
    error::CoreError,
    key::KeyPrefix,
    pattern::Pattern,
    relation::{Columns, Relation, Tuple},
    value::{Value, encode_value},
};

///
/// ProjectedBinding
///
/// The chosen binding relation, materialized and cut down to the pattern
/// variables. `positions` pairs each shared variable's datom position
/// with its column index in the *projected* rows; strategies must index
/// rows by that column, never by the datom position.
///

pub(super) struct ProjectedBinding {
    pub(super) columns: Columns,
    pub(super) rows: Vec<Tuple>,
    pub(super) positions: Vec<(DatomPosition, usize)>,
}

impl ProjectedBinding {
    /// The join position: the shared variable at the earliest datom
    /// position (E before A before V before T). Everything else becomes a
    /// per-datom verification.
    pub(super) fn join(&self) -> (DatomPosition, usize) {
        self.positions
            .iter()
            .copied()
            .min_by_key(|&(position, _)| position)
            .expect("a projected binding always shares at least one variable")
    }

    pub(super) fn verify_positions(&self) -> Vec<(DatomPosition, usize)> {
        let join = self.join();
        self.positions
            .iter()
            .copied()
            .filter(|&pair| pair != join)
            .collect()
    }

    /// Does `row` agree with `datom` at every shared non-join position?
    pub(super) fn row_matches(
        row: &Tuple,
        verify: &[(DatomPosition, usize)],
        datom: &Datom,
    ) -> bool {
        verify.iter().all(|&(position, column)| {
            row.get(column)
                .is_some_and(|cell| *cell == datom.cell(position))
        })
    }
}

/// Pick and project the best binding relation. `None` when no relation
/// shares a variable with the pattern (including when `bindings` is
/// empty); these are the unbound-scan cases.
pub(super) fn choose_binding(
    pattern: &Pattern,
    bindings: Vec<Relation>,
) -> Result<Option<ProjectedBinding>, CoreError> {
    let variables = pattern.variables();

    let mut best: Option<(usize, usize)> = None; // (input index, shared count)
    for (index, relation) in bindings.iter().enumerate() {
        let shared = variables
            .iter()
            .filter(|(_, symbol)| relation.columns().index_of(symbol).is_some())
            .count();
        if shared > 0 && best.is_none_or(|(_, count)| shared > count) {
            best = Some((index, shared));
        }
    }

    let Some((chosen, _)) = best else {
        return Ok(None);
    };

    let relation = bindings.into_iter().nth(chosen).expect("index from enumerate");
    let source_columns = relation.columns().clone();

    // Shared variables in pattern positional order.
    let shared: Vec<(DatomPosition, crate::pattern::Symbol, usize)> = variables
        .into_iter()
        .filter_map(|(position, symbol)| {
            source_columns
                .index_of(&symbol)
                .map(|column| (position, symbol, column))
        })
        .collect();

    let columns = Columns::from_symbols(shared.iter().map(|(_, symbol, _)| symbol.clone()).collect());
    let positions = shared
        .iter()
        .enumerate()
        .map(|(projected, &(position, _, _))| (position, projected))
        .collect();

    let rows = relation
        .materialize()?
        .into_rows()
        .into_iter()
        .map(|row| {
            Tuple::from_cells(
                shared
                    .iter()
                    .map(|&(_, _, column)| {
                        row.get(column)
                            .cloned()
                            .expect("projected column exists in the source relation")
                    })
                    .collect(),
            )
        })
        .collect();

    Ok(Some(ProjectedBinding {
        columns,
        rows,
        positions,
    }))
}

///
/// JoinConstant
///
/// A binding cell coerced to its datom-position type. Cells that cannot
/// take the position's type (the nil-at-join-position case and type
/// mismatches) produce `None`, and that row contributes no output.
///

#[derive(Clone, Debug)]
pub(super) enum JoinConstant {
    Entity(Identity),
    Attribute(Keyword),
    Value(Value),
    Tx(TxId),
}

impl JoinConstant {
    pub(super) fn from_cell(cell: &Value, position: DatomPosition) -> Option<Self> {
        match position {
            DatomPosition::Entity => match cell {
                Value::Ref(id) => Some(Self::Entity(id.clone())),
                _ => None,
            },
            DatomPosition::Attribute => match cell {
                Value::Keyword(keyword) => Some(Self::Attribute(keyword.clone())),
                _ => None,
            },
            DatomPosition::Value => Some(Self::Value(cell.clone())),
            DatomPosition::Tx => match cell {
                Value::Int(sequence) if *sequence >= 0 => {
                    Some(Self::Tx(TxId::from_sequence(sequence.cast_unsigned())))
                }
                _ => None,
            },
        }
    }

    /// Fill this constant into the join position on top of the pattern's
    /// constants, producing seek-prefix material.
    pub(super) fn fill<'a>(&'a self, mut base: KeyPrefix<'a>) -> KeyPrefix<'a> {
        match self {
            Self::Entity(id) => base.e = Some(id),
            Self::Attribute(keyword) => base.a = Some(keyword),
            Self::Value(value) => base.v = Some(value),
            Self::Tx(tx) => base.t = Some(*tx),
        }

        base
    }

    /// Index-component byte form at the join position: the same bytes
    /// the chosen index orders by.
    #[must_use]
    pub(super) fn component_bytes(&self) -> Vec<u8> {
        match self {
            Self::Entity(id) => id.as_bytes().to_vec(),
            Self::Attribute(keyword) => keyword.field().to_vec(),
            Self::Value(value) => encode_value(value),
            Self::Tx(tx) => tx.as_bytes().to_vec(),
        }
    }
}

/// The datom-side counterpart of [`JoinConstant::component_bytes`].
#[must_use]
pub(super) fn datom_component_bytes(datom: &Datom, position: DatomPosition) -> Vec<u8> {
    match position {
        DatomPosition::Entity => datom.e.as_bytes().to_vec(),
        DatomPosition::Attribute => datom.a.field().to_vec(),
        DatomPosition::Value => encode_value(&datom.v),
        DatomPosition::Tx => datom.t.as_bytes().to_vec(),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{JoinConstant, choose_binding, datom_component_bytes};
    use crate::{
        datom::{Datom, DatomPosition, Identity, Keyword, TxId},
        pattern::{Pattern, Slot, Symbol},
        relation::{Columns, Relation, RowsRelation, Tuple},
        value::Value,
    };

    fn pattern() -> Pattern {
        Pattern::new(
            Slot::Variable(Symbol::new("?e")),
            Slot::Constant(Keyword::intern(":person/age")),
            Slot::Variable(Symbol::new("?age")),
        )
    }

    fn rows_relation(columns: Vec<&str>, rows: Vec<Vec<Value>>) -> Relation {
        Relation::rows(RowsRelation::new(
            Columns::from_symbols(columns.into_iter().map(Symbol::new).collect()),
            rows.into_iter().map(Tuple::from_cells).collect(),
        ))
    }

    #[test]
    fn picks_the_relation_sharing_the_most_variables() {
        let narrow = rows_relation(vec!["?e"], vec![vec![Value::Ref(Identity::of_str("a"))]]);
        let wide = rows_relation(
            vec!["?age", "?e"],
            vec![vec![Value::Int(1), Value::Ref(Identity::of_str("a"))]],
        );

        let chosen = choose_binding(&pattern(), vec![narrow, wide])
            .expect("selection should succeed")
            .expect("a relation shares variables");

        assert_eq!(chosen.columns.len(), 2);
        // Projection reorders into pattern positional order: ?e then ?age.
        assert_eq!(chosen.columns.as_slice()[0], Symbol::new("?e"));
        assert_eq!(chosen.columns.as_slice()[1], Symbol::new("?age"));
        assert_eq!(chosen.join().0, DatomPosition::Entity);
    }

    #[test]
    fn ties_break_by_input_order() {
        let first = rows_relation(vec!["?e"], vec![vec![Value::Ref(Identity::of_str("a"))]]);
        let second = rows_relation(vec!["?e"], vec![vec![Value::Ref(Identity::of_str("b"))]]);

        let chosen = choose_binding(&pattern(), vec![first, second])
            .expect("selection should succeed")
            .expect("shares a variable");

        assert_eq!(chosen.rows.len(), 1);
        assert_eq!(
            chosen.rows[0].get(0),
            Some(&Value::Ref(Identity::of_str("a")))
        );
    }

    #[test]
    fn unrelated_relations_yield_no_choice() {
        let unrelated = rows_relation(vec!["?other"], vec![vec![Value::Int(1)]]);

        assert!(
            choose_binding(&pattern(), vec![unrelated])
                .expect("selection should succeed")
                .is_none()
        );
        assert!(
            choose_binding(&pattern(), vec![])
                .expect("selection should succeed")
                .is_none()
        );
    }

    #[test]
    fn join_constant_rejects_type_mismatches() {
        assert!(JoinConstant::from_cell(&Value::Int(1), DatomPosition::Entity).is_none());
        assert!(JoinConstant::from_cell(&Value::Int(-1), DatomPosition::Tx).is_none());
        assert!(JoinConstant::from_cell(&Value::Str("x".into()), DatomPosition::Value).is_some());
    }

    #[test]
    fn component_bytes_agree_between_binding_and_datom_sides() {
        let alice = Identity::of_str("alice");
        let datom = Datom::new(
            alice.clone(),
            Keyword::intern(":person/age"),
            Value::Int(3),
            TxId::from_sequence(9),
        );

        let constant = JoinConstant::from_cell(&Value::Ref(alice), DatomPosition::Entity)
            .expect("ref coerces to entity");
        assert_eq!(
            constant.component_bytes(),
            datom_component_bytes(&datom, DatomPosition::Entity)
        );

        let constant = JoinConstant::from_cell(&Value::Int(3), DatomPosition::Value)
            .expect("value position accepts anything");
        assert_eq!(
            constant.component_bytes(),
            datom_component_bytes(&datom, DatomPosition::Value)
        );
    }
}
