use crate::{
    config::StoreConfig,
    datom::{Datom, Identity, Keyword, TxId},
    kv::DatomStore,
    matcher::{JoinStrategy, Matcher},
    obs::{MatchEvent, MatchEventSink},
    pattern::{Constraints, Pattern, Slot, Symbol},
    relation::{Columns, Relation, RowsRelation, Tuple},
    value::Value,
};
use std::sync::{Arc, Mutex};

///
/// CaptureSink
///

#[derive(Default)]
struct CaptureSink(Mutex<Vec<MatchEvent>>);

impl MatchEventSink for CaptureSink {
    fn on_event(&self, event: &MatchEvent) {
        self.0.lock().expect("sink lock").push(event.clone());
    }
}

impl CaptureSink {
    fn events(&self) -> Vec<MatchEvent> {
        self.0.lock().expect("sink lock").clone()
    }

    fn scan_summaries(&self) -> Vec<(u64, u64)> {
        self.events()
            .iter()
            .filter_map(|event| match event {
                MatchEvent::StorageScan {
                    datoms_scanned,
                    datoms_matched,
                    ..
                } => Some((*datoms_scanned, *datoms_matched)),
                _ => None,
            })
            .collect()
    }
}

fn person_store(entities: usize) -> Arc<DatomStore> {
    let store = DatomStore::in_memory(StoreConfig::default()).expect("store");
    let age = Keyword::intern(":person/age");
    let name = Keyword::intern(":person/name");
    let city = Keyword::intern(":person/city");
    let active = Keyword::intern(":person/active");
    let score = Keyword::intern(":person/score");

    let mut datoms = Vec::new();
    for i in 0..entities {
        let entity = Identity::of_str(&format!("e{i}"));
        let t = TxId::from_sequence(1);
        datoms.push(Datom::new(
            entity.clone(),
            age.clone(),
            Value::Int(i64::try_from(i).expect("small index") + 20),
            t,
        ));
        datoms.push(Datom::new(
            entity.clone(),
            name.clone(),
            Value::Str(format!("name-{i}")),
            t,
        ));
        datoms.push(Datom::new(
            entity.clone(),
            city.clone(),
            Value::Str(format!("city-{}", i % 3)),
            t,
        ));
        datoms.push(Datom::new(entity.clone(), active.clone(), Value::Bool(i % 2 == 0), t));
        datoms.push(Datom::new(
            entity,
            score.clone(),
            Value::Float(i as f64 / 2.0),
            t,
        ));
    }
    store.assert_datoms(&datoms).expect("assert");

    store
}

fn entity_binding(names: &[&str]) -> Relation {
    Relation::rows(RowsRelation::new(
        Columns::from_symbols(vec![Symbol::new("?e")]),
        names
            .iter()
            .map(|name| Tuple::from_cells(vec![Value::Ref(Identity::of_str(name))]))
            .collect(),
    ))
}

fn age_pattern() -> Pattern {
    Pattern::new(
        Slot::Variable(Symbol::new("?e")),
        Slot::Constant(Keyword::intern(":person/age")),
        Slot::Variable(Symbol::new("?age")),
    )
}

fn collect(relation: Relation) -> Vec<Tuple> {
    let mut iter = relation.into_iter();
    let tuples: Vec<Tuple> = iter.by_ref().collect();
    assert!(iter.take_error().is_none(), "iteration latched an error");
    tuples
}

fn sorted_cells(tuples: &[Tuple]) -> Vec<Vec<Value>> {
    let mut rows: Vec<Vec<Value>> = tuples
        .iter()
        .map(|tuple| tuple.iter().cloned().collect())
        .collect();
    rows.sort();
    rows
}

#[test]
fn unbound_scan_with_attribute_constant() {
    let store = person_store(4);
    let matcher = Matcher::new(store);

    let relation = matcher
        .match_pattern(&age_pattern(), vec![], Constraints::none())
        .expect("match");
    assert_eq!(relation.columns().len(), 2);

    let tuples = collect(relation);
    assert_eq!(tuples.len(), 4);
    for tuple in &tuples {
        assert!(matches!(tuple.get(0), Some(Value::Ref(_))));
        assert!(matches!(tuple.get(1), Some(Value::Int(age)) if *age >= 20));
    }
}

#[test]
fn full_variable_pattern_scans_the_whole_store() {
    let store = person_store(3);
    let matcher = Matcher::new(store);

    let pattern = Pattern::new(
        Slot::Variable(Symbol::new("?e")),
        Slot::Variable(Symbol::new("?a")),
        Slot::Variable(Symbol::new("?v")),
    );
    let tuples = collect(
        matcher
            .match_pattern(&pattern, vec![], Constraints::none())
            .expect("match"),
    );

    assert_eq!(tuples.len(), 15);
}

#[test]
fn seek_reuse_visits_a_bounded_number_of_datoms() {
    // 10 entities x 5 attributes = 50 datoms; three bound entities must
    // not cost a 50-datom scan.
    let store = person_store(10);
    let mut matcher = Matcher::new(store);
    let sink = Arc::new(CaptureSink::default());
    matcher.set_event_handler(sink.clone());
    matcher.force_strategy(Some(JoinStrategy::NestedLoop));

    let binding = entity_binding(&["e0", "e5", "e9"]);
    let tuples = collect(
        matcher
            .match_pattern(&age_pattern(), vec![binding], Constraints::none())
            .expect("match"),
    );

    assert_eq!(tuples.len(), 3);

    let summaries = sink.scan_summaries();
    assert_eq!(summaries.len(), 1);
    let (scanned, matched) = summaries[0];
    assert_eq!(matched, 3);
    assert!(
        scanned <= 6,
        "seek reuse regression: scanned {scanned} datoms for 3 bindings"
    );

    assert!(
        sink.events()
            .iter()
            .any(|event| matches!(event, MatchEvent::SeekReuse { bindings: 3, .. }))
    );
}

#[test]
fn raising_k_inl_prefers_nested_loop_for_tiny_binding_sets() {
    let store = DatomStore::in_memory(StoreConfig {
        k_inl: 8,
        ..StoreConfig::default()
    })
    .expect("store");
    let age = Keyword::intern(":person/age");
    let datoms: Vec<Datom> = (0..6)
        .map(|i| {
            Datom::new(
                Identity::of_str(&format!("e{i}")),
                age.clone(),
                Value::Int(20 + i),
                TxId::from_sequence(1),
            )
        })
        .collect();
    store.assert_datoms(&datoms).expect("assert");

    let mut matcher = Matcher::new(store);
    let sink = Arc::new(CaptureSink::default());
    matcher.set_event_handler(sink.clone());

    let tuples = collect(
        matcher
            .match_pattern(&age_pattern(), vec![entity_binding(&["e1", "e3"])], Constraints::none())
            .expect("match"),
    );

    assert_eq!(tuples.len(), 2);
    assert!(sink.events().iter().any(|event| matches!(
        event,
        MatchEvent::JoinStrategy {
            strategy: JoinStrategy::NestedLoop,
            binding_size: 2,
            ..
        }
    )));
}

#[test]
fn dispatch_uses_selectivity_above_the_hash_join_upper_bound() {
    let store = DatomStore::in_memory(StoreConfig {
        hash_join_upper: 2,
        ..StoreConfig::default()
    })
    .expect("store");
    let age = Keyword::intern(":person/age");
    let datoms: Vec<Datom> = (0..6)
        .map(|i| {
            Datom::new(
                Identity::of_str(&format!("e{i}")),
                age.clone(),
                Value::Int(20 + i),
                TxId::from_sequence(1),
            )
        })
        .collect();
    store.assert_datoms(&datoms).expect("assert");

    let mut matcher = Matcher::new(store);
    let sink = Arc::new(CaptureSink::default());
    matcher.set_event_handler(sink.clone());

    // Four bindings over an estimated cardinality of six: selective
    // enough for neither hash-join branch, so merge takes it.
    matcher.set_cardinality_estimator(Arc::new(crate::matcher::FixedCardinality(6)));
    let binding = entity_binding(&["e0", "e2", "e4", "e5"]);
    let tuples = collect(
        matcher
            .match_pattern(&age_pattern(), vec![binding], Constraints::none())
            .expect("match"),
    );

    assert_eq!(tuples.len(), 4);
    assert!(sink.events().iter().any(|event| matches!(
        event,
        MatchEvent::JoinStrategy {
            strategy: JoinStrategy::MergeJoin,
            ..
        }
    )));
}

#[test]
fn unsorted_bindings_still_produce_exact_results_under_nested_loop() {
    let store = person_store(8);
    let mut matcher = Matcher::new(store);
    matcher.force_strategy(Some(JoinStrategy::NestedLoop));

    // Deliberately unsorted entity order, with a duplicate.
    let binding = entity_binding(&["e7", "e1", "e4", "e1"]);
    let tuples = collect(
        matcher
            .match_pattern(&age_pattern(), vec![binding], Constraints::none())
            .expect("match"),
    );

    // e1 appears twice in the binding relation: one tuple per match.
    assert_eq!(tuples.len(), 4);
    let mut ages: Vec<i64> = tuples
        .iter()
        .map(|tuple| match tuple.get(1) {
            Some(Value::Int(age)) => *age,
            other => panic!("expected int age, got {other:?}"),
        })
        .collect();
    ages.sort_unstable();
    assert_eq!(ages, vec![21, 21, 24, 27]);
}

#[test]
fn hash_join_uses_binding_column_not_datom_position() {
    let store = DatomStore::in_memory(StoreConfig::default()).expect("store");
    let ticker = Keyword::intern(":symbol/ticker");
    let price_symbol = Keyword::intern(":price/symbol");
    let aapl = Identity::of_str("AAPL");
    let msft = Identity::of_str("MSFT");

    let mut datoms = vec![Datom::new(
        aapl.clone(),
        ticker.clone(),
        Value::Str("AAPL".into()),
        TxId::from_sequence(1),
    )];
    datoms.push(Datom::new(
        msft.clone(),
        ticker,
        Value::Str("MSFT".into()),
        TxId::from_sequence(1),
    ));
    for i in 0..5 {
        datoms.push(Datom::new(
            Identity::of_str(&format!("price-{i}")),
            price_symbol.clone(),
            Value::Ref(aapl.clone()),
            TxId::from_sequence(2),
        ));
    }
    datoms.push(Datom::new(
        Identity::of_str("price-msft"),
        price_symbol,
        Value::Ref(msft),
        TxId::from_sequence(2),
    ));
    store.assert_datoms(&datoms).expect("assert");

    let matcher = Matcher::new(store);

    // First hop: [?s :symbol/ticker "AAPL"] binds ?s at entity position.
    let first = Pattern::new(
        Slot::Variable(Symbol::new("?s")),
        Slot::Constant(Keyword::intern(":symbol/ticker")),
        Slot::Constant(Value::Str("AAPL".into())),
    );
    let binding = matcher
        .match_pattern(&first, vec![], Constraints::none())
        .expect("first hop");
    let binding = Relation::rows(binding.materialize().expect("materialize"));
    assert_eq!(binding.size(), Some(1));

    // Second hop joins ?s at the datom value position (2) while ?s sits
    // at binding column 0; scrambling those once produced zero tuples.
    let second = Pattern::new(
        Slot::Variable(Symbol::new("?e")),
        Slot::Constant(Keyword::intern(":price/symbol")),
        Slot::Variable(Symbol::new("?s")),
    );
    let mut matcher = matcher;
    matcher.force_strategy(Some(JoinStrategy::HashJoin));
    let tuples = collect(
        matcher
            .match_pattern(&second, vec![binding], Constraints::none())
            .expect("second hop"),
    );

    assert_eq!(tuples.len(), 5);
    for tuple in &tuples {
        assert_eq!(tuple.get(1), Some(&Value::Ref(Identity::of_str("AAPL"))));
    }
}

#[test]
fn join_strategies_agree_on_results() {
    let store = person_store(12);
    let binding_names: Vec<String> = (0..7).map(|i| format!("e{i}")).collect();
    let binding_refs: Vec<&str> = binding_names.iter().map(String::as_str).collect();

    let mut reference: Option<Vec<Vec<Value>>> = None;
    for strategy in [
        JoinStrategy::HashJoin,
        JoinStrategy::NestedLoop,
        JoinStrategy::MergeJoin,
    ] {
        let mut matcher = Matcher::new(Arc::clone(&store));
        matcher.force_strategy(Some(strategy));

        let tuples = collect(
            matcher
                .match_pattern(
                    &age_pattern(),
                    vec![entity_binding(&binding_refs)],
                    Constraints::none(),
                )
                .expect("match"),
        );
        let rows = sorted_cells(&tuples);

        match &reference {
            None => reference = Some(rows),
            Some(expected) => assert_eq!(
                expected, &rows,
                "strategy {strategy} disagrees with the hash-join reference"
            ),
        }
    }
}

#[test]
fn merge_join_handles_duplicate_binding_values() {
    let store = person_store(6);
    let mut matcher = Matcher::new(store);
    matcher.force_strategy(Some(JoinStrategy::MergeJoin));

    let binding = entity_binding(&["e2", "e2", "e3"]);
    let tuples = collect(
        matcher
            .match_pattern(&age_pattern(), vec![binding], Constraints::none())
            .expect("match"),
    );

    // e2 is bound twice: its age tuple is emitted twice, never deduplicated.
    assert_eq!(tuples.len(), 3);
}

#[test]
fn empty_binding_relation_short_circuits_without_a_scan() {
    let store = person_store(3);
    let mut matcher = Matcher::new(store);
    let sink = Arc::new(CaptureSink::default());
    matcher.set_event_handler(sink.clone());

    let relation = matcher
        .match_pattern(&age_pattern(), vec![entity_binding(&[])], Constraints::none())
        .expect("match");

    assert!(relation.is_empty());
    assert!(collect(relation).is_empty());
    assert!(
        sink.events().is_empty(),
        "no scan or strategy event should fire for an empty binding set"
    );
}

#[test]
fn nil_typed_binding_cells_contribute_nothing() {
    let store = person_store(4);
    let mut matcher = Matcher::new(store);
    matcher.force_strategy(Some(JoinStrategy::HashJoin));

    // An Int cell cannot take the entity join position.
    let binding = Relation::rows(RowsRelation::new(
        Columns::from_symbols(vec![Symbol::new("?e")]),
        vec![
            Tuple::from_cells(vec![Value::Int(42)]),
            Tuple::from_cells(vec![Value::Ref(Identity::of_str("e1"))]),
        ],
    ));

    let tuples = collect(
        matcher
            .match_pattern(&age_pattern(), vec![binding], Constraints::none())
            .expect("match"),
    );
    assert_eq!(tuples.len(), 1);
}

#[test]
fn constraints_are_and_reduced_during_scans() {
    let store = person_store(10);
    let matcher = Matcher::new(store);

    let mut constraints = Constraints::single(|datom: &Datom| {
        matches!(datom.v, Value::Int(age) if age >= 23)
    });
    constraints.push(|datom: &Datom| matches!(datom.v, Value::Int(age) if age < 27));

    let tuples = collect(
        matcher
            .match_pattern(&age_pattern(), vec![], constraints)
            .expect("match"),
    );

    // Ages run 20..29; the AND window keeps 23, 24, 25, 26.
    assert_eq!(tuples.len(), 4);
}

#[test]
fn as_of_views_filter_newer_transactions() {
    let store = DatomStore::in_memory(StoreConfig::default()).expect("store");
    let attr = Keyword::intern(":doc/rev");
    let entity = Identity::of_str("doc");
    let datoms: Vec<Datom> = (1..=4)
        .map(|revision| {
            Datom::new(
                entity.clone(),
                attr.clone(),
                Value::Int(revision),
                TxId::from_sequence(u64::try_from(revision).expect("positive")),
            )
        })
        .collect();
    store.assert_datoms(&datoms).expect("assert");

    let matcher = Matcher::new(store);
    let pattern = Pattern::new(
        Slot::Constant(entity),
        Slot::Constant(attr),
        Slot::Variable(Symbol::new("?rev")),
    );

    let latest = collect(
        matcher
            .match_pattern(&pattern, vec![], Constraints::none())
            .expect("match"),
    );
    assert_eq!(latest.len(), 4);

    let as_of_two = collect(
        matcher
            .as_of(2)
            .match_pattern(&pattern, vec![], Constraints::none())
            .expect("match"),
    );
    assert_eq!(as_of_two.len(), 2);

    let as_of_zero = collect(
        matcher
            .as_of(0)
            .match_pattern(&pattern, vec![], Constraints::none())
            .expect("match"),
    );
    assert_eq!(as_of_zero.len(), 4, "t_view 0 means everything is visible");
}

#[test]
fn fully_constant_pattern_is_a_point_lookup() {
    let store = DatomStore::in_memory(StoreConfig::default()).expect("store");
    let entity = Identity::of_str("alice");
    let attr = Keyword::intern(":person/age");
    let datom = Datom::new(entity.clone(), attr.clone(), Value::Int(33), TxId::from_sequence(5));
    store.assert_datoms(&[datom]).expect("assert");

    let matcher = Matcher::new(store);
    let hit = Pattern::with_tx(
        Slot::Constant(entity.clone()),
        Slot::Constant(attr.clone()),
        Slot::Constant(Value::Int(33)),
        Slot::Constant(TxId::from_sequence(5)),
    );
    let relation = matcher
        .match_pattern(&hit, vec![], Constraints::none())
        .expect("match");
    assert_eq!(relation.size(), Some(1));
    assert!(relation.columns().is_empty());

    let miss = Pattern::with_tx(
        Slot::Constant(entity),
        Slot::Constant(attr),
        Slot::Constant(Value::Int(34)),
        Slot::Constant(TxId::from_sequence(5)),
    );
    let relation = matcher
        .match_pattern(&miss, vec![], Constraints::none())
        .expect("match");
    assert!(relation.is_empty());
}

#[test]
fn repeated_variable_requires_equal_fields() {
    let store = DatomStore::in_memory(StoreConfig::default()).expect("store");
    let own = Keyword::intern(":node/self");
    let node = Identity::of_str("node");
    let other = Identity::of_str("other");
    store
        .assert_datoms(&[
            Datom::new(node.clone(), own.clone(), Value::Ref(node), TxId::from_sequence(1)),
            Datom::new(
                Identity::of_str("strange"),
                own,
                Value::Ref(other),
                TxId::from_sequence(1),
            ),
        ])
        .expect("assert");

    let matcher = Matcher::new(store);
    let pattern = Pattern::new(
        Slot::Variable(Symbol::new("?x")),
        Slot::Constant(Keyword::intern(":node/self")),
        Slot::Variable(Symbol::new("?x")),
    );

    let tuples = collect(
        matcher
            .match_pattern(&pattern, vec![], Constraints::none())
            .expect("match"),
    );
    assert_eq!(tuples.len(), 1, "only the self-referential datom matches");
}

#[test]
fn streaming_is_empty_probe_does_not_consume() {
    let store = DatomStore::in_memory(StoreConfig::default()).expect("store");
    store
        .assert_datoms(&[Datom::new(
            Identity::of_str("solo"),
            Keyword::intern(":only/one"),
            Value::Int(1),
            TxId::from_sequence(1),
        )])
        .expect("assert");

    let matcher = Matcher::new(store);
    let pattern = Pattern::new(
        Slot::Variable(Symbol::new("?e")),
        Slot::Constant(Keyword::intern(":only/one")),
        Slot::Variable(Symbol::new("?v")),
    );

    let relation = matcher
        .match_pattern(&pattern, vec![], Constraints::none())
        .expect("match");
    assert!(relation.is_streaming());
    assert!(!relation.is_empty());

    let tuples = collect(relation);
    assert_eq!(tuples.len(), 1, "the emptiness probe must not consume");
}

#[test]
fn tuples_stay_stable_after_the_iterator_advances() {
    let store = person_store(5);
    let matcher = Matcher::new(store);

    let relation = matcher
        .match_pattern(&age_pattern(), vec![], Constraints::none())
        .expect("match");

    let mut iter = relation.into_iter();
    let first = iter.next().expect("at least one tuple");
    let first_copy = first.clone();
    let _rest: Vec<Tuple> = iter.by_ref().collect();

    assert_eq!(first, first_copy, "advancing the iterator mutated a tuple");
}
