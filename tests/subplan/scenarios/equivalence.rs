//! Generated ORs plan to exactly the matching documents
//!
//! Rooted and contained ORs over mixed-type fields, with and without a
//! requested sort, must return every matching record once.

use proptest::prelude::*;
use serde_json::{json, Value};
use subplanner::catalog::{Collection, RecordId};
use subplanner::expression::MatchExpression;
use subplanner::index::SortPattern;
use subplanner::query::QueryOptions;
use subplanner::ranker::execute_to_completion;
use subplanner::subplan::choose_plan;

use super::super::fixtures::*;

const FIELDS: [&str; 4] = ["p", "q", "r", "s"];

/// 64 documents whose `q` and `r` values change type from record to record;
/// `s` is unindexed
fn mixed() -> Collection {
    let docs = (0..64)
        .map(|i| {
            let q = match i % 4 {
                0 => json!(i % 5),
                1 => json!(if i % 8 == 1 { "x" } else { "y" }),
                2 => json!((i % 5) as f64 + 0.5),
                _ => json!(i % 3 == 0),
            };
            let r = if i % 7 == 0 { json!("z") } else { json!(i % 3) };
            json!({"p": i % 8, "q": q, "r": r, "s": i % 6})
        })
        .collect();
    Collection::with_documents(
        "mixed",
        docs,
        vec![
            index("p_1", &["p"]),
            index("q_1", &["q"]),
            index("r_1", &["r"]),
            index("p_1_r_1", &["p", "r"]),
        ],
    )
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0i64..8).prop_map(|n| json!(n)),
        (0i64..5).prop_map(|n| json!(n as f64 + 0.5)),
        prop_oneof![Just("x"), Just("y"), Just("z")].prop_map(|s| json!(s)),
        any::<bool>().prop_map(|b| json!(b)),
    ]
}

fn arb_leaf() -> impl Strategy<Value = MatchExpression> {
    (0..FIELDS.len(), 0..5usize, arb_value()).prop_map(|(field, op, value)| {
        let path = FIELDS[field];
        match op {
            0 | 1 => MatchExpression::eq(path, value),
            2 => MatchExpression::lt(path, value),
            3 => MatchExpression::gte(path, value),
            _ => MatchExpression::exists(path, true),
        }
    })
}

fn arb_branch() -> impl Strategy<Value = MatchExpression> {
    prop_oneof![
        2 => arb_leaf(),
        1 => prop::collection::vec(arb_leaf(), 2..4).prop_map(MatchExpression::and),
    ]
}

fn arb_or() -> impl Strategy<Value = MatchExpression> {
    prop::collection::vec(arb_branch(), 2..5).prop_map(MatchExpression::or)
}

fn arb_filter() -> impl Strategy<Value = MatchExpression> {
    prop_oneof![
        arb_or(),
        (prop::collection::vec(arb_leaf(), 1..3), arb_or()).prop_map(|(mut leaves, or)| {
            leaves.push(or);
            MatchExpression::and(leaves)
        }),
    ]
}

fn arb_sort() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![Just(None), Just(Some("p")), Just(Some("s"))]
}

/// Plans `filter` against `h` and returns the records in output order
fn produced_ids(
    h: &Harness,
    filter: MatchExpression,
    sort: Option<&str>,
) -> (Vec<RecordId>, MatchExpression) {
    let mut options = QueryOptions::new();
    if let Some(field) = sort {
        options = options.with_sort(SortPattern::ascending([field]));
    }
    let q = query_with(filter, options);

    let outcome = choose_plan(&h.env(), &q).unwrap();
    let produced = execute_to_completion(&outcome.solution.root, &h.collection)
        .unwrap()
        .into_iter()
        .filter_map(|m| m.record_id)
        .collect();
    (produced, q.filter().clone())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_generated_or_matches_filter(filter in arb_filter(), sort in arb_sort()) {
        let h = Harness::new(mixed());
        let (produced, filter) = produced_ids(&h, filter, sort);
        let expected = matching_ids(&filter, &h.collection);

        let mut distinct = produced.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(distinct.len(), produced.len(), "duplicate records");
        prop_assert_eq!(distinct, expected);
    }

    #[test]
    fn test_generated_or_respects_sort(filter in arb_or()) {
        let h = Harness::new(mixed());
        let (produced, _) = produced_ids(&h, filter, Some("p"));

        let keys: Vec<i64> = produced
            .iter()
            .filter_map(|rid| h.collection.record(*rid))
            .filter_map(|doc| doc.get("p").and_then(Value::as_i64))
            .collect();
        prop_assert_eq!(keys.len(), produced.len());
        prop_assert!(keys.windows(2).all(|w| w[0] <= w[1]));
    }
}
