//! Composition of branch winners into one plan

use serde_json::json;
use subplanner::expression::MatchExpression;
use subplanner::index::SortPattern;
use subplanner::query::QueryOptions;
use subplanner::solution::Stage;
use subplanner::subplan::{choose_plan, BranchSource, ExplainPlan, PlanOrigin};

use super::super::fixtures::*;
use super::super::hooks::WithCollectionScan;

#[test]
fn test_rooted_or_of_two_indexed_fields() {
    let h = Harness::new(fields());
    let q = query(MatchExpression::or(vec![
        MatchExpression::eq("field1", json!(5)),
        MatchExpression::eq("field2", json!("x")),
    ]));

    let outcome = choose_plan(&h.env(), &q).unwrap();

    assert_eq!(outcome.origin, PlanOrigin::Subplanned);
    assert_eq!(outcome.branches, vec![BranchSource::Single, BranchSource::Single]);
    assert_eq!(
        outcome.solution.summary(),
        "FETCH(OR(IXSCAN[field1_1],IXSCAN[field2_1]))"
    );
    assert!(matches!(
        outcome.solution.root.children[0].stage,
        Stage::Or { dedup: true }
    ));
    assert!(!outcome.solution.has_blocking_stage);
    assert_eq!(
        executed_ids(&outcome.solution, &h.collection),
        matching_ids(q.filter(), &h.collection)
    );

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.subplans_attempted, 1);
    assert_eq!(snapshot.subplans_composed, 1);
    assert_eq!(snapshot.whole_query_fallbacks, 0);
}

#[test]
fn test_contained_or_plans_each_branch() {
    let h = Harness::new(coordinates());
    let q = query(MatchExpression::and(vec![
        MatchExpression::eq("x", json!(1)),
        MatchExpression::eq("y", json!(2)),
        MatchExpression::or(vec![
            MatchExpression::eq("z", json!(3)),
            MatchExpression::eq("w", json!(4)),
        ]),
    ]));

    let outcome = choose_plan(&h.env(), &q).unwrap();

    assert_eq!(outcome.origin, PlanOrigin::Subplanned);
    assert_eq!(outcome.branches.len(), 2);
    assert_eq!(
        outcome.solution.summary(),
        "OR(FETCH(IXSCAN[w_1]),FETCH(IXSCAN[z_1]))"
    );

    // The shared conjuncts stay behind as the residual of every branch.
    let residual = MatchExpression::and(vec![
        MatchExpression::eq("x", json!(1)),
        MatchExpression::eq("y", json!(2)),
    ]);
    for branch in &outcome.solution.root.children {
        assert_eq!(branch.filter.as_ref(), Some(&residual));
    }

    assert_eq!(
        executed_ids(&outcome.solution, &h.collection),
        matching_ids(q.filter(), &h.collection)
    );
}

#[test]
fn test_contained_or_matches_same_documents() {
    let h = Harness::new(numbers());
    let q = query(MatchExpression::and(vec![
        MatchExpression::eq("d", json!(3)),
        MatchExpression::or(vec![
            MatchExpression::lt("a", json!(30)),
            MatchExpression::eq("c", json!(4)),
        ]),
    ]));

    let outcome = choose_plan(&h.env(), &q).unwrap();

    assert_eq!(outcome.origin, PlanOrigin::Subplanned);
    assert!(outcome.solution.uses_index("a_1"));
    assert!(outcome.solution.uses_index("c_1"));
    let expected = matching_ids(q.filter(), &h.collection);
    assert!(!expected.is_empty());
    assert_eq!(executed_ids(&outcome.solution, &h.collection), expected);
}

#[test]
fn test_ranked_branch_picks_selective_index() {
    let h = Harness::new(numbers());
    let q = query(MatchExpression::or(vec![
        MatchExpression::and(vec![
            MatchExpression::eq("a", json!(2)),
            MatchExpression::eq("b", json!(0)),
        ]),
        MatchExpression::eq("c", json!(3)),
    ]));

    let outcome = choose_plan(&h.env(), &q).unwrap();

    assert_eq!(outcome.origin, PlanOrigin::Subplanned);
    assert_eq!(outcome.branches, vec![BranchSource::Ranked, BranchSource::Single]);
    assert!(outcome.solution.uses_index("a_1"));
    assert!(!outcome.solution.uses_index("b_1"));
    assert!(outcome.solution.uses_index("c_1"));
    assert_eq!(h.metrics.snapshot().branches_ranked, 1);
    assert_eq!(
        executed_ids(&outcome.solution, &h.collection),
        matching_ids(q.filter(), &h.collection)
    );
}

#[test]
fn test_collection_scan_candidate_loses_branch_trial() {
    let h = Harness::new(numbers());
    let enumerator = WithCollectionScan;
    let env = h.env().with_enumerator(&enumerator);
    let q = query(MatchExpression::or(vec![
        MatchExpression::eq("a", json!(7)),
        MatchExpression::eq("c", json!(3)),
    ]));

    let outcome = choose_plan(&env, &q).unwrap();

    assert_eq!(outcome.origin, PlanOrigin::Subplanned);
    assert_eq!(outcome.branches, vec![BranchSource::Ranked, BranchSource::Ranked]);
    assert!(!outcome.solution.is_collection_scan());
}

#[test]
fn test_requested_sort_is_added_above_the_composite() {
    let h = Harness::new(numbers());
    let q = query_with(
        MatchExpression::or(vec![
            MatchExpression::eq("a", json!(7)),
            MatchExpression::eq("c", json!(3)),
        ]),
        QueryOptions::new().with_sort(SortPattern::ascending(["d"])),
    );

    let outcome = choose_plan(&h.env(), &q).unwrap();

    assert_eq!(outcome.origin, PlanOrigin::Subplanned);
    assert!(outcome.solution.has_blocking_stage);
    assert!(outcome.solution.summary().starts_with("SORT("));
}

#[test]
fn test_explain_of_composed_plan() {
    let h = Harness::new(fields());
    let q = query(MatchExpression::or(vec![
        MatchExpression::eq("field1", json!(5)),
        MatchExpression::eq("field2", json!("x")),
    ]));

    let outcome = choose_plan(&h.env(), &q).unwrap();
    let output = ExplainPlan::from_outcome(&outcome).to_string();

    assert!(output.contains("Status: ACCEPTED"));
    assert!(output.contains("Origin: subplanned"));
    assert!(output.contains("#0: single"));
    assert!(output.contains("Plan: FETCH(OR(IXSCAN[field1_1],IXSCAN[field2_1]))"));
    assert!(!output.contains("Fallback:"));
}
