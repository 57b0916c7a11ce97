//! Branch winners reused through the plan cache

use serde_json::json;
use subplanner::cache::{PlanCacheKey, SolutionType};
use subplanner::expression::MatchExpression;
use subplanner::query::{CanonicalQuery, QueryOptions};
use subplanner::subplan::{choose_plan, BranchSource, PlanOrigin, SubplanStage};

use super::super::fixtures::*;

fn ranked_branch() -> MatchExpression {
    MatchExpression::or(vec![
        MatchExpression::and(vec![
            MatchExpression::eq("a", json!(2)),
            MatchExpression::eq("b", json!(0)),
        ]),
        MatchExpression::eq("c", json!(3)),
    ])
}

#[test]
fn test_second_attempt_reuses_ranked_branch() {
    let h = Harness::new(numbers());
    let q = query(ranked_branch());
    let env = h.env();

    let mut first = SubplanStage::new(&env, &q);
    let planned = first.pick_best_plan().unwrap();
    assert!(!first.branch_planned_from_cache(0));
    assert_eq!(h.cache.len(), 1);

    let branch = CanonicalQuery::canonicalize_subquery(&q, &q.filter().children()[0]).unwrap();
    assert!(h.cache.contains(&PlanCacheKey::from_query(&branch)));

    let mut second = SubplanStage::new(&env, &q);
    let reused = second.pick_best_plan().unwrap();
    assert!(second.branch_planned_from_cache(0));
    assert!(!second.branch_planned_from_cache(1));

    assert_eq!(reused.origin, PlanOrigin::Subplanned);
    assert_eq!(reused.branches, vec![BranchSource::FromCache, BranchSource::Single]);
    assert_eq!(reused.solution.summary(), planned.solution.summary());

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.branch_cache_hits, 1);
    assert_eq!(snapshot.branches_ranked, 1);
    assert_eq!(snapshot.plan_cache_writes, 1);
}

#[test]
fn test_composite_carries_one_assignment_per_branch() {
    let h = Harness::new(numbers());
    let q = query(ranked_branch());

    let outcome = choose_plan(&h.env(), &q).unwrap();

    let data = outcome.solution.cache_data.as_ref().unwrap();
    assert_eq!(data.solution_type, SolutionType::UseIndexTags);
    let tree = data.indexed_tree().unwrap();
    assert!(tree.entry.is_none());
    assert_eq!(tree.children.len(), 2);
    assert_eq!(
        tree.children[1].entry.as_ref().map(|e| e.index_name.as_str()),
        Some("c_1")
    );
}

#[test]
fn test_single_candidate_branches_are_not_cached() {
    let h = Harness::new(numbers());
    let q = query(MatchExpression::or(vec![
        MatchExpression::eq("a", json!(1)),
        MatchExpression::eq("c", json!(3)),
    ]));

    choose_plan(&h.env(), &q).unwrap();
    choose_plan(&h.env(), &q).unwrap();

    assert!(h.cache.is_empty());
    assert_eq!(h.metrics.snapshot().branch_cache_hits, 0);
}

#[test]
fn test_explain_queries_skip_the_cache() {
    let h = Harness::new(numbers());
    let q = query_with(ranked_branch(), QueryOptions::new().explain());

    let first = choose_plan(&h.env(), &q).unwrap();
    let second = choose_plan(&h.env(), &q).unwrap();

    assert!(h.cache.is_empty());
    assert_eq!(first.branches[0], BranchSource::Ranked);
    assert_eq!(second.branches[0], BranchSource::Ranked);
}
