//! Whole-query fallback

use serde_json::json;
use subplanner::cache::{PlanCache, PlanCacheKey, SolutionCacheData};
use subplanner::config::SubplannerConfig;
use subplanner::expression::MatchExpression;
use subplanner::planner::PlannerErrorCode;
use subplanner::query::{CanonicalQuery, QueryOptions};
use subplanner::subplan::{choose_plan, ExplainPlan, PlanOrigin, SubplanStage, SubplanState};

use super::super::fixtures::*;
use super::super::hooks::{NoSolutions, PickLast, WithCollectionScan};

fn unindexed_branch() -> MatchExpression {
    MatchExpression::or(vec![
        MatchExpression::eq("a", json!(1)),
        MatchExpression::eq("d", json!(3)),
    ])
}

#[test]
fn test_unindexed_branch_falls_back() {
    let h = Harness::new(numbers());
    let q = query(unindexed_branch());

    let env = h.env();
    let mut stage = SubplanStage::new(&env, &q);
    let outcome = stage.pick_best_plan().unwrap();

    assert_eq!(stage.state(), SubplanState::Composed);
    assert_eq!(outcome.origin, PlanOrigin::WholeQuery);
    assert!(outcome.branches.is_empty());
    assert_eq!(outcome.solution.summary(), "COLLSCAN");

    let reason = outcome.fallback_reason.as_ref().unwrap();
    assert_eq!(reason.code(), PlannerErrorCode::SubplanNoIndexedCacheData);
    assert_eq!(reason.branch(), Some(1));

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.whole_query_fallbacks, 1);
    assert_eq!(snapshot.subplans_composed, 0);
}

#[test]
fn test_fallback_matches_planning_without_subplanning() {
    let subplanned = Harness::new(numbers());
    let whole = Harness::new(numbers()).with_config(SubplannerConfig {
        enable_subplanning: false,
        ..SubplannerConfig::default()
    });
    let q = query(unindexed_branch());

    let fallback = choose_plan(&subplanned.env(), &q).unwrap();
    let direct = choose_plan(&whole.env(), &q).unwrap();

    assert_eq!(direct.origin, PlanOrigin::WholeQuery);
    assert!(direct.fallback_reason.is_none());
    assert_eq!(whole.metrics.snapshot().subplans_attempted, 0);

    assert_eq!(fallback.solution.summary(), direct.solution.summary());
    assert_eq!(
        executed_ids(&fallback.solution, &subplanned.collection),
        executed_ids(&direct.solution, &whole.collection)
    );
    assert_eq!(
        executed_ids(&fallback.solution, &subplanned.collection),
        matching_ids(q.filter(), &subplanned.collection)
    );
}

#[test]
fn test_collection_scan_winner_falls_back() {
    let h = Harness::new(numbers());
    let enumerator = WithCollectionScan;
    let ranker = PickLast;
    let env = h.env().with_enumerator(&enumerator).with_ranker(&ranker);
    let q = query(MatchExpression::or(vec![
        MatchExpression::eq("a", json!(1)),
        MatchExpression::eq("c", json!(3)),
    ]));

    let outcome = choose_plan(&env, &q).unwrap();

    assert_eq!(outcome.origin, PlanOrigin::WholeQuery);
    assert!(outcome.solution.is_collection_scan());
    let reason = outcome.fallback_reason.unwrap();
    assert_eq!(reason.code(), PlannerErrorCode::SubplanNoIndexedCacheData);
    assert_eq!(reason.branch(), Some(0));
}

#[test]
fn test_cached_collection_scan_for_branch_falls_back() {
    let h = Harness::new(numbers());
    let q = query(MatchExpression::or(vec![
        MatchExpression::eq("a", json!(1)),
        MatchExpression::eq("c", json!(3)),
    ]));
    let branch = CanonicalQuery::canonicalize_subquery(&q, &q.filter().children()[0]).unwrap();
    h.cache.add(
        PlanCacheKey::from_query(&branch),
        SolutionCacheData::collection_scan(),
        1.0,
    );

    let outcome = choose_plan(&h.env(), &q).unwrap();

    assert_eq!(outcome.origin, PlanOrigin::WholeQuery);
    assert_eq!(
        outcome.fallback_reason.unwrap().code(),
        PlannerErrorCode::SubplanNoIndexedCacheData
    );
    assert_eq!(h.metrics.snapshot().branch_cache_hits, 1);
}

#[test]
fn test_failed_fallback_cannot_satisfy_query() {
    let h = Harness::new(numbers());
    let enumerator = NoSolutions;
    let env = h.env().with_enumerator(&enumerator);
    let q = query(unindexed_branch());

    let mut stage = SubplanStage::new(&env, &q);
    let err = stage.pick_best_plan().unwrap_err();

    assert_eq!(stage.state(), SubplanState::Failed);
    assert_eq!(err.code(), PlannerErrorCode::SubplanCannotSatisfyQuery);
    assert!(!err.is_fatal());
    assert!(err.message().contains("No query solutions"));

    let output = ExplainPlan::from_error(&err).to_string();
    assert!(output.contains("SUBPLAN_CANNOT_SATISFY_QUERY"));
}

#[test]
fn test_hinted_query_is_never_subplanned() {
    let h = Harness::new(numbers());
    let q = query_with(
        MatchExpression::or(vec![
            MatchExpression::eq("a", json!(1)),
            MatchExpression::eq("c", json!(3)),
        ]),
        QueryOptions::new().with_hint("a_1"),
    );

    let outcome = choose_plan(&h.env(), &q).unwrap();

    assert_eq!(outcome.origin, PlanOrigin::WholeQuery);
    assert!(outcome.fallback_reason.is_none());
    assert!(outcome.solution.uses_index("a_1"));
    assert!(!outcome.solution.uses_index("c_1"));
    assert_eq!(h.metrics.snapshot().subplans_attempted, 0);
    assert_eq!(
        executed_ids(&outcome.solution, &h.collection),
        matching_ids(q.filter(), &h.collection)
    );
}
