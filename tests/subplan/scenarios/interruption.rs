//! Kill, deadline and catalog changes during planning
//!
//! None of these may fall back to whole-query planning.

use std::time::Duration;

use serde_json::json;
use subplanner::config::SubplannerConfig;
use subplanner::expression::MatchExpression;
use subplanner::planner::PlannerErrorCode;
use subplanner::query::OperationContext;
use subplanner::subplan::{choose_plan, SubplanStage, SubplanState};

use super::super::fixtures::*;
use super::super::hooks::*;

fn two_branches() -> MatchExpression {
    MatchExpression::or(vec![
        MatchExpression::eq("a", json!(1)),
        MatchExpression::eq("c", json!(3)),
    ])
}

/// Branch 0 ranks three candidates over `a_1`, `b_1` and their intersection
fn ranked_branch() -> MatchExpression {
    MatchExpression::or(vec![
        MatchExpression::and(vec![
            MatchExpression::eq("a", json!(2)),
            MatchExpression::eq("b", json!(0)),
        ]),
        MatchExpression::eq("c", json!(3)),
    ])
}

fn assert_no_fallback(h: &Harness) {
    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.whole_query_fallbacks, 0);
    assert_eq!(snapshot.subplans_composed, 0);
    assert_eq!(snapshot.fatal_failures, 1);
}

#[test]
fn test_expired_deadline_is_fatal() {
    let h = Harness::new(numbers())
        .with_ctx(OperationContext::new().with_time_limit(Duration::ZERO));
    let q = query(two_branches());

    let env = h.env();
    let mut stage = SubplanStage::new(&env, &q);
    let err = stage.pick_best_plan().unwrap_err();

    assert_eq!(err.code(), PlannerErrorCode::SubplanExceededTimeLimit);
    assert!(err.is_fatal());
    assert_eq!(stage.state(), SubplanState::Failed);
    assert_eq!(stage.branch_count(), 0);
    assert_no_fallback(&h);
}

#[test]
fn test_deadline_expiring_during_branch_trial() {
    let mut config = SubplannerConfig::default();
    config.trial.yield_iterations = 1;
    let h = Harness::new(numbers())
        .with_config(config)
        .with_ctx(OperationContext::new().with_time_limit(Duration::from_millis(250)));
    let hooks = StallOnYield {
        pause: Duration::from_millis(400),
    };
    let env = h.env().with_hooks(&hooks);
    let q = query(ranked_branch());

    let mut stage = SubplanStage::new(&env, &q);
    let err = stage.pick_best_plan().unwrap_err();

    assert_eq!(err.code(), PlannerErrorCode::SubplanExceededTimeLimit);
    assert!(err.is_fatal());
    assert_eq!(err.branch(), Some(0));
    assert_eq!(stage.state(), SubplanState::Failed);
    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.branches_ranked, 1);
    assert_eq!(snapshot.trial_yields, 0);
    assert!(h.cache.is_empty());
    assert_no_fallback(&h);
}

#[test]
fn test_killed_operation_is_fatal() {
    let h = Harness::new(numbers());
    h.ctx.kill();
    let q = query(two_branches());

    let err = choose_plan(&h.env(), &q).unwrap_err();

    assert_eq!(err.code(), PlannerErrorCode::SubplanPlanKilled);
    assert_no_fallback(&h);
}

#[test]
fn test_kill_between_branches() {
    let h = Harness::new(numbers());
    let hooks = KillBeforeBranch { branch: 1 };
    let env = h.env().with_hooks(&hooks);
    let q = query(two_branches());

    let mut stage = SubplanStage::new(&env, &q);
    let err = stage.pick_best_plan().unwrap_err();

    assert_eq!(err.code(), PlannerErrorCode::SubplanPlanKilled);
    assert_eq!(stage.branch_count(), 1);
    assert_eq!(stage.state(), SubplanState::Failed);
    assert_no_fallback(&h);
}

#[test]
fn test_index_dropped_before_composition() {
    let h = Harness::new(numbers());
    let hooks = DropIndexBeforeCompose {
        collection: &h.collection,
        index: "c_1",
    };
    let env = h.env().with_hooks(&hooks);
    let q = query(two_branches());

    let mut stage = SubplanStage::new(&env, &q);
    let err = stage.pick_best_plan().unwrap_err();

    assert_eq!(err.code(), PlannerErrorCode::SubplanPlanKilled);
    assert!(err.message().contains("c_1"));
    assert_eq!(stage.branch_count(), 2);
    assert_no_fallback(&h);
}

#[test]
fn test_collection_dropped_before_composition() {
    let h = Harness::new(numbers());
    let hooks = DropCollectionBeforeCompose {
        collection: &h.collection,
    };
    let env = h.env().with_hooks(&hooks);
    let q = query(two_branches());

    let err = choose_plan(&env, &q).unwrap_err();

    assert_eq!(err.code(), PlannerErrorCode::SubplanPlanKilled);
    assert_no_fallback(&h);
}

#[test]
fn test_index_dropped_during_branch_trial() {
    let mut config = SubplannerConfig::default();
    config.trial.yield_iterations = 1;
    let h = Harness::new(numbers()).with_config(config);
    let hooks = DropIndexOnYield {
        collection: &h.collection,
        index: "b_1",
    };
    let env = h.env().with_hooks(&hooks);
    let q = query(ranked_branch());

    let err = choose_plan(&env, &q).unwrap_err();

    assert_eq!(err.code(), PlannerErrorCode::SubplanPlanKilled);
    assert_eq!(err.branch(), Some(0));
    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.branches_ranked, 1);
    assert_eq!(snapshot.trial_yields, 0);
    assert_eq!(snapshot.plan_cache_writes, 0);
    assert!(h.cache.is_empty());
    assert_no_fallback(&h);
}

#[test]
fn test_hooks_run_at_every_interruption_point() {
    let mut config = SubplannerConfig::default();
    config.trial.yield_iterations = 1;
    let h = Harness::new(numbers()).with_config(config);
    let hooks = CountingHooks::default();
    let env = h.env().with_hooks(&hooks);
    let q = query(ranked_branch());

    choose_plan(&env, &q).unwrap();

    assert_eq!(hooks.branches.get(), 2);
    assert_eq!(hooks.composes.get(), 1);
    assert!(hooks.yields.get() >= 1);
    assert_eq!(h.metrics.snapshot().trial_yields as usize, hooks.yields.get());
}
