//! Multi-candidate trial ranking
//!
//! Candidates run round-robin, one unit of work each per round, until one
//! reaches EOF, one produces a full batch of results, or the work budget
//! runs out. Every `yield_iterations` work units the trial yields: the
//! planning hooks run, the operation is checked for interruption, and the
//! catalog objects every live candidate reads are revalidated.

use std::cmp::Ordering;

use crate::cache::{should_cache_query, CachingMode, PlanCache, PlanCacheKey};
use crate::catalog::{CatalogView, Collection};
use crate::config::TrialConfig;
use crate::observability::{Event, Logger, MetricsRegistry};
use crate::planner::{PlannerError, PlannerResult};
use crate::query::{CanonicalQuery, OperationContext};
use crate::solution::{QuerySolution, QuerySolutionNode, Stage};
use crate::subplan::PlanningHooks;

use super::stages::{build_stage, PlanStage, StageState};
use super::working_set::WorkingSet;

/// Everything a trial reads besides the candidates
pub struct TrialContext<'a> {
    pub ctx: &'a OperationContext,
    pub collection: &'a Collection,
    pub cache: &'a dyn PlanCache,
    pub hooks: &'a dyn PlanningHooks,
    pub trial: &'a TrialConfig,
    pub metrics: &'a MetricsRegistry,
}

/// Per-candidate trial statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateStats {
    pub works: u64,
    pub advanced: u64,
    pub eof: bool,
    /// Dropped after a recoverable execution error
    pub failed: bool,
    pub score: f64,
}

/// Result of ranking
#[derive(Debug, Clone)]
pub struct RankingDecision {
    pub winner: QuerySolution,
    /// Position of the winner among the submitted candidates
    pub winner_index: usize,
    /// Statistics in submission order
    pub stats: Vec<CandidateStats>,
    /// Whether the winner was written to the plan cache
    pub cached: bool,
}

impl RankingDecision {
    pub fn score(&self) -> f64 {
        self.stats
            .get(self.winner_index)
            .map(|s| s.score)
            .unwrap_or_default()
    }
}

/// Picks one plan among several candidates for the same query
pub trait PlanRanker {
    fn pick_best_plan(
        &self,
        query: &CanonicalQuery,
        candidates: Vec<QuerySolution>,
        ws: &mut WorkingSet,
        trial: &TrialContext<'_>,
        mode: CachingMode,
    ) -> PlannerResult<RankingDecision>;
}

/// Trial-execution ranker
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiPlanRanker;

impl MultiPlanRanker {
    pub fn new() -> Self {
        Self
    }
}

struct Candidate {
    solution: QuerySolution,
    stage: Box<dyn PlanStage>,
    stats: CandidateStats,
}

impl PlanRanker for MultiPlanRanker {
    fn pick_best_plan(
        &self,
        query: &CanonicalQuery,
        candidates: Vec<QuerySolution>,
        ws: &mut WorkingSet,
        trial: &TrialContext<'_>,
        mode: CachingMode,
    ) -> PlannerResult<RankingDecision> {
        if candidates.is_empty() {
            return Err(PlannerError::no_query_solutions(format!(
                "no candidate plans to rank for {}",
                query
            )));
        }

        let mut runs: Vec<Candidate> = candidates
            .into_iter()
            .map(|solution| Candidate {
                stage: build_stage(&solution.root),
                solution,
                stats: CandidateStats::default(),
            })
            .collect();

        let max_works = trial.trial.max_works(trial.collection.num_records());
        let yield_every = trial.trial.yield_iterations.max(1);
        let query_text = query.to_string();

        Logger::trace(
            Event::RankerTrialBegin.as_str(),
            &[
                ("query", &query_text),
                ("candidates", &runs.len().to_string()),
                ("max_works", &max_works.to_string()),
            ],
        );

        let mut total_works = 0u64;
        let mut since_yield = 0u64;
        let mut rounds = 0u64;

        while rounds < max_works {
            rounds += 1;

            for run in runs.iter_mut().filter(|r| !r.stats.failed) {
                run.stats.works += 1;
                total_works += 1;
                since_yield += 1;
                match run.stage.work(ws, trial.collection) {
                    Ok(StageState::Advanced(id)) => {
                        run.stats.advanced += 1;
                        ws.free(id);
                    }
                    Ok(StageState::NeedTime) => {}
                    Ok(StageState::IsEof) => run.stats.eof = true,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        Logger::trace(
                            Event::RankerTrialComplete.as_str(),
                            &[
                                ("candidate", &run.solution.summary()),
                                ("failed", &e.to_string()),
                            ],
                        );
                        run.stats.failed = true;
                    }
                }
            }

            let live: Vec<&Candidate> = runs.iter().filter(|r| !r.stats.failed).collect();
            if live.is_empty() {
                break;
            }
            if live
                .iter()
                .any(|r| r.stats.eof || r.stats.advanced >= trial.trial.num_results)
            {
                break;
            }

            if since_yield >= yield_every {
                since_yield = 0;
                yield_and_revalidate(trial, &live)?;
            }
        }

        trial.metrics.add_trial_works(total_works);

        for run in &mut runs {
            run.stats.score = if run.stats.failed {
                0.0
            } else {
                score(&run.stats, &run.solution.root)
            };
        }

        let Some(winner_index) = best_candidate(&runs) else {
            return Err(PlannerError::no_query_solutions(format!(
                "every candidate plan failed during the trial for {}",
                query
            )));
        };

        let stats: Vec<CandidateStats> = runs.iter().map(|r| r.stats.clone()).collect();
        let winner = runs.swap_remove(winner_index).solution;
        let cached = write_to_cache(query, &winner, &stats, winner_index, trial, mode);

        Logger::trace(
            Event::RankerTrialComplete.as_str(),
            &[
                ("query", &query_text),
                ("winner", &winner.summary()),
                ("score", &format!("{:.6}", stats[winner_index].score)),
                ("works", &total_works.to_string()),
                ("cached", if cached { "true" } else { "false" }),
            ],
        );

        Ok(RankingDecision {
            winner,
            winner_index,
            stats,
            cached,
        })
    }
}

fn yield_and_revalidate(trial: &TrialContext<'_>, live: &[&Candidate]) -> PlannerResult<()> {
    trial.hooks.on_trial_yield(trial.ctx)?;
    trial.ctx.check_for_interrupt()?;

    if !trial.collection.collection_exists() {
        return Err(PlannerError::plan_killed(format!(
            "collection {} dropped during plan selection",
            trial.collection.name()
        )));
    }
    for run in live {
        for name in run.solution.root.index_names() {
            if !trial.collection.index_exists(name) {
                return Err(PlannerError::plan_killed(format!(
                    "index {} dropped during plan selection",
                    name
                )));
            }
        }
    }

    trial.metrics.increment_trial_yields();
    Logger::trace(
        Event::RankerYield.as_str(),
        &[("collection", trial.collection.name())],
    );
    Ok(())
}

/// Productivity plus an EOF bonus plus small tie breakers for plans
/// without a fetch, a blocking sort, or an index intersection.
fn score(stats: &CandidateStats, root: &QuerySolutionNode) -> f64 {
    let productivity = if stats.works == 0 {
        0.0
    } else {
        stats.advanced as f64 / stats.works as f64
    };
    let epsilon = if stats.works == 0 {
        1e-4
    } else {
        (1.0 / (10.0 * stats.works as f64)).min(1e-4)
    };

    let no_fetch = !root.any_node(&|n| n.stage == Stage::Fetch);
    let no_sort = !root.any_node(&|n| matches!(n.stage, Stage::Sort { .. }));
    let no_intersection = !root.any_node(&|n| matches!(n.stage, Stage::AndHash | Stage::AndSorted));
    let bonuses = [no_fetch, no_sort, no_intersection]
        .iter()
        .filter(|b| **b)
        .count() as f64;

    let eof_bonus = if stats.eof { 1.0 } else { 0.0 };
    1.0 + productivity + eof_bonus + epsilon * bonuses
}

/// Highest score; the earliest candidate wins a tie
fn best_candidate(runs: &[Candidate]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, run) in runs.iter().enumerate() {
        if run.stats.failed {
            continue;
        }
        best = match best {
            Some(b) if runs[b].stats.score >= run.stats.score => Some(b),
            _ => Some(i),
        };
    }
    best
}

fn write_to_cache(
    query: &CanonicalQuery,
    winner: &QuerySolution,
    stats: &[CandidateStats],
    winner_index: usize,
    trial: &TrialContext<'_>,
    mode: CachingMode,
) -> bool {
    let allowed = match mode {
        CachingMode::Always => true,
        CachingMode::Never => false,
        CachingMode::Sometimes => {
            let winning = &stats[winner_index];
            let tied = stats.iter().enumerate().any(|(i, s)| {
                i != winner_index
                    && !s.failed
                    && s.score.partial_cmp(&winning.score) == Some(Ordering::Equal)
            });
            !tied && winning.advanced > 0
        }
    };
    if !allowed || !should_cache_query(query) {
        return false;
    }
    let Some(data) = winner.cache_data.clone() else {
        return false;
    };

    let key = PlanCacheKey::from_query(query);
    let score = stats[winner_index].score;
    Logger::trace(
        Event::PlanCacheWrite.as_str(),
        &[("key", key.as_str()), ("score", &format!("{:.6}", score))],
    );
    trial.cache.add(key, data, score);
    trial.metrics.increment_plan_cache_writes();
    true
}
