//! Collaborators of one planning call

use crate::cache::PlanCache;
use crate::catalog::Collection;
use crate::config::SubplannerConfig;
use crate::observability::MetricsRegistry;
use crate::planner::{PlannerParams, QueryEnumerator, QueryPlanner};
use crate::query::OperationContext;
use crate::ranker::{MultiPlanRanker, PlanRanker, TrialContext};

use super::hooks::{NoopHooks, PlanningHooks};

/// Everything planning reads besides the query.
///
/// `new` wires the built-in enumerator and ranker with no-op hooks; the
/// `with_*` builders swap any of them out.
pub struct PlanningEnv<'a> {
    pub ctx: &'a OperationContext,
    pub collection: &'a Collection,
    pub cache: &'a dyn PlanCache,
    pub config: &'a SubplannerConfig,
    pub metrics: &'a MetricsRegistry,
    pub enumerator: &'a dyn QueryEnumerator,
    pub ranker: &'a dyn PlanRanker,
    pub hooks: &'a dyn PlanningHooks,
}

impl<'a> PlanningEnv<'a> {
    pub fn new(
        ctx: &'a OperationContext,
        collection: &'a Collection,
        cache: &'a dyn PlanCache,
        config: &'a SubplannerConfig,
        metrics: &'a MetricsRegistry,
    ) -> Self {
        Self {
            ctx,
            collection,
            cache,
            config,
            metrics,
            enumerator: &QueryPlanner,
            ranker: &MultiPlanRanker,
            hooks: &NoopHooks,
        }
    }

    pub fn with_enumerator(mut self, enumerator: &'a dyn QueryEnumerator) -> Self {
        self.enumerator = enumerator;
        self
    }

    pub fn with_ranker(mut self, ranker: &'a dyn PlanRanker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_hooks(mut self, hooks: &'a dyn PlanningHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Planner parameters over the collection's live indexes
    pub fn planner_params(&self) -> PlannerParams {
        PlannerParams::from_config(self.collection.index_catalog(), &self.config.enumeration)
    }

    pub fn trial_context(&self) -> TrialContext<'_> {
        TrialContext {
            ctx: self.ctx,
            collection: self.collection,
            cache: self.cache,
            hooks: self.hooks,
            trial: &self.config.trial,
            metrics: self.metrics,
        }
    }
}
