//! Stopping conditions.
//!
//! Conditions are polled, never pushed. The engine checks the registry once
//! per generation boundary; querying it at any other time is harmless.

use std::time::{Duration, Instant};

use crate::schema::{StopReason, StoppingConditionConfig};

use super::oracle::ExecutionCounters;

/// Search state the conditions look at.
#[derive(Debug, Clone, Copy)]
pub struct SearchStatus<'a> {
    pub counters: &'a ExecutionCounters,
    pub generation: usize,
    /// Best aggregated fitness so far, if anything was evaluated.
    pub best_cost: Option<f64>,
}

/// A single stopping predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum StoppingCondition {
    MaxTime(Duration),
    MaxEvaluations(u64),
    MaxTests(u64),
    MaxStatements(u64),
    ZeroFitness,
    MaxGenerations(usize),
}

impl From<&StoppingConditionConfig> for StoppingCondition {
    fn from(config: &StoppingConditionConfig) -> Self {
        match config {
            StoppingConditionConfig::MaxTime { seconds } => {
                Self::MaxTime(
                    Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX),
                )
            }
            StoppingConditionConfig::MaxEvaluations { limit } => Self::MaxEvaluations(*limit),
            StoppingConditionConfig::MaxTests { limit } => Self::MaxTests(*limit),
            StoppingConditionConfig::MaxStatements { limit } => Self::MaxStatements(*limit),
            StoppingConditionConfig::ZeroFitness => Self::ZeroFitness,
            StoppingConditionConfig::MaxGenerations { limit } => Self::MaxGenerations(*limit),
        }
    }
}

impl StoppingCondition {
    fn is_met(&self, status: &SearchStatus<'_>, elapsed: Duration) -> bool {
        match self {
            Self::MaxTime(budget) => elapsed >= *budget,
            Self::MaxEvaluations(limit) => status.counters.evaluations() >= *limit,
            Self::MaxTests(limit) => status.counters.tests() >= *limit,
            Self::MaxStatements(limit) => status.counters.statements() >= *limit,
            Self::ZeroFitness => status.best_cost.is_some_and(|cost| cost <= 0.0),
            Self::MaxGenerations(limit) => status.generation >= *limit,
        }
    }

    fn reason(&self) -> StopReason {
        match self {
            Self::MaxTime(_) => StopReason::MaxTime,
            Self::MaxEvaluations(_) => StopReason::MaxEvaluations,
            Self::MaxTests(_) => StopReason::MaxTests,
            Self::MaxStatements(_) => StopReason::MaxStatements,
            Self::ZeroFitness => StopReason::ZeroFitness,
            Self::MaxGenerations(_) => StopReason::MaxGenerations,
        }
    }
}

/// Disjunction over the registered conditions.
#[derive(Debug, Clone)]
pub struct StoppingRegistry {
    conditions: Vec<StoppingCondition>,
    started: Instant,
}

impl StoppingRegistry {
    pub fn new(conditions: Vec<StoppingCondition>) -> Self {
        Self {
            conditions,
            started: Instant::now(),
        }
    }

    pub fn from_config(configs: &[StoppingConditionConfig]) -> Self {
        Self::new(configs.iter().map(StoppingCondition::from).collect())
    }

    /// Add a condition.
    pub fn register(&mut self, condition: StoppingCondition) {
        self.conditions.push(condition);
    }

    /// Restart the clock for time-based conditions.
    pub fn reset(&mut self) {
        self.started = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// First condition that holds, in registration order.
    pub fn check(&self, status: &SearchStatus<'_>) -> Option<StopReason> {
        let elapsed = self.elapsed();
        self.conditions
            .iter()
            .find(|condition| condition.is_met(status, elapsed))
            .map(StoppingCondition::reason)
    }

    pub fn is_finished(&self, status: &SearchStatus<'_>) -> bool {
        self.check(status).is_some()
    }

    pub fn conditions(&self) -> &[StoppingCondition] {
        &self.conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(counters: &ExecutionCounters, generation: usize, best: Option<f64>) -> SearchStatus<'_> {
        SearchStatus {
            counters,
            generation,
            best_cost: best,
        }
    }

    #[test]
    fn test_generation_limit() {
        let counters = ExecutionCounters::default();
        let registry = StoppingRegistry::new(vec![StoppingCondition::MaxGenerations(3)]);
        assert!(!registry.is_finished(&status(&counters, 2, None)));
        assert_eq!(
            registry.check(&status(&counters, 3, None)),
            Some(StopReason::MaxGenerations)
        );
    }

    #[test]
    fn test_zero_fitness() {
        let counters = ExecutionCounters::default();
        let registry = StoppingRegistry::new(vec![StoppingCondition::ZeroFitness]);
        assert!(!registry.is_finished(&status(&counters, 0, None)));
        assert!(!registry.is_finished(&status(&counters, 0, Some(0.2))));
        assert_eq!(
            registry.check(&status(&counters, 0, Some(0.0))),
            Some(StopReason::ZeroFitness)
        );
    }

    #[test]
    fn test_zero_time_budget_is_recheck_safe() {
        let counters = ExecutionCounters::default();
        let registry = StoppingRegistry::new(vec![StoppingCondition::MaxTime(Duration::ZERO)]);
        for _ in 0..3 {
            assert_eq!(
                registry.check(&status(&counters, 0, None)),
                Some(StopReason::MaxTime)
            );
        }
    }

    #[test]
    fn test_long_time_budget_not_met() {
        let counters = ExecutionCounters::default();
        let registry =
            StoppingRegistry::new(vec![StoppingCondition::MaxTime(Duration::from_secs(3600))]);
        assert!(!registry.is_finished(&status(&counters, 0, None)));
    }

    #[test]
    fn test_huge_time_budget_saturates() {
        let counters = ExecutionCounters::default();
        let registry =
            StoppingRegistry::from_config(&[StoppingConditionConfig::MaxTime { seconds: 1e20 }]);
        assert_eq!(
            registry.conditions()[0],
            StoppingCondition::MaxTime(Duration::MAX)
        );
        assert!(!registry.is_finished(&status(&counters, 0, None)));
    }

    #[test]
    fn test_first_registered_reason_wins() {
        let counters = ExecutionCounters::default();
        let mut registry = StoppingRegistry::from_config(&[
            StoppingConditionConfig::MaxEvaluations { limit: 0 },
        ]);
        registry.register(StoppingCondition::MaxGenerations(0));
        assert_eq!(
            registry.check(&status(&counters, 0, None)),
            Some(StopReason::MaxEvaluations)
        );
        assert_eq!(registry.conditions().len(), 2);
    }

    #[test]
    fn test_empty_registry_never_finishes() {
        let counters = ExecutionCounters::default();
        let registry = StoppingRegistry::new(Vec::new());
        assert!(!registry.is_finished(&status(&counters, usize::MAX, Some(0.0))));
    }
}
