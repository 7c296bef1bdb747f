//! Search engine driving one strategy from initialization to termination.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::schema::{
    ConfigError, SearchConfig, SearchHistory, SearchPhase, SearchProgress, SearchStats,
    StopReason,
};

use super::archive::{GoalArchive, ambiguity_fitness, coverage_matrix};
use super::individual::{Genome, Goal, GoalId, Individual, Objective};
use super::operators::{Breeder, GenomeFactory, SearchRng, Variation};
use super::oracle::{ExecutionCounters, ExecutionOracle, Evaluator};
use super::secondary::{BloatControl, SecondaryObjectives};
use super::stopping::{SearchStatus, StoppingRegistry};
use super::strategy::{EvolutionStrategy, NoveltyMetric, SearchContext, Strategy};

/// Everything problem-specific the engine needs.
pub struct SearchProblem<G> {
    pub objectives: Vec<Objective>,
    pub goals: Vec<Goal>,
    pub oracle: Arc<dyn ExecutionOracle<G>>,
    pub factory: Arc<dyn GenomeFactory<G>>,
    pub variation: Arc<dyn Variation<G>>,
    /// Required by novelty search only.
    pub novelty: Option<Arc<dyn NoveltyMetric<G>>>,
}

impl<G> SearchProblem<G> {
    pub fn new(
        objectives: Vec<Objective>,
        goals: Vec<Goal>,
        oracle: Arc<dyn ExecutionOracle<G>>,
        factory: Arc<dyn GenomeFactory<G>>,
        variation: Arc<dyn Variation<G>>,
    ) -> Self {
        Self {
            objectives,
            goals,
            oracle,
            factory,
            variation,
            novelty: None,
        }
    }

    /// Attach a novelty metric.
    pub fn with_novelty(mut self, metric: Arc<dyn NoveltyMetric<G>>) -> Self {
        self.novelty = Some(metric);
        self
    }
}

/// Engine-level errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Population has not been initialized")]
    NotInitialized,
    #[error("Search has already terminated")]
    Terminated,
    #[error("Population is empty")]
    EmptyPopulation,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct SearchResult<G> {
    /// Best individual found over the whole run.
    pub best: Individual<G>,
    /// Best solution per goal.
    pub archive: BTreeMap<GoalId, Individual<G>>,
    pub stats: SearchStats,
    pub history: SearchHistory,
}

/// Evolutionary search engine.
pub struct SearchEngine<G> {
    config: SearchConfig,
    ctx: SearchContext<G>,
    strategy: Strategy<G>,
    stopping: StoppingRegistry,
    history: SearchHistory,
    phase: SearchPhase,
    best: Option<Individual<G>>,
    cancelled: Arc<AtomicBool>,
}

impl<G: Genome> SearchEngine<G> {
    /// Create an engine. All configuration errors surface here.
    pub fn new(config: SearchConfig, problem: SearchProblem<G>) -> Result<Self, SearchError> {
        config.validate()?;
        if problem.objectives.is_empty() {
            return Err(ConfigError::NoObjectives.into());
        }

        let strategy = Strategy::from_config(&config.strategy, problem.novelty)?;
        strategy.canonical_size(config.population.size)?;

        let seed = config.random_seed.unwrap_or_else(rand::random);
        let ctx = SearchContext::new(
            SearchRng::new(seed),
            GoalArchive::new(problem.goals),
            Evaluator::new(problem.oracle, problem.objectives),
            Breeder::new(problem.variation, config.max_operator_attempts),
            problem.factory,
            config.selection.clone(),
            BloatControl::new(&config.bloat),
            SecondaryObjectives::new(config.secondary_objectives.clone()),
            config.neighbourhood,
        );
        let stopping = StoppingRegistry::from_config(&config.stopping);

        log::debug!(
            "Created {} engine (seed {seed}, {} objectives, {} goals)",
            strategy.name(),
            ctx.evaluator.objectives().len(),
            ctx.archive.len()
        );

        Ok(Self {
            config,
            ctx,
            strategy,
            stopping,
            history: SearchHistory::default(),
            phase: SearchPhase::Idle,
            best: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get cancellation handle. Takes effect at the next generation boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Create and evaluate the initial population.
    ///
    /// The strategy may override `size` (1+(λ,λ) always uses 1). Coverage
    /// recorded by earlier runs of this engine is kept.
    pub fn initialize_population(&mut self, size: usize) -> Result<(), SearchError> {
        if size == 0 {
            return Err(ConfigError::PopulationTooSmall.into());
        }
        let size = self.strategy.canonical_size(size)?;

        self.phase = SearchPhase::Initializing;
        self.stopping.reset();
        self.history = SearchHistory::default();
        self.best = None;
        self.ctx.generation = 0;
        self.ctx.population_size = size;
        self.ctx.fill_population();
        self.strategy.initialize(&mut self.ctx);
        self.check_population_size();
        self.record_generation();
        self.phase = SearchPhase::Evolving;

        log::info!(
            "Initialized {} with {} individuals, {}/{} goals covered",
            self.strategy.name(),
            size,
            self.ctx.archive.covered_goals().len(),
            self.ctx.archive.len()
        );
        Ok(())
    }

    /// Produce one generation.
    pub fn evolve_one_generation(&mut self) -> Result<(), SearchError> {
        match self.phase {
            SearchPhase::Idle | SearchPhase::Initializing => {
                return Err(SearchError::NotInitialized);
            }
            SearchPhase::Terminated => return Err(SearchError::Terminated),
            SearchPhase::Evolving => {}
        }
        if self.ctx.population.is_empty() {
            return Err(SearchError::EmptyPopulation);
        }

        self.ctx.begin_generation();
        self.strategy.evolve_one_generation(&mut self.ctx);
        self.ctx.generation += 1;
        self.check_population_size();
        self.record_generation();

        log::debug!(
            "Generation {}: best={:.4}, covered={}/{}, evaluations={}",
            self.ctx.generation,
            self.best_fitness(),
            self.ctx.archive.covered_goals().len(),
            self.ctx.archive.len(),
            self.ctx.evaluator.counters().evaluations()
        );
        Ok(())
    }

    /// The first reason to stop that currently holds, if any.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }
        if self.ctx.archive.all_covered() {
            return Some(StopReason::AllGoalsCovered);
        }
        let counters = self.ctx.evaluator.counters();
        self.stopping.check(&SearchStatus {
            counters: &counters,
            generation: self.ctx.generation,
            best_cost: self.best.as_ref().map(|best| best.cost),
        })
    }

    /// Whether the search should stop.
    pub fn is_finished(&self) -> bool {
        self.phase == SearchPhase::Terminated || self.stop_reason().is_some()
    }

    /// Best individual found so far.
    pub fn best_individual(&self) -> Option<&Individual<G>> {
        self.best.as_ref()
    }

    /// Goal to best solution, for every goal with an entry.
    pub fn archive_snapshot(&self) -> BTreeMap<GoalId, Individual<G>> {
        self.ctx.archive.snapshot()
    }

    pub fn archive(&self) -> &GoalArchive<G> {
        &self.ctx.archive
    }

    pub fn population(&self) -> &[Individual<G>] {
        &self.ctx.population
    }

    pub fn generation(&self) -> usize {
        self.ctx.generation
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn counters(&self) -> Arc<ExecutionCounters> {
        self.ctx.evaluator.counters()
    }

    /// Normalized ambiguity of the archived suite over all goals.
    ///
    /// Each distinct archived solution is one execution; its coverage vector
    /// is asked from the oracle again.
    pub fn suite_ambiguity(&self) -> f64 {
        let goals: Vec<GoalId> = self.ctx.archive.goals().map(|goal| goal.id).collect();
        let mut seen = BTreeSet::new();
        let executions: Vec<BTreeSet<GoalId>> = self
            .ctx
            .archive
            .snapshot()
            .into_values()
            .filter(|solution| seen.insert(solution.id))
            .map(|solution| self.ctx.evaluator.oracle().coverage_vector(&solution.genome))
            .collect();
        ambiguity_fitness(&coverage_matrix(&executions, &goals))
    }

    /// Get current progress.
    pub fn progress(&self) -> SearchProgress {
        SearchProgress {
            generation: self.ctx.generation,
            best_fitness: self.best_fitness(),
            avg_fitness: self.average_cost(),
            generation_best: self.ctx.best().map_or(f64::INFINITY, |best| best.cost),
            covered_goals: self.ctx.archive.covered_goals().len(),
            total_goals: self.ctx.archive.len(),
            evaluations: self.ctx.evaluator.counters().evaluations(),
            population_size: self.ctx.population.len(),
            history: self.history.clone(),
            phase: self.phase,
        }
    }

    /// Run the search to termination with progress callback.
    ///
    /// Initializes the population with the configured size unless that has
    /// already been done.
    pub fn run_with_callback<F>(&mut self, callback: F) -> Result<SearchResult<G>, SearchError>
    where
        F: Fn(&SearchProgress),
    {
        let start_time = Instant::now();

        if self.phase == SearchPhase::Idle {
            self.initialize_population(self.config.population.size)?;
            callback(&self.progress());
        }

        let stop_reason = loop {
            if let Some(reason) = self.stop_reason() {
                break reason;
            }
            self.evolve_one_generation()?;
            callback(&self.progress());
        };
        self.phase = SearchPhase::Terminated;

        log::info!(
            "{} stopped after {} generations ({:?}): best={:.4}, covered={}/{}",
            self.strategy.name(),
            self.ctx.generation,
            stop_reason,
            self.best_fitness(),
            self.ctx.archive.covered_goals().len(),
            self.ctx.archive.len()
        );

        let best = self.best.clone().ok_or(SearchError::EmptyPopulation)?;
        let elapsed = start_time.elapsed().as_secs_f64();
        Ok(SearchResult {
            best,
            archive: self.archive_snapshot(),
            stats: self.stats(stop_reason, elapsed),
            history: self.history.clone(),
        })
    }

    /// Run the search to termination (blocking).
    pub fn run(&mut self) -> Result<SearchResult<G>, SearchError> {
        self.run_with_callback(|_| {})
    }

    fn best_fitness(&self) -> f64 {
        self.best.as_ref().map_or(f64::INFINITY, |best| best.cost)
    }

    /// Mean finite cost of the current population.
    fn average_cost(&self) -> f64 {
        let costs: Vec<f64> = self
            .ctx
            .population
            .iter()
            .map(|individual| individual.cost)
            .filter(|cost| cost.is_finite())
            .collect();
        if costs.is_empty() {
            0.0
        } else {
            costs.iter().sum::<f64>() / costs.len() as f64
        }
    }

    fn stats(&self, stop_reason: StopReason, elapsed_seconds: f64) -> SearchStats {
        let counters = self.ctx.evaluator.counters();
        SearchStats {
            generations: self.ctx.generation,
            total_evaluations: counters.evaluations(),
            tests_executed: counters.tests(),
            statements_executed: counters.statements(),
            oracle_failures: counters.failures(),
            best_fitness: self.best_fitness(),
            covered_goals: self.ctx.archive.covered_goals().len(),
            total_goals: self.ctx.archive.len(),
            elapsed_seconds,
            stop_reason,
        }
    }

    fn check_population_size(&self) {
        assert_eq!(
            self.ctx.population.len(),
            self.ctx.population_size,
            "{} left the population at the wrong size",
            self.strategy.name()
        );
    }

    fn record_generation(&mut self) {
        if let Some(current) = self.ctx.best()
            && self
                .best
                .as_ref()
                .is_none_or(|best| self.ctx.compare(current, best).is_lt())
        {
            self.best = Some(current.clone());
        }

        let avg = self.average_cost();
        self.history.best_fitness.push(self.best_fitness());
        self.history.avg_fitness.push(avg);
        self.history
            .covered_goals
            .push(self.ctx.archive.covered_goals().len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        GeneticAlgorithmConfig, NoveltySearchConfig, PopulationConfig, StoppingConditionConfig,
        StrategyConfig,
    };
    use crate::search::individual::ObjectiveId;
    use crate::search::individual::tests::Blob;
    use crate::search::oracle::{Evaluation, OracleFailure};
    use crate::search::strategy::KNearestNovelty;
    use crate::search::strategy::tests::{BlobFactory, SizeOracle, Step};

    fn problem(with_goal: bool) -> SearchProblem<Blob> {
        let goals = if with_goal {
            vec![Goal::new(0, ObjectiveId(0), "empty")]
        } else {
            Vec::new()
        };
        SearchProblem::new(
            vec![Objective::minimize(0, "size")],
            goals,
            Arc::new(SizeOracle),
            Arc::new(BlobFactory),
            Arc::new(Step),
        )
    }

    fn config(strategy: StrategyConfig, stopping: Vec<StoppingConditionConfig>) -> SearchConfig {
        SearchConfig {
            strategy,
            population: PopulationConfig { size: 8 },
            stopping,
            random_seed: Some(42),
            ..Default::default()
        }
    }

    fn generations(limit: usize) -> Vec<StoppingConditionConfig> {
        vec![StoppingConditionConfig::MaxGenerations { limit }]
    }

    #[test]
    fn test_run_stops_at_generation_limit() {
        let mut engine =
            SearchEngine::new(config(StrategyConfig::default(), generations(5)), problem(false))
                .unwrap();
        let result = engine.run().unwrap();

        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        assert_eq!(result.stats.generations, 5);
        // Initial population plus five generations.
        assert_eq!(result.history.best_fitness.len(), 6);
        for pair in result.history.best_fitness.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        assert_eq!(engine.phase(), SearchPhase::Terminated);
        assert!(matches!(
            engine.evolve_one_generation(),
            Err(SearchError::Terminated)
        ));
    }

    #[test]
    fn test_evolve_before_initialize_fails() {
        let mut engine =
            SearchEngine::new(config(StrategyConfig::default(), generations(5)), problem(false))
                .unwrap();
        assert_eq!(engine.phase(), SearchPhase::Idle);
        assert!(matches!(
            engine.evolve_one_generation(),
            Err(SearchError::NotInitialized)
        ));
        assert!(engine.best_individual().is_none());
    }

    #[test]
    fn test_driver_loop() {
        let mut engine = SearchEngine::new(
            config(StrategyConfig::MuPlusLambda { lambda: 12 }, generations(4)),
            problem(false),
        )
        .unwrap();
        engine.initialize_population(8).unwrap();
        let mut steps = 0;
        while !engine.is_finished() {
            engine.evolve_one_generation().unwrap();
            assert_eq!(engine.population().len(), 8);
            steps += 1;
        }
        assert_eq!(steps, 4);
        assert_eq!(engine.stop_reason(), Some(StopReason::MaxGenerations));
    }

    #[test]
    fn test_zero_fitness_stops_search() {
        let stopping = vec![
            StoppingConditionConfig::MaxGenerations { limit: 1000 },
            StoppingConditionConfig::ZeroFitness,
        ];
        let mut engine = SearchEngine::new(
            config(StrategyConfig::MuPlusLambda { lambda: 10 }, stopping),
            problem(false),
        )
        .unwrap();
        let result = engine.run().unwrap();

        assert_eq!(result.stats.stop_reason, StopReason::ZeroFitness);
        assert_eq!(result.best.cost, 0.0);
        assert_eq!(result.best.genome, Blob(0));
    }

    #[test]
    fn test_all_goals_covered_stops_search() {
        let mut engine = SearchEngine::new(
            config(StrategyConfig::MuPlusLambda { lambda: 10 }, generations(1000)),
            problem(true),
        )
        .unwrap();
        let result = engine.run().unwrap();

        assert_eq!(result.stats.stop_reason, StopReason::AllGoalsCovered);
        assert_eq!(result.stats.covered_goals, 1);
        assert_eq!(result.archive[&GoalId(0)].genome, Blob(0));
        assert_eq!(engine.archive_snapshot().len(), 1);
        // A single archived execution cannot be ambiguous.
        assert_eq!(engine.suite_ambiguity(), 0.0);
    }

    #[test]
    fn test_cancellation() {
        let mut engine = SearchEngine::new(
            config(StrategyConfig::default(), generations(100)),
            problem(false),
        )
        .unwrap();
        let cancel = engine.cancel_handle();

        // Cancel immediately
        cancel.store(true, Ordering::Relaxed);

        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 0);
    }

    #[test]
    fn test_evaluation_budget() {
        let stopping = vec![StoppingConditionConfig::MaxEvaluations { limit: 30 }];
        let mut engine = SearchEngine::new(
            config(StrategyConfig::MuCommaLambda { lambda: 10 }, stopping),
            problem(false),
        )
        .unwrap();
        let result = engine.run().unwrap();
        // 8 initial evaluations, then 10 per generation.
        assert_eq!(result.stats.stop_reason, StopReason::MaxEvaluations);
        assert_eq!(result.stats.total_evaluations, 38);
        assert_eq!(result.stats.generations, 3);
        assert_eq!(result.stats.tests_executed, 38);
    }

    #[test]
    fn test_one_plus_lambda_lambda_uses_single_parent() {
        let mut engine = SearchEngine::new(
            config(StrategyConfig::OnePlusLambdaLambda { lambda: 4 }, generations(3)),
            problem(false),
        )
        .unwrap();
        engine.initialize_population(20).unwrap();
        assert_eq!(engine.population().len(), 1);
        engine.evolve_one_generation().unwrap();
        assert_eq!(engine.population().len(), 1);
        assert_eq!(engine.strategy_name(), "1+(lambda,lambda)");
    }

    #[test]
    fn test_every_strategy_keeps_canonical_size() {
        let strategies = vec![
            StrategyConfig::MuCommaLambda { lambda: 10 },
            StrategyConfig::MuPlusLambda { lambda: 3 },
            StrategyConfig::StandardGa(GeneticAlgorithmConfig::default()),
            StrategyConfig::CellularGa(Default::default()),
            StrategyConfig::ManyObjective(Default::default()),
            StrategyConfig::NoveltySearch(NoveltySearchConfig::default()),
        ];
        for strategy in strategies {
            let problem = problem(false).with_novelty(Arc::new(KNearestNovelty::new(
                3,
                |a: &Blob, b: &Blob| a.0.abs_diff(b.0) as f64,
            )));
            let mut engine = SearchEngine::new(config(strategy, generations(6)), problem).unwrap();
            let result = engine.run().unwrap();
            assert_eq!(result.stats.generations, 6, "{}", engine.strategy_name());
            assert_eq!(engine.population().len(), 8, "{}", engine.strategy_name());
        }
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = || {
            let mut engine = SearchEngine::new(
                config(StrategyConfig::default(), generations(10)),
                problem(false),
            )
            .unwrap();
            engine.run().unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(a.best.genome, b.best.genome);
        assert_eq!(a.history.best_fitness, b.history.best_fitness);
        assert_eq!(a.stats.total_evaluations, b.stats.total_evaluations);
    }

    #[test]
    fn test_configuration_errors_at_construction() {
        let no_objectives = SearchProblem::new(
            Vec::new(),
            Vec::new(),
            Arc::new(SizeOracle),
            Arc::new(BlobFactory),
            Arc::new(Step),
        );
        assert!(matches!(
            SearchEngine::new(SearchConfig::default(), no_objectives),
            Err(SearchError::Config(ConfigError::NoObjectives))
        ));

        let novelty = config(
            StrategyConfig::NoveltySearch(NoveltySearchConfig::default()),
            generations(1),
        );
        assert!(matches!(
            SearchEngine::new(novelty, problem(false)),
            Err(SearchError::Config(ConfigError::MissingNoveltyMetric))
        ));

        let comma = config(StrategyConfig::MuCommaLambda { lambda: 4 }, generations(1));
        assert!(matches!(
            SearchEngine::new(comma, problem(false)),
            Err(SearchError::Config(ConfigError::LambdaBelowMu { lambda: 4, mu: 8 }))
        ));
    }

    #[test]
    fn test_initialize_rejects_size_conflicts() {
        let mut engine = SearchEngine::new(
            config(StrategyConfig::MuCommaLambda { lambda: 10 }, generations(1)),
            problem(false),
        )
        .unwrap();
        assert!(matches!(
            engine.initialize_population(0),
            Err(SearchError::Config(ConfigError::PopulationTooSmall))
        ));
        assert!(matches!(
            engine.initialize_population(11),
            Err(SearchError::Config(ConfigError::LambdaBelowMu { .. }))
        ));
        assert_eq!(engine.phase(), SearchPhase::Idle);
    }

    /// Crashes on every odd size.
    struct OddCrash;

    impl ExecutionOracle<Blob> for OddCrash {
        fn evaluate(
            &self,
            genome: &Blob,
            objectives: &[Objective],
        ) -> Result<Evaluation, OracleFailure> {
            if genome.0 % 2 == 1 {
                return Err(OracleFailure::Timeout);
            }
            SizeOracle.evaluate(genome, objectives)
        }

        fn coverage_vector(&self, genome: &Blob) -> BTreeSet<GoalId> {
            SizeOracle.coverage_vector(genome)
        }
    }

    #[test]
    fn test_oracle_failures_are_counted() {
        let problem = SearchProblem::new(
            vec![Objective::minimize(0, "size")],
            Vec::new(),
            Arc::new(OddCrash),
            Arc::new(BlobFactory),
            Arc::new(Step),
        );
        let mut engine = SearchEngine::new(
            config(StrategyConfig::MuPlusLambda { lambda: 20 }, generations(5)),
            problem,
        )
        .unwrap();
        let result = engine.run().unwrap();
        assert!(result.stats.oracle_failures > 0);
        assert!(result.stats.oracle_failures < result.stats.total_evaluations);
        assert!(!result.best.is_failed());
    }

    #[test]
    fn test_progress_reports_phase() {
        let mut engine = SearchEngine::new(
            config(StrategyConfig::default(), generations(2)),
            problem(true),
        )
        .unwrap();
        assert_eq!(engine.progress().phase, SearchPhase::Idle);
        engine.initialize_population(8).unwrap();
        let progress = engine.progress();
        assert_eq!(progress.phase, SearchPhase::Evolving);
        assert_eq!(progress.population_size, 8);
        assert_eq!(progress.total_goals, 1);
        assert_eq!(progress.evaluations, 8);
    }
}
