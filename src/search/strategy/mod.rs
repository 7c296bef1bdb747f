//! Evolutionary strategies.
//!
//! Every strategy works on a shared [`SearchContext`] holding the population,
//! the goal archive, the evaluator and the injected helpers (selection,
//! variation, bloat control, secondary objectives). A strategy only decides how
//! one generation turns the current population into the next one.

mod cellular;
mod many_objective;
mod mu_lambda;
mod novelty;
mod one_plus_lambda_lambda;
mod standard;

use std::cmp::Ordering;
use std::sync::Arc;

use crate::schema::{ConfigError, NeighbourhoodShape, SelectionMethod, StrategyConfig};

use super::archive::GoalArchive;
use super::individual::{Genome, Individual, Objective};
use super::operators::{Breeder, GenomeFactory, SearchRng};
use super::oracle::Evaluator;
use super::secondary::{BloatControl, SecondaryObjectives};

pub use cellular::CellularGa;
pub use many_objective::ManyObjectiveGa;
pub use mu_lambda::MuLambda;
pub use novelty::{KNearestNovelty, NoveltyMetric, NoveltySearch};
pub use one_plus_lambda_lambda::OnePlusLambdaLambda;
pub use standard::StandardGa;

/// State shared by all strategies.
pub struct SearchContext<G> {
    /// Current population, size restored to `population_size` every generation.
    pub population: Vec<Individual<G>>,
    /// Canonical population size.
    pub population_size: usize,
    /// Completed generations.
    pub generation: usize,
    pub rng: SearchRng,
    pub archive: GoalArchive<G>,
    pub evaluator: Evaluator<G>,
    pub breeder: Breeder<G>,
    pub factory: Arc<dyn GenomeFactory<G>>,
    pub selection: SelectionMethod,
    pub bloat: BloatControl,
    pub secondary: SecondaryObjectives,
    pub neighbourhood: NeighbourhoodShape,
    next_id: u64,
}

impl<G: Genome> SearchContext<G> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rng: SearchRng,
        archive: GoalArchive<G>,
        evaluator: Evaluator<G>,
        breeder: Breeder<G>,
        factory: Arc<dyn GenomeFactory<G>>,
        selection: SelectionMethod,
        bloat: BloatControl,
        secondary: SecondaryObjectives,
        neighbourhood: NeighbourhoodShape,
    ) -> Self {
        Self {
            population: Vec::new(),
            population_size: 0,
            generation: 0,
            rng,
            archive,
            evaluator,
            breeder,
            factory,
            selection,
            bloat,
            secondary,
            neighbourhood,
            next_id: 0,
        }
    }

    /// Allocate a fresh individual ID.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Replace the population with `population_size` new, evaluated individuals.
    pub fn fill_population(&mut self) {
        self.population.clear();
        for _ in 0..self.population_size {
            let genome = self.factory.create(&mut self.rng);
            let id = self.next_id();
            self.population
                .push(Individual::new(id, genome, self.generation));
        }
        self.evaluate_population();
    }

    /// Evaluate a batch of offspring.
    pub fn evaluate(&self, batch: &mut [Individual<G>]) {
        self.evaluator.evaluate_batch(batch, &self.archive);
    }

    /// Evaluate every individual of the population that needs it.
    pub fn evaluate_population(&mut self) {
        self.evaluator
            .evaluate_batch(&mut self.population, &self.archive);
    }

    /// Stable sort by cost, then secondary objectives.
    pub fn sort_population(&mut self) {
        let secondary = &self.secondary;
        self.population
            .sort_by(|a, b| secondary.compare_individuals(a, b));
    }

    /// Sort any pool the same way as the population.
    pub fn sort(&self, pool: &mut [Individual<G>]) {
        pool.sort_by(|a, b| self.secondary.compare_individuals(a, b));
    }

    /// Best individual of the population; the first one wins ties.
    pub fn best(&self) -> Option<&Individual<G>> {
        best_of(&self.population, &self.secondary)
    }

    /// Index of the best individual of `pool`.
    pub fn best_index(&self, pool: &[Individual<G>]) -> Option<usize> {
        pool.iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| self.secondary.compare_individuals(a, b))
            .map(|(i, _)| i)
    }

    /// Ordering used for selection: cost, then secondary objectives.
    pub fn compare(&self, a: &Individual<G>, b: &Individual<G>) -> Ordering {
        self.secondary.compare_individuals(a, b)
    }

    /// Prepare per-generation helpers before a strategy runs.
    pub fn begin_generation(&mut self) {
        let best = best_of(&self.population, &self.secondary);
        self.bloat.begin_generation(best);
    }

    /// Select a parent from the whole population.
    pub fn select(&mut self) -> Option<usize> {
        let secondary = &self.secondary;
        self.selection
            .select_index(&self.population, &mut self.rng, |a, b| {
                secondary.compare_individuals(a, b)
            })
    }

    /// Select a parent with a custom fitness order.
    pub fn select_by<F>(&mut self, better: F) -> Option<usize>
    where
        F: Fn(&Individual<G>, &Individual<G>) -> Ordering,
    {
        self.selection
            .select_index(&self.population, &mut self.rng, better)
    }

    /// Select a parent among the given population indices.
    pub fn select_from(&mut self, members: &[usize]) -> Option<usize> {
        let secondary = &self.secondary;
        self.selection
            .select_from(&self.population, members, &mut self.rng, |a, b| {
                secondary.compare_individuals(a, b)
            })
    }

    /// Unchanged copy of `population[index]` under a new ID.
    pub fn spawn(&mut self, index: usize) -> Individual<G> {
        let id = self.next_id();
        self.population[index].offspring(id)
    }

    /// Mutate with retry; see [`Breeder::mutate`].
    pub fn mutate(&mut self, individual: &mut Individual<G>) -> bool {
        self.breeder
            .mutate(individual, &mut self.rng, self.generation)
    }

    /// Cross with retry; see [`Breeder::crossover`].
    pub fn crossover(&mut self, first: &mut Individual<G>, second: &mut Individual<G>) -> bool {
        self.breeder
            .crossover(first, second, &mut self.rng, self.generation)
    }

    /// Objectives of the goals still uncovered, or all objectives when no goal
    /// is active.
    pub fn active_objectives(&self) -> Vec<Objective> {
        let all = self.evaluator.objectives();
        let goals = self.archive.active_goals();
        let active: Vec<Objective> = all
            .iter()
            .filter(|objective| goals.iter().any(|goal| goal.objective == objective.id))
            .cloned()
            .collect();
        if active.is_empty() {
            all.to_vec()
        } else {
            active
        }
    }
}

fn best_of<'a, G: Genome>(
    population: &'a [Individual<G>],
    secondary: &SecondaryObjectives,
) -> Option<&'a Individual<G>> {
    population
        .iter()
        .min_by(|a, b| secondary.compare_individuals(a, b))
}

/// A generational replacement scheme.
pub trait EvolutionStrategy<G: Genome> {
    /// Short human readable name.
    fn name(&self) -> &'static str;

    /// Canonical population size for a requested size.
    fn canonical_size(&self, requested: usize) -> Result<usize, ConfigError> {
        Ok(requested)
    }

    /// Called once after the initial population has been evaluated.
    fn initialize(&mut self, _ctx: &mut SearchContext<G>) {}

    /// Turn the current population into the next one.
    fn evolve_one_generation(&mut self, ctx: &mut SearchContext<G>);
}

/// The closed set of strategies, selected at construction time.
pub enum Strategy<G> {
    MuLambda(MuLambda),
    OnePlusLambdaLambda(OnePlusLambdaLambda),
    Novelty(NoveltySearch<G>),
    Standard(StandardGa),
    Cellular(CellularGa),
    ManyObjective(ManyObjectiveGa),
}

impl<G: Genome> Strategy<G> {
    /// Build the configured strategy. Novelty search requires `novelty`.
    pub fn from_config(
        config: &StrategyConfig,
        novelty: Option<Arc<dyn NoveltyMetric<G>>>,
    ) -> Result<Self, ConfigError> {
        Ok(match config {
            StrategyConfig::MuCommaLambda { lambda } => {
                Self::MuLambda(MuLambda::comma(*lambda))
            }
            StrategyConfig::MuPlusLambda { lambda } => Self::MuLambda(MuLambda::plus(*lambda)),
            StrategyConfig::OnePlusLambdaLambda { lambda } => {
                Self::OnePlusLambdaLambda(OnePlusLambdaLambda::new(*lambda))
            }
            StrategyConfig::NoveltySearch(novelty_config) => {
                let metric = novelty.ok_or(ConfigError::MissingNoveltyMetric)?;
                Self::Novelty(NoveltySearch::new(novelty_config, metric))
            }
            StrategyConfig::StandardGa(ga) => Self::Standard(StandardGa::new(ga)),
            StrategyConfig::CellularGa(cellular) => Self::Cellular(CellularGa::new(cellular)),
            StrategyConfig::ManyObjective(many) => {
                Self::ManyObjective(ManyObjectiveGa::new(many))
            }
        })
    }

    fn inner(&mut self) -> &mut dyn EvolutionStrategy<G> {
        match self {
            Self::MuLambda(s) => s,
            Self::OnePlusLambdaLambda(s) => s,
            Self::Novelty(s) => s,
            Self::Standard(s) => s,
            Self::Cellular(s) => s,
            Self::ManyObjective(s) => s,
        }
    }

    fn inner_ref(&self) -> &dyn EvolutionStrategy<G> {
        match self {
            Self::MuLambda(s) => s,
            Self::OnePlusLambdaLambda(s) => s,
            Self::Novelty(s) => s,
            Self::Standard(s) => s,
            Self::Cellular(s) => s,
            Self::ManyObjective(s) => s,
        }
    }
}

impl<G: Genome> EvolutionStrategy<G> for Strategy<G> {
    fn name(&self) -> &'static str {
        self.inner_ref().name()
    }

    fn canonical_size(&self, requested: usize) -> Result<usize, ConfigError> {
        self.inner_ref().canonical_size(requested)
    }

    fn initialize(&mut self, ctx: &mut SearchContext<G>) {
        self.inner().initialize(ctx);
    }

    fn evolve_one_generation(&mut self, ctx: &mut SearchContext<G>) {
        self.inner().evolve_one_generation(ctx);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::{BloatConfig, SecondaryObjectiveKind};
    use crate::search::individual::tests::Blob;
    use crate::search::individual::{Goal, GoalId, ObjectiveId};
    use crate::search::operators::{OperatorError, Variation};
    use crate::search::oracle::{Evaluation, ExecutionOracle, OracleFailure};
    use std::collections::BTreeSet;

    /// Fitness is the blob size; size 0 covers goal 0.
    pub struct SizeOracle;

    impl ExecutionOracle<Blob> for SizeOracle {
        fn evaluate(
            &self,
            genome: &Blob,
            objectives: &[Objective],
        ) -> Result<Evaluation, OracleFailure> {
            Ok(Evaluation::new(
                objectives
                    .iter()
                    .map(|o| (o.id, genome.0 as f64))
                    .collect(),
            ))
        }

        fn coverage_vector(&self, genome: &Blob) -> BTreeSet<GoalId> {
            if genome.0 == 0 {
                BTreeSet::from([GoalId(0)])
            } else {
                BTreeSet::new()
            }
        }
    }

    /// Sizes drawn from 10..40.
    pub struct BlobFactory;

    impl GenomeFactory<Blob> for BlobFactory {
        fn create(&self, rng: &mut SearchRng) -> Blob {
            Blob(10 + rng.index(30))
        }
    }

    /// Mutation moves the size by ±1..3; crossover averages.
    pub struct Step;

    impl Variation<Blob> for Step {
        fn mutate(&self, genome: &mut Blob, rng: &mut SearchRng) -> Result<bool, OperatorError> {
            let delta = 1 + rng.index(3);
            genome.0 = if rng.chance(0.6) {
                genome.0.saturating_sub(delta)
            } else {
                genome.0 + delta
            };
            Ok(true)
        }

        fn crossover(
            &self,
            first: &mut Blob,
            second: &mut Blob,
            _rng: &mut SearchRng,
        ) -> Result<(), OperatorError> {
            let sum = first.0 + second.0;
            first.0 = sum / 2;
            second.0 = sum - sum / 2;
            Ok(())
        }
    }

    pub fn context(size: usize, seed: u64) -> SearchContext<Blob> {
        let objectives = vec![Objective::minimize(0, "size")];
        let mut ctx = SearchContext::new(
            SearchRng::new(seed),
            GoalArchive::new(vec![Goal::new(0, ObjectiveId(0), "empty")]),
            Evaluator::new(Arc::new(SizeOracle), objectives),
            Breeder::new(Arc::new(Step), 10),
            Arc::new(BlobFactory),
            SelectionMethod::default(),
            BloatControl::new(&BloatConfig::default()),
            SecondaryObjectives::new(vec![SecondaryObjectiveKind::TotalLength]),
            NeighbourhoodShape::default(),
        );
        ctx.population_size = size;
        ctx.fill_population();
        ctx
    }

    #[test]
    fn test_fill_population_evaluates() {
        let ctx = context(6, 1);
        assert_eq!(ctx.population.len(), 6);
        assert!(ctx.population.iter().all(|i| !i.needs_evaluation()));
        assert_eq!(ctx.evaluator.counters().evaluations(), 6);
        let ids: BTreeSet<u64> = ctx.population.iter().map(|i| i.id).collect();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_sort_and_best_agree() {
        let mut ctx = context(8, 2);
        let best_id = ctx.best().unwrap().id;
        ctx.sort_population();
        assert_eq!(ctx.population[0].id, best_id);
        for pair in ctx.population.windows(2) {
            assert!(pair[0].cost <= pair[1].cost);
        }
    }

    #[test]
    fn test_active_objectives_fall_back_to_all() {
        let mut ctx = context(2, 3);
        assert_eq!(ctx.active_objectives().len(), 1);
        let mut winner = ctx.spawn(0);
        winner.genome = Blob(0);
        winner.changed = true;
        ctx.evaluate(std::slice::from_mut(&mut winner));
        assert!(ctx.archive.all_covered());
        assert_eq!(ctx.active_objectives().len(), 1);
    }

    #[test]
    fn test_strategy_from_config_requires_metric_for_novelty() {
        let config = StrategyConfig::NoveltySearch(Default::default());
        assert!(matches!(
            Strategy::<Blob>::from_config(&config, None),
            Err(ConfigError::MissingNoveltyMetric)
        ));
        let ga = Strategy::<Blob>::from_config(&StrategyConfig::default(), None).unwrap();
        assert_eq!(ga.name(), "standard-ga");
    }
}
