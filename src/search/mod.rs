//! Evolutionary search for coverage-driven test generation.
//!
//! Candidate solutions are evolved against an execution oracle until every
//! coverage goal has a solution or a stopping condition triggers.
//!
//! # Overview
//!
//! The search system consists of:
//!
//! - **Individuals** (`individual`): Genomes with fitness, rank and crowding distance
//! - **Oracle** (`oracle`): Parallel evaluation and execution counters
//! - **Goal Archive** (`archive`): Best solution per goal, plus ambiguity scoring
//! - **Dominance** (`dominance`): Non-dominated sorting and crowding distance
//! - **Neighbourhoods** (`neighbourhood`): Toroidal grid topologies for cellular search
//! - **Operators** (`operators`): Selection and retrying variation
//! - **Secondary Objectives** (`secondary`): Tie-breaking and bloat control
//! - **Stopping** (`stopping`): Budget and goal-based termination
//! - **Strategies** (`strategy`): How one generation becomes the next
//! - **Engine** (`engine`): Lifecycle, progress reporting and cancellation
//!
//! # Example
//!
//! ```rust,no_run
//! use evo_search::bitcover::BitCoverageProblem;
//! use evo_search::schema::SearchConfig;
//! use evo_search::search::SearchEngine;
//!
//! let problem = BitCoverageProblem::new(32)
//!     .with_target(0, "10110")
//!     .with_target(12, "0001");
//!
//! let mut engine = SearchEngine::new(SearchConfig::default(), problem.build()).unwrap();
//! let result = engine.run_with_callback(|progress| {
//!     println!("Generation {}: best cost = {:.3}, goals {}/{}",
//!         progress.generation, progress.best_fitness,
//!         progress.covered_goals, progress.total_goals);
//! }).unwrap();
//!
//! println!("Covered {} goals", result.archive.len());
//! ```
//!
//! # Strategies
//!
//! - `MuLambda`: (μ,λ) and (μ+λ) mutation-only strategies
//! - `OnePlusLambdaLambda`: Single parent with mutation and crossover phases
//! - `StandardGa`: Elitist generational GA
//! - `CellularGa`: Mating restricted to grid neighbourhoods
//! - `ManyObjectiveGa`: Dominance ranking over the uncovered goals
//! - `NoveltySearch`: Rewards behavioural novelty with an adaptive archive

mod archive;
mod dominance;
mod engine;
mod individual;
mod neighbourhood;
mod operators;
mod oracle;
mod secondary;
mod stopping;
mod strategy;

pub use archive::{ArchiveEntry, GoalArchive, ambiguity, ambiguity_fitness, coverage_matrix};
pub use dominance::{
    Dominance, compare, compare_values, crowded_comparison, crowding_distance,
    non_dominated_sort,
};
pub use engine::{SearchEngine, SearchError, SearchProblem, SearchResult};
pub use individual::{
    EvaluationStatus, FitnessValues, Genome, Goal, GoalId, Individual, Objective, ObjectiveId,
    aggregate_cost, normalize,
};
pub use neighbourhood::NeighbourhoodGrid;
pub use operators::{Breeder, GenomeFactory, OperatorError, SearchRng, Variation, by_cost};
pub use oracle::{Evaluation, Evaluator, ExecutionCounters, ExecutionOracle, OracleFailure};
pub use secondary::{BloatControl, SecondaryObjectives};
pub use stopping::{SearchStatus, StoppingCondition, StoppingRegistry};
pub use strategy::{
    CellularGa, EvolutionStrategy, KNearestNovelty, ManyObjectiveGa, MuLambda, NoveltyMetric,
    NoveltySearch, OnePlusLambdaLambda, SearchContext, StandardGa, Strategy,
};
