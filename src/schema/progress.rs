//! Progress and result types reported by a running search.

use serde::{Deserialize, Serialize};

/// Progress update emitted once per generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProgress {
    /// Completed generations.
    pub generation: usize,
    /// Lowest aggregated fitness seen so far (lower is better).
    pub best_fitness: f64,
    /// Average aggregated fitness of the current population.
    pub avg_fitness: f64,
    /// Best aggregated fitness in the current population.
    pub generation_best: f64,
    /// Number of goals covered so far.
    pub covered_goals: usize,
    /// Total number of goals.
    pub total_goals: usize,
    /// Oracle evaluations so far.
    pub evaluations: u64,
    /// Current population size.
    pub population_size: usize,
    /// Statistics history for plotting.
    pub history: SearchHistory,
    /// Current phase of the engine.
    pub phase: SearchPhase,
}

/// Per-generation statistics history.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchHistory {
    /// Best aggregated fitness per generation.
    pub best_fitness: Vec<f64>,
    /// Average aggregated fitness per generation.
    pub avg_fitness: Vec<f64>,
    /// Covered goal count per generation.
    pub covered_goals: Vec<usize>,
}

/// Lifecycle of the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SearchPhase {
    /// Created, no population yet.
    #[default]
    Idle,
    /// Building and evaluating the initial population.
    Initializing,
    /// Producing generations.
    Evolving,
    /// A stopping condition held at a generation boundary.
    Terminated,
}

/// Statistics from a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStats {
    /// Generations run.
    pub generations: usize,
    /// Oracle evaluations performed.
    pub total_evaluations: u64,
    /// Tests executed by the oracle.
    pub tests_executed: u64,
    /// Statements executed by the oracle.
    pub statements_executed: u64,
    /// Evaluations the oracle could not measure.
    pub oracle_failures: u64,
    /// Best aggregated fitness achieved.
    pub best_fitness: f64,
    /// Goals covered at the end of the run.
    pub covered_goals: usize,
    /// Total number of goals.
    pub total_goals: usize,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason the search stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Wall-clock budget exhausted.
    MaxTime,
    /// Evaluation budget exhausted.
    MaxEvaluations,
    /// Executed-test budget exhausted.
    MaxTests,
    /// Executed-statement budget exhausted.
    MaxStatements,
    /// Best fitness reached zero.
    ZeroFitness,
    /// Generation budget exhausted.
    MaxGenerations,
    /// No uncovered goals remain.
    AllGoalsCovered,
    /// Cancelled through the cancellation handle.
    Cancelled,
}
