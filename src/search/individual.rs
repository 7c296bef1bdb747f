//! Candidate solutions and the fitness bookkeeping the engine attaches to them.
//!
//! The engine never looks inside a genome beyond the size metrics exposed by
//! [`Genome`]. Everything it needs to rank, archive and select candidates is
//! kept on the [`Individual`] wrapper.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::oracle::OracleFailure;

/// Identifies a fitness function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectiveId(pub u32);

/// Identifies a coverage goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GoalId(pub u32);

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "goal-{}", self.0)
    }
}

/// Raw fitness values keyed by objective.
pub type FitnessValues = BTreeMap<ObjectiveId, f64>;

/// Map a non-negative fitness value into [0, 1].
///
/// NaN and +inf map to 1.0, negative values to 0.0.
pub fn normalize(value: f64) -> f64 {
    if value.is_nan() || value == f64::INFINITY {
        return 1.0;
    }
    let value = value.max(0.0);
    value / (value + 1.0)
}

/// A fitness function scored by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: ObjectiveId,
    pub name: String,
    /// Higher values are better when set.
    pub maximize: bool,
}

impl Objective {
    pub fn minimize(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: ObjectiveId(id),
            name: name.into(),
            maximize: false,
        }
    }

    pub fn maximize(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: ObjectiveId(id),
            name: name.into(),
            maximize: true,
        }
    }

    /// Worst raw value under this objective's direction.
    pub fn worst(&self) -> f64 {
        if self.maximize {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }
    }

    /// Whether `a` is strictly better than `b`. NaN is never better.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        let (a, b) = (self.sanitize(a), self.sanitize(b));
        if self.maximize { a > b } else { a < b }
    }

    /// Normalized cost in [0, 1]; lower is better in both directions.
    pub fn cost(&self, value: f64) -> f64 {
        let normalized = normalize(value);
        if self.maximize {
            if value.is_nan() { 1.0 } else { 1.0 - normalized }
        } else {
            normalized
        }
    }

    fn sanitize(&self, value: f64) -> f64 {
        if value.is_nan() { self.worst() } else { value }
    }
}

/// A coverage target (branch, line, mutant, ...).
///
/// The goal's distance is read from the fitness value of `objective`; a
/// distance of 0 means the goal is covered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub objective: ObjectiveId,
    pub name: String,
}

impl Goal {
    pub fn new(id: u32, objective: ObjectiveId, name: impl Into<String>) -> Self {
        Self {
            id: GoalId(id),
            objective,
            name: name.into(),
        }
    }
}

/// Size metrics of a candidate the engine needs for bloat control and
/// secondary objectives.
pub trait Genome: Clone + Send + Sync {
    /// Total size (e.g. number of statements).
    fn size(&self) -> usize;

    /// Number of independent units (e.g. tests).
    fn unit_count(&self) -> usize {
        1
    }

    /// Size of the largest unit.
    fn max_unit_length(&self) -> usize {
        self.size()
    }

    /// Exceptions raised the last time this genome was executed.
    fn exception_count(&self) -> usize {
        0
    }
}

/// Outcome of the last oracle call for an individual.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EvaluationStatus {
    /// Never evaluated.
    #[default]
    Pending,
    /// Fitness values are current.
    Evaluated,
    /// The oracle could not measure this individual; fitness is worst-case.
    Failed(OracleFailure),
}

/// A candidate solution in the population.
#[derive(Debug, Clone)]
pub struct Individual<G> {
    /// Unique identifier.
    pub id: u64,
    /// The candidate itself.
    pub genome: G,
    /// Raw fitness per objective.
    pub fitness: FitnessValues,
    /// Aggregated normalized fitness; lower is better, +inf until evaluated.
    pub cost: f64,
    /// Front index from dominance ranking (0 = best).
    pub rank: usize,
    /// Crowding or novelty distance.
    pub distance: f64,
    /// Generation of the last structural change.
    pub age: usize,
    /// Set by crossover/mutation, cleared once the oracle has scored it.
    pub changed: bool,
    /// Result of the last oracle call.
    pub status: EvaluationStatus,
    /// Parent IDs.
    pub parents: Vec<u64>,
}

impl<G: Genome> Individual<G> {
    /// Wrap a freshly created genome.
    pub fn new(id: u64, genome: G, generation: usize) -> Self {
        Self {
            id,
            genome,
            fitness: FitnessValues::new(),
            cost: f64::INFINITY,
            rank: 0,
            distance: f64::INFINITY,
            age: generation,
            changed: true,
            status: EvaluationStatus::Pending,
            parents: Vec::new(),
        }
    }

    /// Independent copy with a new ID that records `self` as its parent.
    pub fn offspring(&self, id: u64) -> Self {
        let mut child = self.clone();
        child.id = id;
        child.parents = vec![self.id];
        child.changed = false;
        child
    }

    /// Raw value for an objective, or the objective's worst value if missing.
    pub fn value(&self, objective: &Objective) -> f64 {
        self.fitness
            .get(&objective.id)
            .copied()
            .filter(|v| !v.is_nan())
            .unwrap_or_else(|| objective.worst())
    }

    /// Whether the individual needs an oracle call before its fitness is usable.
    pub fn needs_evaluation(&self) -> bool {
        self.changed || self.status == EvaluationStatus::Pending
    }

    /// Whether the last oracle call failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.status, EvaluationStatus::Failed(_))
    }

    /// Recompute `cost` from raw fitness.
    pub fn aggregate(&mut self, objectives: &[Objective]) {
        self.cost = aggregate_cost(&self.fitness, objectives);
    }
}

/// Sum of normalized per-objective costs.
pub fn aggregate_cost(fitness: &FitnessValues, objectives: &[Objective]) -> f64 {
    objectives
        .iter()
        .map(|objective| match fitness.get(&objective.id) {
            Some(value) => objective.cost(*value),
            None => 1.0,
        })
        .sum()
}
