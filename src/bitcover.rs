//! Bit-pattern coverage problem.
//!
//! A small, fully deterministic stand-in for a program under test. Candidates
//! are variable-length bit vectors; each goal is a bit pattern that must
//! appear at a fixed offset. The distance to a goal is the number of
//! mismatching bits, with bits past the end of the vector counting as
//! mismatches. It drives the CLI and the end-to-end tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::search::{
    Evaluation, ExecutionOracle, GenomeFactory, Genome, Goal, GoalId, KNearestNovelty, Objective,
    OperatorError, OracleFailure, SearchProblem, SearchRng, Variation,
};

/// Variable-length bit string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitVector(pub Vec<bool>);

impl BitVector {
    /// Parse a string of `0`/`1` characters; anything else is skipped.
    pub fn parse(pattern: &str) -> Self {
        Self(
            pattern
                .chars()
                .filter_map(|c| match c {
                    '0' => Some(false),
                    '1' => Some(true),
                    _ => None,
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for BitVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for bit in &self.0 {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl Genome for BitVector {
    fn size(&self) -> usize {
        self.0.len()
    }
}

/// Hamming distance over the common prefix plus the length difference.
pub fn hamming_distance(a: &BitVector, b: &BitVector) -> f64 {
    let mismatches = a.0.iter().zip(&b.0).filter(|(x, y)| x != y).count();
    (mismatches + a.len().abs_diff(b.len())) as f64
}

/// A pattern that must appear at `offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPattern {
    pub offset: usize,
    /// `0`/`1` characters.
    pub pattern: String,
}

impl TargetPattern {
    /// Mismatching bits of `genome` against this pattern.
    pub fn distance(&self, genome: &BitVector) -> usize {
        BitVector::parse(&self.pattern)
            .0
            .iter()
            .enumerate()
            .filter(|&(i, bit)| genome.0.get(self.offset + i) != Some(bit))
            .count()
    }
}

/// Executes bit vectors against the target patterns.
#[derive(Debug, Clone)]
pub struct BitCoverageOracle {
    targets: Vec<TargetPattern>,
    max_length: usize,
}

impl BitCoverageOracle {
    pub fn new(targets: Vec<TargetPattern>, max_length: usize) -> Self {
        Self {
            targets,
            max_length,
        }
    }
}

impl ExecutionOracle<BitVector> for BitCoverageOracle {
    fn evaluate(
        &self,
        genome: &BitVector,
        objectives: &[Objective],
    ) -> Result<Evaluation, OracleFailure> {
        if genome.len() > self.max_length {
            return Err(OracleFailure::ResourceExhausted(format!(
                "{} bits exceed the limit of {}",
                genome.len(),
                self.max_length
            )));
        }

        let values = objectives
            .iter()
            .filter_map(|objective| {
                let target = self.targets.get(objective.id.0 as usize)?;
                Some((objective.id, target.distance(genome) as f64))
            })
            .collect();
        Ok(Evaluation::new(values).with_statements(genome.len() as u64))
    }

    fn coverage_vector(&self, genome: &BitVector) -> BTreeSet<GoalId> {
        self.targets
            .iter()
            .enumerate()
            .filter(|(_, target)| target.distance(genome) == 0)
            .map(|(i, _)| GoalId(i as u32))
            .collect()
    }
}

/// Uniformly random bit vectors with length in `min_length..=max_length`.
#[derive(Debug, Clone)]
pub struct BitFactory {
    min_length: usize,
    max_length: usize,
}

impl GenomeFactory<BitVector> for BitFactory {
    fn create(&self, rng: &mut SearchRng) -> BitVector {
        let span = self.max_length.saturating_sub(self.min_length) + 1;
        let length = self.min_length + rng.index(span);
        BitVector((0..length).map(|_| rng.chance(0.5)).collect())
    }
}

/// Bit flips, growth and shrinkage, single-point crossover.
#[derive(Debug, Clone)]
pub struct BitVariation {
    max_length: usize,
}

impl Variation<BitVector> for BitVariation {
    fn mutate(&self, genome: &mut BitVector, rng: &mut SearchRng) -> Result<bool, OperatorError> {
        let roll = rng.unit();
        if roll < 0.8 && !genome.is_empty() {
            let i = rng.index(genome.len());
            genome.0[i] = !genome.0[i];
            Ok(true)
        } else if roll < 0.9 && genome.len() < self.max_length {
            genome.0.push(rng.chance(0.5));
            Ok(true)
        } else {
            Ok(genome.0.pop().is_some())
        }
    }

    fn crossover(
        &self,
        first: &mut BitVector,
        second: &mut BitVector,
        rng: &mut SearchRng,
    ) -> Result<(), OperatorError> {
        let shortest = first.len().min(second.len());
        if shortest < 2 {
            return Err(OperatorError::Crossover(format!(
                "parents of length {} and {} are too short",
                first.len(),
                second.len()
            )));
        }
        let cut = 1 + rng.index(shortest - 1);
        let tail_first = first.0.split_off(cut);
        let tail_second = second.0.split_off(cut);
        first.0.extend(tail_second);
        second.0.extend(tail_first);
        Ok(())
    }
}

/// Serializable description of a bit-pattern coverage problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitCoverageProblem {
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Neighbours averaged by the novelty metric.
    #[serde(default = "default_novelty_neighbours")]
    pub novelty_neighbours: usize,
    #[serde(default)]
    pub targets: Vec<TargetPattern>,
}

fn default_min_length() -> usize {
    4
}
fn default_max_length() -> usize {
    64
}
fn default_novelty_neighbours() -> usize {
    5
}

impl Default for BitCoverageProblem {
    fn default() -> Self {
        Self::new(default_max_length())
            .with_target(0, "1011")
            .with_target(8, "11110000")
            .with_target(20, "010101")
            .with_target(40, "1100110011")
    }
}

impl BitCoverageProblem {
    /// Problem without targets.
    pub fn new(max_length: usize) -> Self {
        Self {
            min_length: default_min_length().min(max_length),
            max_length,
            novelty_neighbours: default_novelty_neighbours(),
            targets: Vec::new(),
        }
    }

    pub fn with_target(mut self, offset: usize, pattern: &str) -> Self {
        self.targets.push(TargetPattern {
            offset,
            pattern: pattern.to_string(),
        });
        self
    }

    /// One minimized objective and one goal per target.
    ///
    /// A `min_length` above `max_length` is clamped down to it.
    pub fn build(&self) -> SearchProblem<BitVector> {
        let objectives = self
            .targets
            .iter()
            .enumerate()
            .map(|(i, target)| {
                Objective::minimize(i as u32, format!("{}@{}", target.pattern, target.offset))
            })
            .collect::<Vec<_>>();
        let goals = objectives
            .iter()
            .map(|objective| Goal::new(objective.id.0, objective.id, objective.name.clone()))
            .collect();

        SearchProblem::new(
            objectives,
            goals,
            Arc::new(BitCoverageOracle::new(
                self.targets.clone(),
                self.max_length,
            )),
            Arc::new(BitFactory {
                min_length: self.min_length.min(self.max_length),
                max_length: self.max_length,
            }),
            Arc::new(BitVariation {
                max_length: self.max_length,
            }),
        )
        .with_novelty(Arc::new(KNearestNovelty::new(
            self.novelty_neighbours,
            hamming_distance,
        )))
    }
}
