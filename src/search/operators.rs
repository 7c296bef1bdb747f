//! Variation and selection operators.
//!
//! Crossover and mutation are supplied by the caller through [`Variation`];
//! the engine only guarantees the retry contract around them. A failed or
//! no-op attempt is rolled back and retried until the attempt budget runs out.

use std::cmp::Ordering;
use std::sync::Arc;

use rand::prelude::*;

use crate::schema::SelectionMethod;

use super::individual::{Genome, Individual};

/// Random number generator shared by all operators of one engine.
pub struct SearchRng {
    rng: StdRng,
}

impl SearchRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Uniform value in [0, 1).
    pub fn unit(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }

    /// Generate next u64 for seeding child RNGs.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }

    /// Access the underlying generator for operator implementations.
    pub fn inner(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

/// Construction failure reported by a variation operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperatorError {
    #[error("mutation failed: {0}")]
    Mutation(String),
    #[error("crossover failed: {0}")]
    Crossover(String),
}

/// Creates random genomes for the initial population.
pub trait GenomeFactory<G>: Send + Sync {
    fn create(&self, rng: &mut SearchRng) -> G;
}

/// Problem-specific crossover and mutation.
pub trait Variation<G>: Send + Sync {
    /// Mutate in place. `Ok(true)` if the genome changed.
    ///
    /// On error the genome may be left half-mutated; the caller restores it.
    fn mutate(&self, genome: &mut G, rng: &mut SearchRng) -> Result<bool, OperatorError>;

    /// Recombine two genomes in place.
    fn crossover(&self, first: &mut G, second: &mut G, rng: &mut SearchRng)
    -> Result<(), OperatorError>;
}

/// Applies variation operators with bounded retry.
pub struct Breeder<G> {
    variation: Arc<dyn Variation<G>>,
    max_attempts: usize,
}

impl<G: Genome> Breeder<G> {
    pub fn new(variation: Arc<dyn Variation<G>>, max_attempts: usize) -> Self {
        Self {
            variation,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Mutate until the genome changes.
    ///
    /// On success the individual is marked changed and its age set to
    /// `generation`. When the budget is exhausted the genome is left as it was
    /// before the first attempt and `false` is returned.
    pub fn mutate(&self, individual: &mut Individual<G>, rng: &mut SearchRng, generation: usize) -> bool {
        let original = individual.genome.clone();
        for attempt in 1..=self.max_attempts {
            match self.variation.mutate(&mut individual.genome, rng) {
                Ok(true) => {
                    individual.changed = true;
                    individual.age = generation;
                    return true;
                }
                Ok(false) => {}
                Err(err) => {
                    log::debug!(
                        "Mutation attempt {attempt} on individual {} failed: {err}",
                        individual.id
                    );
                    individual.genome = original.clone();
                }
            }
        }
        log::warn!(
            "Mutation of individual {} exhausted {} attempts; keeping parent genome",
            individual.id,
            self.max_attempts
        );
        individual.genome = original;
        false
    }

    /// Cross two individuals in place.
    ///
    /// Both are marked changed on success and record each other as parents.
    /// When the budget is exhausted both genomes are restored and `false` is
    /// returned.
    pub fn crossover(
        &self,
        first: &mut Individual<G>,
        second: &mut Individual<G>,
        rng: &mut SearchRng,
        generation: usize,
    ) -> bool {
        let (original_first, original_second) = (first.genome.clone(), second.genome.clone());
        for attempt in 1..=self.max_attempts {
            match self
                .variation
                .crossover(&mut first.genome, &mut second.genome, rng)
            {
                Ok(()) => {
                    let (a, b) = (parent_of(first), parent_of(second));
                    for (individual, other) in [(&mut *first, b), (&mut *second, a)] {
                        individual.changed = true;
                        individual.age = generation;
                        if let Some(other) = other
                            && !individual.parents.contains(&other)
                        {
                            individual.parents.push(other);
                        }
                    }
                    return true;
                }
                Err(err) => {
                    log::debug!(
                        "Crossover attempt {attempt} of {} x {} failed: {err}",
                        first.id,
                        second.id
                    );
                    first.genome = original_first.clone();
                    second.genome = original_second.clone();
                }
            }
        }
        log::warn!(
            "Crossover of {} x {} exhausted {} attempts; keeping parent genomes",
            first.id,
            second.id,
            self.max_attempts
        );
        false
    }
}

fn parent_of<G>(individual: &Individual<G>) -> Option<u64> {
    individual.parents.first().copied()
}

// ============================================================================
// Selection
// ============================================================================

/// Order by aggregated cost, lower first.
pub fn by_cost<G>(a: &Individual<G>, b: &Individual<G>) -> Ordering {
    a.cost.total_cmp(&b.cost)
}

impl SelectionMethod {
    /// Select a parent index. `better(a, b) == Less` means `a` is fitter.
    ///
    /// Returns `None` for an empty population.
    pub fn select_index<G, F>(
        &self,
        population: &[Individual<G>],
        rng: &mut SearchRng,
        better: F,
    ) -> Option<usize>
    where
        F: Fn(&Individual<G>, &Individual<G>) -> Ordering,
    {
        if population.is_empty() {
            return None;
        }
        Some(self.select_position(population.len(), |i| &population[i], rng, better))
    }

    /// Select among the population indices in `members` only.
    ///
    /// Returns `None` when `members` is empty. Out-of-range members are a bug
    /// in the caller and panic.
    pub fn select_from<G, F>(
        &self,
        population: &[Individual<G>],
        members: &[usize],
        rng: &mut SearchRng,
        better: F,
    ) -> Option<usize>
    where
        F: Fn(&Individual<G>, &Individual<G>) -> Ordering,
    {
        if members.is_empty() {
            return None;
        }
        let position =
            self.select_position(members.len(), |i| &population[members[i]], rng, better);
        Some(members[position])
    }

    fn select_position<'a, G: 'a, A, F>(&self, n: usize, at: A, rng: &mut SearchRng, better: F) -> usize
    where
        A: Fn(usize) -> &'a Individual<G>,
        F: Fn(&Individual<G>, &Individual<G>) -> Ordering,
    {
        match self {
            SelectionMethod::Tournament { size } => {
                let mut best = rng.index(n);
                for _ in 1..(*size).max(1) {
                    let challenger = rng.index(n);
                    if better(at(challenger), at(best)) == Ordering::Less {
                        best = challenger;
                    }
                }
                best
            }
            SelectionMethod::RankBased { bias } => {
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by(|&a, &b| better(at(a), at(b)));
                order[rank_position(n, *bias, rng.unit())]
            }
            SelectionMethod::RouletteWheel => {
                // Weight 1 / (1 + level), where level counts the distinct
                // strictly better positions under `better`.
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by(|&a, &b| better(at(a), at(b)));
                let mut weights = vec![0.0; n];
                let mut level = 0usize;
                for (position, &i) in order.iter().enumerate() {
                    if position > 0 && better(at(order[position - 1]), at(i)) == Ordering::Less {
                        level += 1;
                    }
                    weights[i] = 1.0 / (1.0 + level as f64);
                }
                let total: f64 = weights.iter().sum();
                let target = rng.unit() * total;
                let mut cumulative = 0.0;
                for (i, weight) in weights.iter().enumerate() {
                    cumulative += weight;
                    if cumulative > target {
                        return i;
                    }
                }
                n - 1
            }
        }
    }
}

/// Position in a best-first ordering for linear rank selection.
fn rank_position(n: usize, bias: f64, r: f64) -> usize {
    if bias <= 1.0 {
        return ((r * n as f64) as usize).min(n - 1);
    }
    let d = bias * bias - 4.0 * (bias - 1.0) * r;
    let position = n as f64 * (bias - d.max(0.0).sqrt()) / (2.0 * (bias - 1.0));
    (position as usize).min(n - 1)
}
