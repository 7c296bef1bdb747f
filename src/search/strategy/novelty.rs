//! Novelty search.
//!
//! Individuals are rewarded for behaving differently from the population and
//! from a separate novelty archive, not for their fitness. The archive
//! admission threshold `P_min` adapts to how many individuals pass it each
//! generation and is owned by the strategy instance.

use std::sync::Arc;

use crate::schema::NoveltySearchConfig;
use crate::search::individual::{Genome, Individual};

use super::{EvolutionStrategy, SearchContext};

/// Raise `P_min` when more than this many individuals pass in a generation.
const RAISE_ABOVE: usize = 25;
/// Lower `P_min` when fewer than this many individuals pass.
const LOWER_BELOW: usize = 10;

/// Scores how novel an individual is.
pub trait NoveltyMetric<G>: Send + Sync {
    /// Novelty of `individual` relative to `population` and `archive`.
    /// Higher is more novel.
    fn novelty(
        &self,
        individual: &Individual<G>,
        population: &[Individual<G>],
        archive: &[Individual<G>],
    ) -> f64;
}

/// Mean distance to the `k` nearest other individuals.
pub struct KNearestNovelty<G> {
    k: usize,
    distance: fn(&G, &G) -> f64,
}

impl<G> KNearestNovelty<G> {
    pub fn new(k: usize, distance: fn(&G, &G) -> f64) -> Self {
        Self {
            k: k.max(1),
            distance,
        }
    }
}

impl<G: Send + Sync> NoveltyMetric<G> for KNearestNovelty<G> {
    fn novelty(
        &self,
        individual: &Individual<G>,
        population: &[Individual<G>],
        archive: &[Individual<G>],
    ) -> f64 {
        let mut distances: Vec<f64> = population
            .iter()
            .chain(archive)
            .filter(|other| other.id != individual.id)
            .map(|other| (self.distance)(&individual.genome, &other.genome))
            .collect();

        // Nothing to compare against yet: maximally novel.
        if distances.is_empty() {
            return 1.0;
        }

        distances.sort_by(f64::total_cmp);
        let k = self.k.min(distances.len());
        distances[..k].iter().sum::<f64>() / k as f64
    }
}

/// Novelty search with an adaptive archive threshold.
pub struct NoveltySearch<G> {
    metric: Arc<dyn NoveltyMetric<G>>,
    threshold: f64,
    crossover_rate: f64,
    max_archive_size: usize,
    archive: Vec<Individual<G>>,
}

impl<G: Genome> NoveltySearch<G> {
    pub fn new(config: &NoveltySearchConfig, metric: Arc<dyn NoveltyMetric<G>>) -> Self {
        Self {
            metric,
            threshold: config.novelty_threshold,
            crossover_rate: config.crossover_rate,
            max_archive_size: config.max_archive_size,
            archive: Vec::new(),
        }
    }

    /// Current admission threshold `P_min`.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Novelty archive, most novel first.
    pub fn archive(&self) -> &[Individual<G>] {
        &self.archive
    }

    /// Adapt `P_min` to the number of individuals that passed it.
    pub fn adapt_threshold(&mut self, passed: usize) {
        if passed > RAISE_ABOVE {
            self.threshold *= 1.25;
        } else if passed < LOWER_BELOW {
            self.threshold = (self.threshold * 0.85).max(0.0);
        }
    }

    /// Write novelty into each individual's `distance`.
    fn score(&self, population: &mut [Individual<G>]) {
        let scores: Vec<f64> = population
            .iter()
            .map(|individual| self.metric.novelty(individual, population, &self.archive))
            .collect();
        for (individual, score) in population.iter_mut().zip(scores) {
            individual.distance = score;
        }
    }

    /// Admit individuals at or above `P_min`, adapt it, and keep the archive
    /// sorted and bounded.
    fn update_archive(&mut self, population: &[Individual<G>]) {
        let passed: Vec<&Individual<G>> = population
            .iter()
            .filter(|individual| individual.distance >= self.threshold)
            .collect();
        let count = passed.len();
        self.archive.extend(passed.into_iter().cloned());
        self.adapt_threshold(count);

        sort_by_novelty(&mut self.archive);
        self.archive.truncate(self.max_archive_size);
        log::debug!(
            "Novelty archive: {} admitted, {} stored, P_min={:.4}",
            count,
            self.archive.len(),
            self.threshold
        );
    }
}

fn sort_by_novelty<G>(population: &mut [Individual<G>]) {
    population.sort_by(|a, b| b.distance.total_cmp(&a.distance));
}

fn more_novel<G>(a: &Individual<G>, b: &Individual<G>) -> std::cmp::Ordering {
    b.distance.total_cmp(&a.distance)
}

impl<G: Genome> EvolutionStrategy<G> for NoveltySearch<G> {
    fn name(&self) -> &'static str {
        "novelty-search"
    }

    fn initialize(&mut self, ctx: &mut SearchContext<G>) {
        self.archive.clear();
        self.score(&mut ctx.population);
        sort_by_novelty(&mut ctx.population);
    }

    fn evolve_one_generation(&mut self, ctx: &mut SearchContext<G>) {
        let size = ctx.population_size;
        if ctx.population.is_empty() {
            return;
        }

        // Breed the next population from the most novel parents.
        let mut offspring = Vec::with_capacity(size + 1);
        let mut parents = Vec::with_capacity(size + 1);
        while offspring.len() < size {
            let (Some(p1), Some(p2)) = (ctx.select_by(more_novel), ctx.select_by(more_novel))
            else {
                return;
            };
            let mut c1 = ctx.spawn(p1);
            let mut c2 = ctx.spawn(p2);
            if ctx.rng.chance(self.crossover_rate) {
                ctx.crossover(&mut c1, &mut c2);
            }
            ctx.mutate(&mut c1);
            ctx.mutate(&mut c2);
            offspring.push(c1);
            offspring.push(c2);
            parents.push(p1);
            parents.push(p2);
        }
        offspring.truncate(size);
        ctx.evaluate(&mut offspring);

        // Oversized offspring are replaced by their parent.
        for (child, &parent) in offspring.iter_mut().zip(&parents) {
            if ctx.bloat.is_too_long(child) {
                log::trace!("Rejected oversized offspring {}", child.id);
                let id = ctx.next_id();
                *child = ctx.population[parent].offspring(id);
            }
        }

        ctx.population = offspring;
        self.score(&mut ctx.population);
        self.update_archive(&ctx.population);
        sort_by_novelty(&mut ctx.population);
    }
}
