//! Elitist generational genetic algorithm.

use std::cmp::Ordering;

use crate::schema::{ConfigError, GeneticAlgorithmConfig};
use crate::search::individual::{Genome, Individual};

use super::{EvolutionStrategy, SearchContext};

/// Pairs of parents produce pairs of children; a child pair only replaces its
/// parents when it is better, or equal and preferred by the secondary
/// objectives.
#[derive(Debug, Clone)]
pub struct StandardGa {
    crossover_rate: f64,
    elitism: usize,
}

impl StandardGa {
    pub fn new(config: &GeneticAlgorithmConfig) -> Self {
        Self {
            crossover_rate: config.crossover_rate,
            elitism: config.elitism,
        }
    }
}

impl<G: Genome> EvolutionStrategy<G> for StandardGa {
    fn name(&self) -> &'static str {
        "standard-ga"
    }

    fn canonical_size(&self, requested: usize) -> Result<usize, ConfigError> {
        if self.elitism > requested {
            return Err(ConfigError::ElitismTooLarge {
                elitism: self.elitism,
                size: requested,
            });
        }
        Ok(requested)
    }

    fn initialize(&mut self, ctx: &mut SearchContext<G>) {
        ctx.sort_population();
    }

    fn evolve_one_generation(&mut self, ctx: &mut SearchContext<G>) {
        let size = ctx.population_size;
        if ctx.population.is_empty() {
            return;
        }
        ctx.sort_population();

        let mut next: Vec<Individual<G>> = ctx
            .population
            .iter()
            .take(self.elitism.min(size))
            .cloned()
            .collect();

        let pairs = (size - next.len()).div_ceil(2);
        let mut parents = Vec::with_capacity(pairs);
        let mut children = Vec::with_capacity(pairs * 2);
        for _ in 0..pairs {
            let (Some(p1), Some(p2)) = (ctx.select(), ctx.select()) else {
                break;
            };
            let mut c1 = ctx.spawn(p1);
            let mut c2 = ctx.spawn(p2);
            if ctx.rng.chance(self.crossover_rate) {
                ctx.crossover(&mut c1, &mut c2);
            }
            ctx.mutate(&mut c1);
            ctx.mutate(&mut c2);
            parents.push([p1, p2]);
            children.push(c1);
            children.push(c2);
        }
        ctx.evaluate(&mut children);

        let mut children = children.into_iter();
        for pair in parents {
            let (Some(c1), Some(c2)) = (children.next(), children.next()) else {
                break;
            };
            for survivor in self.survivors(ctx, pair, [c1, c2]) {
                if next.len() < size {
                    next.push(survivor);
                }
            }
        }

        ctx.population = next;
        ctx.sort_population();
    }
}

impl StandardGa {
    /// Decide whether a family's children or its parents move on.
    fn survivors<G: Genome>(
        &self,
        ctx: &mut SearchContext<G>,
        [p1, p2]: [usize; 2],
        [c1, c2]: [Individual<G>; 2],
    ) -> [Individual<G>; 2] {
        // Oversized children fall back to a copy of their parent.
        let c1 = if ctx.bloat.is_too_long(&c1) { ctx.spawn(p1) } else { c1 };
        let c2 = if ctx.bloat.is_too_long(&c2) { ctx.spawn(p2) } else { c2 };

        let parent_best = ctx.population[p1].cost.min(ctx.population[p2].cost);
        let child_best = c1.cost.min(c2.cost);
        let keep_children = match child_best.total_cmp(&parent_best) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => {
                ctx.secondary.compare_generations(
                    &ctx.population[p1].genome,
                    &ctx.population[p2].genome,
                    &c1.genome,
                    &c2.genome,
                ) == Ordering::Greater
            }
        };

        if keep_children {
            [c1, c2]
        } else {
            [ctx.spawn(p1), ctx.spawn(p2)]
        }
    }
}
