//! Many-objective search over the uncovered goals.
//!
//! Every goal still uncovered contributes its objective. Parents and offspring
//! are ranked together with fast non-dominated sorting, fronts are admitted in
//! order, and the front that does not fit is cut by crowding distance. Goals
//! drop out of the objective set as soon as the archive covers them.

use crate::schema::ManyObjectiveConfig;
use crate::search::dominance::{crowded_comparison, crowding_distance, non_dominated_sort};
use crate::search::individual::{Genome, Individual, Objective};

use super::{EvolutionStrategy, SearchContext};

/// Dominance-ranked genetic algorithm.
#[derive(Debug, Clone)]
pub struct ManyObjectiveGa {
    crossover_rate: f64,
}

impl ManyObjectiveGa {
    pub fn new(config: &ManyObjectiveConfig) -> Self {
        Self {
            crossover_rate: config.crossover_rate,
        }
    }
}

/// Write rank and crowding distance into every member of `pool`.
fn rank_and_crowd<G: Genome>(pool: &mut [Individual<G>], objectives: &[Objective]) {
    let fronts = non_dominated_sort(pool, objectives);
    for front in &fronts {
        crowding_distance(pool, front, objectives);
    }
}

impl<G: Genome> EvolutionStrategy<G> for ManyObjectiveGa {
    fn name(&self) -> &'static str {
        "many-objective"
    }

    fn initialize(&mut self, ctx: &mut SearchContext<G>) {
        let objectives = ctx.active_objectives();
        rank_and_crowd(&mut ctx.population, &objectives);
        ctx.population.sort_by(crowded_comparison);
    }

    fn evolve_one_generation(&mut self, ctx: &mut SearchContext<G>) {
        let size = ctx.population_size;
        if ctx.population.is_empty() {
            return;
        }

        let mut offspring = Vec::with_capacity(size + 1);
        while offspring.len() < size {
            let (Some(p1), Some(p2)) = (
                ctx.select_by(crowded_comparison),
                ctx.select_by(crowded_comparison),
            ) else {
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
        }
        offspring.truncate(size);
        ctx.evaluate(&mut offspring);
        offspring.retain(|child| !ctx.bloat.is_too_long(child));

        // Objectives are read after evaluation so goals covered by this
        // generation's offspring no longer count.
        let objectives = ctx.active_objectives();
        let mut pool = std::mem::take(&mut ctx.population);
        pool.extend(offspring);
        rank_and_crowd(&mut pool, &objectives);
        pool.sort_by(crowded_comparison);
        pool.truncate(size);
        ctx.population = pool;
    }
}
