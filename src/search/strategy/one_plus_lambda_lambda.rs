//! 1+(λ,λ) genetic algorithm.

use crate::schema::ConfigError;
use crate::search::individual::Genome;

use super::{EvolutionStrategy, SearchContext};

/// Single-parent strategy with a mutation phase and a crossover phase.
///
/// The population always holds exactly one individual, whatever size is
/// requested.
#[derive(Debug, Clone)]
pub struct OnePlusLambdaLambda {
    lambda: usize,
}

impl OnePlusLambdaLambda {
    pub fn new(lambda: usize) -> Self {
        Self { lambda }
    }
}

impl<G: Genome> EvolutionStrategy<G> for OnePlusLambdaLambda {
    fn name(&self) -> &'static str {
        "1+(lambda,lambda)"
    }

    fn canonical_size(&self, requested: usize) -> Result<usize, ConfigError> {
        if self.lambda == 0 {
            return Err(ConfigError::LambdaTooSmall);
        }
        if requested != 1 {
            log::debug!("1+(lambda,lambda) ignores requested population size {requested}");
        }
        Ok(1)
    }

    fn evolve_one_generation(&mut self, ctx: &mut SearchContext<G>) {
        let Some(parent) = ctx.population.first().cloned() else {
            return;
        };

        // Mutation phase.
        let mut mutants = Vec::with_capacity(self.lambda);
        for _ in 0..self.lambda {
            let mut mutant = ctx.spawn(0);
            ctx.mutate(&mut mutant);
            mutants.push(mutant);
        }
        ctx.evaluate(&mut mutants);
        let Some(best_mutant) = ctx.best_index(&mutants).map(|i| mutants.swap_remove(i)) else {
            return;
        };

        // Crossover phase, in pairs.
        let mut children = Vec::with_capacity(self.lambda + 1);
        while children.len() < self.lambda {
            let mut first = parent.offspring(ctx.next_id());
            let mut second = best_mutant.offspring(ctx.next_id());
            ctx.crossover(&mut first, &mut second);
            children.push(first);
            children.push(second);
        }
        children.truncate(self.lambda);
        ctx.evaluate(&mut children);
        let best_child = ctx.best_index(&children).map(|i| children.swap_remove(i));

        // Ties favour the child, then the mutant, over the parent.
        let mut candidates: Vec<_> = best_child.into_iter().collect();
        candidates.push(best_mutant);
        candidates.push(parent);
        let winner = ctx.best_index(&candidates).unwrap_or(candidates.len() - 1);
        let winner = candidates.swap_remove(winner);

        ctx.population.clear();
        ctx.population.push(winner);
    }
}
