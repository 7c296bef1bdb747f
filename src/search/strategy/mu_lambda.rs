//! (μ,λ) and (μ+λ) evolution strategies.

use crate::schema::ConfigError;
use crate::search::individual::Genome;

use super::{EvolutionStrategy, SearchContext};

/// Mutation-only strategy producing λ offspring from μ parents.
///
/// In the comma variant the next population is the best μ offspring. In the
/// plus variant parents compete with their offspring and, being sorted first,
/// keep their slot on ties.
#[derive(Debug, Clone)]
pub struct MuLambda {
    lambda: usize,
    plus: bool,
}

impl MuLambda {
    pub fn comma(lambda: usize) -> Self {
        Self {
            lambda,
            plus: false,
        }
    }

    pub fn plus(lambda: usize) -> Self {
        Self { lambda, plus: true }
    }

    pub fn lambda(&self) -> usize {
        self.lambda
    }
}

impl<G: Genome> EvolutionStrategy<G> for MuLambda {
    fn name(&self) -> &'static str {
        if self.plus { "(mu+lambda)" } else { "(mu,lambda)" }
    }

    fn canonical_size(&self, requested: usize) -> Result<usize, ConfigError> {
        if self.lambda == 0 {
            return Err(ConfigError::LambdaTooSmall);
        }
        if !self.plus && self.lambda < requested {
            return Err(ConfigError::LambdaBelowMu {
                lambda: self.lambda,
                mu: requested,
            });
        }
        Ok(requested)
    }

    fn evolve_one_generation(&mut self, ctx: &mut SearchContext<G>) {
        let mu = ctx.population.len();
        if mu == 0 {
            return;
        }

        let mut offspring = Vec::with_capacity(self.lambda);
        for i in 0..self.lambda {
            let mut child = ctx.spawn(i % mu);
            ctx.mutate(&mut child);
            offspring.push(child);
        }
        ctx.evaluate(&mut offspring);

        let mut pool = if self.plus {
            let mut pool = std::mem::take(&mut ctx.population);
            pool.extend(offspring);
            pool
        } else {
            offspring
        };
        ctx.sort(&mut pool);
        pool.truncate(ctx.population_size);
        ctx.population = pool;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::individual::tests::Blob;
    use crate::search::strategy::tests::context;

    #[test]
    fn test_comma_keeps_best_offspring() {
        let mut ctx = context(3, 7);
        let mut strategy = MuLambda::comma(10);
        let before = ctx.evaluator.counters().evaluations();

        ctx.begin_generation();
        strategy.evolve_one_generation(&mut ctx);

        assert_eq!(ctx.population.len(), 3);
        // Every child changed, so all ten were evaluated.
        assert_eq!(ctx.evaluator.counters().evaluations() - before, 10);
        // Survivors all carry fresh IDs, i.e. none of them is a parent.
        assert!(ctx.population.iter().all(|i| i.id >= 3));
        for pair in ctx.population.windows(2) {
            assert!(pair[0].cost <= pair[1].cost);
        }
    }

    #[test]
    fn test_comma_survivors_beat_third_best_offspring() {
        // Same seed and same draws: replay to observe the offspring costs.
        let mut ctx = context(3, 21);
        let mut replay = context(3, 21);

        let mut offspring = Vec::new();
        for i in 0..10 {
            let mut child = replay.spawn(i % 3);
            replay.mutate(&mut child);
            offspring.push(child);
        }
        replay.evaluate(&mut offspring);
        let mut costs: Vec<f64> = offspring.iter().map(|o| o.cost).collect();
        costs.sort_by(f64::total_cmp);
        let third_best = costs[2];

        MuLambda::comma(10).evolve_one_generation(&mut ctx);
        assert_eq!(ctx.population.len(), 3);
        assert!(ctx.population.iter().all(|i| i.cost <= third_best));
    }

    #[test]
    fn test_plus_never_loses_best_parent() {
        let mut ctx = context(4, 3);
        let mut strategy = MuLambda::plus(6);
        for _ in 0..20 {
            let best_before = ctx.best().unwrap().cost;
            strategy.evolve_one_generation(&mut ctx);
            ctx.generation += 1;
            assert_eq!(ctx.population.len(), 4);
            assert!(ctx.best().unwrap().cost <= best_before);
        }
    }

    #[test]
    fn test_size_checks() {
        let comma = MuLambda::comma(5);
        assert!(matches!(
            EvolutionStrategy::<Blob>::canonical_size(&comma, 10),
            Err(ConfigError::LambdaBelowMu { lambda: 5, mu: 10 })
        ));
        let plus = MuLambda::plus(5);
        assert_eq!(
            EvolutionStrategy::<Blob>::canonical_size(&plus, 10).unwrap(),
            10
        );
    }
}
