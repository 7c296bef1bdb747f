//! Cellular genetic algorithm.
//!
//! Every population slot mates only within its neighbourhood on the toroidal
//! grid, which slows down takeover by a single good individual.

use crate::schema::CellularConfig;
use crate::search::individual::{Genome, Individual};
use crate::search::neighbourhood::NeighbourhoodGrid;

use super::{EvolutionStrategy, SearchContext};

/// Neighbourhood-constrained genetic algorithm.
#[derive(Debug, Clone)]
pub struct CellularGa {
    crossover_rate: f64,
    grid: NeighbourhoodGrid,
}

impl CellularGa {
    pub fn new(config: &CellularConfig) -> Self {
        Self {
            crossover_rate: config.crossover_rate,
            grid: NeighbourhoodGrid::new(0),
        }
    }

    pub fn grid(&self) -> &NeighbourhoodGrid {
        &self.grid
    }

    fn ensure_grid(&mut self, size: usize) {
        if self.grid.population_size() != size {
            self.grid = NeighbourhoodGrid::new(size);
        }
    }
}

impl<G: Genome> EvolutionStrategy<G> for CellularGa {
    fn name(&self) -> &'static str {
        "cellular-ga"
    }

    fn initialize(&mut self, ctx: &mut SearchContext<G>) {
        self.ensure_grid(ctx.population.len());
    }

    fn evolve_one_generation(&mut self, ctx: &mut SearchContext<G>) {
        let size = ctx.population.len();
        if size == 0 {
            return;
        }
        self.ensure_grid(size);
        let shape = ctx.neighbourhood;

        let mut children = Vec::with_capacity(size * 2);
        for slot in 0..size {
            let members = self.grid.neighbours(slot, shape);
            let p1 = ctx.select_from(&members).unwrap_or(slot);
            let p2 = ctx.select_from(&members).unwrap_or(slot);
            let mut c1 = ctx.spawn(p1);
            let mut c2 = ctx.spawn(p2);
            if ctx.rng.chance(self.crossover_rate) {
                ctx.crossover(&mut c1, &mut c2);
            }
            ctx.mutate(&mut c1);
            ctx.mutate(&mut c2);
            children.push(c1);
            children.push(c2);
        }
        ctx.evaluate(&mut children);

        let mut children = children.into_iter();
        let mut next: Vec<Individual<G>> = Vec::with_capacity(size);
        for slot in 0..size {
            let candidate = [children.next(), children.next()]
                .into_iter()
                .flatten()
                .filter(|child| !ctx.bloat.is_too_long(child))
                .min_by(|a, b| ctx.compare(a, b));
            let occupant = &ctx.population[slot];
            match candidate {
                Some(child) if ctx.compare(&child, occupant).is_le() => next.push(child),
                _ => next.push(occupant.clone()),
            }
        }

        ctx.population = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NeighbourhoodShape;
    use crate::search::strategy::tests::context;

    fn cellular() -> CellularGa {
        CellularGa::new(&CellularConfig { crossover_rate: 0.8 })
    }

    #[test]
    fn test_slots_never_get_worse() {
        for shape in [
            NeighbourhoodShape::Ring,
            NeighbourhoodShape::LinearFive,
            NeighbourhoodShape::CompactNine,
            NeighbourhoodShape::CompactThirteen,
        ] {
            let mut ctx = context(11, 6);
            ctx.neighbourhood = shape;
            let mut strategy = cellular();
            strategy.initialize(&mut ctx);
            assert_eq!(strategy.grid().population_size(), 11);

            for _ in 0..5 {
                let before: Vec<f64> = ctx.population.iter().map(|i| i.cost).collect();
                ctx.begin_generation();
                strategy.evolve_one_generation(&mut ctx);
                ctx.generation += 1;
                assert_eq!(ctx.population.len(), 11);
                for (old, new) in before.iter().zip(&ctx.population) {
                    assert!(new.cost <= *old);
                }
            }
        }
    }

    #[test]
    fn test_grid_rebuilt_on_size_change() {
        let mut ctx = context(4, 1);
        let mut strategy = cellular();
        strategy.initialize(&mut ctx);
        assert_eq!(strategy.grid().columns(), 2);

        let mut bigger = context(9, 1);
        strategy.evolve_one_generation(&mut bigger);
        assert_eq!(strategy.grid().population_size(), 9);
        assert_eq!(bigger.population.len(), 9);
    }
}
