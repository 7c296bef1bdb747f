//! Secondary objectives and bloat control.
//!
//! Secondary objectives break ties on primary fitness. Every metric prefers
//! smaller values. Bloat control rejects offspring that grow far beyond the
//! current best without improving on it.

use std::cmp::Ordering;

use crate::schema::{BloatConfig, SecondaryObjectiveKind};

use super::individual::{Genome, Individual};

impl SecondaryObjectiveKind {
    /// Metric value for a genome; smaller is preferred.
    pub fn metric<G: Genome>(self, genome: &G) -> usize {
        match self {
            Self::TotalLength => genome.size(),
            Self::SolutionCount => genome.unit_count(),
            Self::ExceptionCount => genome.exception_count(),
            Self::MaxLength => genome.max_unit_length(),
        }
    }

    /// Compare a parent pair against a child pair.
    ///
    /// Looks at the smaller metric of each pair. `Greater` favors the
    /// children, `Less` favors the parents.
    pub fn compare_generations<G: Genome>(
        self,
        parent1: &G,
        parent2: &G,
        child1: &G,
        child2: &G,
    ) -> Ordering {
        let parents = self.metric(parent1).min(self.metric(parent2));
        let children = self.metric(child1).min(self.metric(child2));
        parents.cmp(&children)
    }
}

/// Ordered chain of secondary objectives.
#[derive(Debug, Clone, Default)]
pub struct SecondaryObjectives {
    chain: Vec<SecondaryObjectiveKind>,
}

impl SecondaryObjectives {
    pub fn new(chain: Vec<SecondaryObjectiveKind>) -> Self {
        Self { chain }
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// First non-equal verdict along the chain; `Greater` favors the children.
    pub fn compare_generations<G: Genome>(
        &self,
        parent1: &G,
        parent2: &G,
        child1: &G,
        child2: &G,
    ) -> Ordering {
        self.chain
            .iter()
            .map(|kind| kind.compare_generations(parent1, parent2, child1, child2))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Order two genomes; `Less` means `a` is preferred.
    pub fn compare<G: Genome>(&self, a: &G, b: &G) -> Ordering {
        self.chain
            .iter()
            .map(|kind| kind.metric(a).cmp(&kind.metric(b)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Order individuals by primary cost, then along the chain.
    pub fn compare_individuals<G: Genome>(&self, a: &Individual<G>, b: &Individual<G>) -> Ordering {
        a.cost
            .total_cmp(&b.cost)
            .then_with(|| self.compare(&a.genome, &b.genome))
    }
}

/// Rejects oversized offspring relative to the best individual of the
/// generation.
#[derive(Debug, Clone)]
pub struct BloatControl {
    enabled: bool,
    factor: f64,
    current_max: Option<usize>,
    best_cost: f64,
}

impl BloatControl {
    pub fn new(config: &BloatConfig) -> Self {
        Self {
            enabled: config.enabled,
            factor: config.factor,
            current_max: None,
            best_cost: f64::INFINITY,
        }
    }

    /// Record the size and fitness of the generation's best individual.
    pub fn begin_generation<G: Genome>(&mut self, best: Option<&Individual<G>>) {
        match best {
            Some(best) => {
                self.current_max = Some(best.genome.size());
                self.best_cost = best.cost;
            }
            None => {
                self.current_max = None;
                self.best_cost = f64::INFINITY;
            }
        }
    }

    /// Size of the generation's best individual, if known.
    pub fn current_max(&self) -> Option<usize> {
        self.current_max
    }

    /// Whether an evaluated offspring must be rejected.
    ///
    /// Offspring strictly better than the best are always accepted. Others
    /// are rejected when their size exceeds `factor × current_max`; a size
    /// exactly at the threshold is accepted.
    pub fn is_too_long<G: Genome>(&self, offspring: &Individual<G>) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(current_max) = self.current_max else {
            return false;
        };
        if offspring.cost < self.best_cost {
            return false;
        }
        offspring.genome.size() as f64 > self.factor * current_max as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::individual::tests::{Blob, individual};

    fn sized(id: u64, size: usize, cost: f64) -> Individual<Blob> {
        let mut ind = individual(id, &[]);
        ind.genome = Blob(size);
        ind.cost = cost;
        ind
    }

    fn bloat(factor: f64) -> BloatControl {
        BloatControl::new(&BloatConfig {
            enabled: true,
            factor,
        })
    }

    #[test]
    fn test_bloat_rejects_equal_fitness_oversize() {
        let mut control = bloat(2.0);
        control.begin_generation(Some(&sized(0, 10, 0.5)));

        assert!(control.is_too_long(&sized(1, 21, 0.5)));
        assert!(!control.is_too_long(&sized(2, 21, 0.4)));
    }

    #[test]
    fn test_bloat_threshold_is_accepted() {
        let mut control = bloat(2.0);
        control.begin_generation(Some(&sized(0, 10, 0.5)));
        assert!(!control.is_too_long(&sized(1, 20, 0.5)));
        assert!(control.is_too_long(&sized(2, 21, 0.9)));
    }

    #[test]
    fn test_bloat_without_known_best_accepts_all() {
        let mut control = bloat(2.0);
        assert!(!control.is_too_long(&sized(1, 1000, 1.0)));
        control.begin_generation::<Blob>(None);
        assert!(!control.is_too_long(&sized(1, 1000, 1.0)));
    }

    #[test]
    fn test_bloat_disabled() {
        let mut control = BloatControl::new(&BloatConfig {
            enabled: false,
            factor: 2.0,
        });
        control.begin_generation(Some(&sized(0, 10, 0.5)));
        assert!(!control.is_too_long(&sized(1, 1000, 0.5)));
    }

    #[test]
    fn test_secondary_generation_compare() {
        let kind = SecondaryObjectiveKind::TotalLength;
        // min(parents) = 4, min(children) = 3: children preferred.
        assert_eq!(
            kind.compare_generations(&Blob(4), &Blob(9), &Blob(3), &Blob(12)),
            Ordering::Greater
        );
        assert_eq!(
            kind.compare_generations(&Blob(2), &Blob(9), &Blob(3), &Blob(12)),
            Ordering::Less
        );
        assert_eq!(
            kind.compare_generations(&Blob(3), &Blob(9), &Blob(3), &Blob(1)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_chain_falls_through_ties() {
        #[derive(Debug, Clone)]
        struct Suite {
            tests: usize,
            statements: usize,
        }
        impl Genome for Suite {
            fn size(&self) -> usize {
                self.statements
            }
            fn unit_count(&self) -> usize {
                self.tests
            }
        }

        let chain = SecondaryObjectives::new(vec![
            SecondaryObjectiveKind::SolutionCount,
            SecondaryObjectiveKind::TotalLength,
        ]);
        let a = Suite { tests: 2, statements: 10 };
        let b = Suite { tests: 2, statements: 8 };

        assert_eq!(chain.compare(&a, &b), Ordering::Greater);
        assert_eq!(chain.compare_generations(&a, &a, &b, &b), Ordering::Greater);
        assert_eq!(
            SecondaryObjectives::default().compare(&a, &b),
            Ordering::Equal
        );
    }

    #[test]
    fn test_compare_individuals_primary_first() {
        let chain = SecondaryObjectives::new(vec![SecondaryObjectiveKind::TotalLength]);
        let a = sized(0, 100, 0.1);
        let b = sized(1, 1, 0.2);
        let c = sized(2, 5, 0.1);
        assert_eq!(chain.compare_individuals(&a, &b), Ordering::Less);
        assert_eq!(chain.compare_individuals(&a, &c), Ordering::Greater);
    }
}
