//! Pareto dominance and fast non-dominated sorting.
//!
//! Each objective is compared in its own direction. Ranking is the classic
//! O(M·N²) pairwise sort; ties inside a front are left for secondary
//! objectives to break.

use std::cmp::Ordering;

use super::individual::{FitnessValues, Genome, Individual, Objective};

/// Outcome of comparing `a` against `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dominance {
    /// `a` dominates `b`.
    Dominates,
    /// Neither dominates the other (or they are equal).
    Incomparable,
    /// `b` dominates `a`.
    Dominated,
}

impl Dominance {
    /// -1, 0 or 1 as in the usual comparator convention.
    pub fn signum(self) -> i8 {
        match self {
            Self::Dominates => -1,
            Self::Incomparable => 0,
            Self::Dominated => 1,
        }
    }

    /// The same comparison seen from `b`'s side.
    pub fn reversed(self) -> Self {
        match self {
            Self::Dominates => Self::Dominated,
            Self::Incomparable => Self::Incomparable,
            Self::Dominated => Self::Dominates,
        }
    }
}

/// Compare two fitness vectors. Missing or NaN values count as worst.
pub fn compare_values(a: &FitnessValues, b: &FitnessValues, objectives: &[Objective]) -> Dominance {
    let mut a_better = false;
    let mut b_better = false;

    for objective in objectives {
        let va = value_or_worst(a, objective);
        let vb = value_or_worst(b, objective);
        if objective.is_better(va, vb) {
            a_better = true;
        } else if objective.is_better(vb, va) {
            b_better = true;
        }
        if a_better && b_better {
            return Dominance::Incomparable;
        }
    }

    match (a_better, b_better) {
        (true, false) => Dominance::Dominates,
        (false, true) => Dominance::Dominated,
        _ => Dominance::Incomparable,
    }
}

/// Compare two individuals on `objectives`.
pub fn compare<G>(a: &Individual<G>, b: &Individual<G>, objectives: &[Objective]) -> Dominance {
    compare_values(&a.fitness, &b.fitness, objectives)
}

fn value_or_worst(values: &FitnessValues, objective: &Objective) -> f64 {
    match values.get(&objective.id) {
        Some(v) if !v.is_nan() => *v,
        _ => objective.worst(),
    }
}

/// Fast non-dominated sort.
///
/// Returns the fronts as index lists (front 0 first, indices ascending within
/// a front) and writes each individual's front index into `rank`. An empty
/// population yields no fronts.
pub fn non_dominated_sort<G>(
    population: &mut [Individual<G>],
    objectives: &[Objective],
) -> Vec<Vec<usize>> {
    let n = population.len();
    let mut dominated_count = vec![0usize; n];
    let mut dominates: Vec<Vec<usize>> = vec![Vec::new(); n];

    for p in 0..n {
        for q in (p + 1)..n {
            match compare(&population[p], &population[q], objectives) {
                Dominance::Dominates => {
                    dominates[p].push(q);
                    dominated_count[q] += 1;
                }
                Dominance::Dominated => {
                    dominates[q].push(p);
                    dominated_count[p] += 1;
                }
                Dominance::Incomparable => {}
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| dominated_count[i] == 0).collect();

    while !current.is_empty() {
        let rank = fronts.len();
        let mut next = Vec::new();
        for &p in &current {
            population[p].rank = rank;
            for &q in &dominates[p] {
                dominated_count[q] -= 1;
                if dominated_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }

    debug_assert_eq!(fronts.iter().map(Vec::len).sum::<usize>(), n);
    fronts
}

/// NSGA-II crowding distance over one front, written into `distance`.
///
/// Boundary individuals of every objective get +inf.
pub fn crowding_distance<G: Genome>(
    population: &mut [Individual<G>],
    front: &[usize],
    objectives: &[Objective],
) {
    for &i in front {
        population[i].distance = 0.0;
    }
    if front.len() <= 2 {
        for &i in front {
            population[i].distance = f64::INFINITY;
        }
        return;
    }

    let mut order = front.to_vec();
    for objective in objectives {
        order.sort_by(|&a, &b| {
            population[a]
                .value(objective)
                .total_cmp(&population[b].value(objective))
        });

        let first = order[0];
        let last = order[order.len() - 1];
        let min = population[first].value(objective);
        let max = population[last].value(objective);
        population[first].distance = f64::INFINITY;
        population[last].distance = f64::INFINITY;

        let span = max - min;
        if !span.is_finite() || span <= 0.0 {
            continue;
        }

        for w in 1..order.len() - 1 {
            let below = population[order[w - 1]].value(objective);
            let above = population[order[w + 1]].value(objective);
            let idx = order[w];
            population[idx].distance += (above - below) / span;
        }
    }
}

/// Order by rank ascending, then crowding distance descending.
pub fn crowded_comparison<G>(a: &Individual<G>, b: &Individual<G>) -> Ordering {
    a.rank
        .cmp(&b.rank)
        .then_with(|| b.distance.total_cmp(&a.distance))
}
