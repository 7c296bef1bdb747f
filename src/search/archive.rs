//! Goal-coverage archive.
//!
//! Keeps the best solution found for each goal. Each goal owns its own slot,
//! so concurrent evaluations only contend when they improve the same goal, and
//! every write is a compare-and-keep-better: a worse solution never replaces a
//! better one, whichever thread arrives last.
//!
//! Coverage is monotonic. Once a goal's distance reaches zero it is flagged
//! covered for the rest of the run and leaves the active goal set, while its
//! solution stays retrievable for final suite assembly.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::individual::{Genome, Goal, GoalId, Individual, normalize};

/// Best solution recorded for a goal.
#[derive(Debug, Clone)]
pub struct ArchiveEntry<G> {
    /// The solution.
    pub solution: Individual<G>,
    /// Fitness distance to covering the goal (0 = covered).
    pub distance: f64,
}

struct GoalSlot<G> {
    goal: Goal,
    covered: AtomicBool,
    entry: Mutex<Option<ArchiveEntry<G>>>,
}

impl<G> GoalSlot<G> {
    fn lock(&self) -> MutexGuard<'_, Option<ArchiveEntry<G>>> {
        self.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-goal best-solution archive.
pub struct GoalArchive<G> {
    slots: Vec<GoalSlot<G>>,
    index: HashMap<GoalId, usize>,
}

impl<G: Genome> GoalArchive<G> {
    /// Create an archive over a fixed goal set. Duplicate goal IDs keep the
    /// first definition.
    pub fn new(goals: Vec<Goal>) -> Self {
        let mut slots = Vec::with_capacity(goals.len());
        let mut index = HashMap::with_capacity(goals.len());

        for goal in goals {
            if index.contains_key(&goal.id) {
                log::warn!("Ignoring duplicate goal {}", goal.id);
                continue;
            }
            index.insert(goal.id, slots.len());
            slots.push(GoalSlot {
                goal,
                covered: AtomicBool::new(false),
                entry: Mutex::new(None),
            });
        }

        Self { slots, index }
    }

    /// Offer `solution` for `goal` at `distance`.
    ///
    /// Replaces the stored entry when there is none or `distance` is not
    /// worse than the stored one. A zero distance marks the goal covered.
    /// Returns whether the entry was replaced. NaN distances and unknown goals
    /// are ignored.
    pub fn update(&self, goal: GoalId, solution: &Individual<G>, distance: f64) -> bool {
        let Some(slot) = self.index.get(&goal).map(|&i| &self.slots[i]) else {
            return false;
        };
        if distance.is_nan() {
            return false;
        }
        let distance = distance.max(0.0);

        let mut entry = slot.lock();
        let replace = match entry.as_ref() {
            None => true,
            Some(current) => distance <= current.distance,
        };
        if !replace {
            return false;
        }

        *entry = Some(ArchiveEntry {
            solution: solution.clone(),
            distance,
        });
        drop(entry);

        if distance == 0.0 && !slot.covered.swap(true, Ordering::AcqRel) {
            log::debug!("Covered {} ({})", slot.goal.id, slot.goal.name);
        }
        log::trace!(
            "Archive improved {} to distance {:.4} (individual {})",
            goal,
            distance,
            solution.id
        );
        true
    }

    /// Offer an evaluated individual for every active goal.
    ///
    /// Goals in `reached` get distance 0; the others read their distance from
    /// the individual's fitness value for the goal's objective. Goals without
    /// a fitness value are skipped.
    pub fn record(&self, individual: &Individual<G>, reached: &BTreeSet<GoalId>) {
        for slot in &self.slots {
            if slot.covered.load(Ordering::Acquire) {
                continue;
            }
            let distance = if reached.contains(&slot.goal.id) {
                Some(0.0)
            } else {
                individual.fitness.get(&slot.goal.objective).copied()
            };
            if let Some(distance) = distance {
                self.update(slot.goal.id, individual, distance);
            }
        }
    }

    /// Whether `goal` has been covered.
    pub fn is_covered(&self, goal: GoalId) -> bool {
        self.index
            .get(&goal)
            .is_some_and(|&i| self.slots[i].covered.load(Ordering::Acquire))
    }

    /// Goals not yet covered, in definition order.
    pub fn active_goals(&self) -> Vec<&Goal> {
        self.slots
            .iter()
            .filter(|slot| !slot.covered.load(Ordering::Acquire))
            .map(|slot| &slot.goal)
            .collect()
    }

    /// Covered goal IDs, in definition order.
    pub fn covered_goals(&self) -> Vec<GoalId> {
        self.slots
            .iter()
            .filter(|slot| slot.covered.load(Ordering::Acquire))
            .map(|slot| slot.goal.id)
            .collect()
    }

    /// All goals, in definition order.
    pub fn goals(&self) -> impl Iterator<Item = &Goal> {
        self.slots.iter().map(|slot| &slot.goal)
    }

    /// Copy of the best entry for `goal`.
    pub fn best(&self, goal: GoalId) -> Option<ArchiveEntry<G>> {
        let slot = &self.slots[*self.index.get(&goal)?];
        slot.lock().clone()
    }

    /// Goal ID to best solution for every goal with an entry.
    pub fn snapshot(&self) -> BTreeMap<GoalId, Individual<G>> {
        self.slots
            .iter()
            .filter_map(|slot| {
                slot.lock()
                    .as_ref()
                    .map(|entry| (slot.goal.id, entry.solution.clone()))
            })
            .collect()
    }

    /// Fraction of goals covered; 1.0 for an empty goal set.
    pub fn coverage_ratio(&self) -> f64 {
        if self.slots.is_empty() {
            return 1.0;
        }
        self.covered_goals().len() as f64 / self.slots.len() as f64
    }

    /// Whether every goal is covered. False for an empty goal set.
    pub fn all_covered(&self) -> bool {
        !self.slots.is_empty()
            && self
                .slots
                .iter()
                .all(|slot| slot.covered.load(Ordering::Acquire))
    }

    /// Number of goals.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if there are no goals.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// ============================================================================
// Ambiguity scoring
// ============================================================================

/// Build an executions × goals coverage matrix.
pub fn coverage_matrix(executions: &[BTreeSet<GoalId>], goals: &[GoalId]) -> Vec<Vec<bool>> {
    executions
        .iter()
        .map(|reached| goals.iter().map(|goal| reached.contains(goal)).collect())
        .collect()
}

/// Ambiguity of an executions × goals coverage matrix.
///
/// Goals are grouped by their coverage vector across all executions. A group
/// of `c > 1` goals out of `g` goals adds `c/g * (c-1)/2`; goals that no other
/// goal shares a vector with add nothing.
pub fn ambiguity(matrix: &[Vec<bool>]) -> f64 {
    let goal_count = matrix.iter().map(Vec::len).max().unwrap_or(0);
    if goal_count == 0 {
        return 0.0;
    }

    let mut groups: HashMap<Vec<bool>, usize> = HashMap::new();
    for goal in 0..goal_count {
        let column: Vec<bool> = matrix
            .iter()
            .map(|row| row.get(goal).copied().unwrap_or(false))
            .collect();
        *groups.entry(column).or_insert(0) += 1;
    }

    let total = goal_count as f64;
    groups
        .values()
        .filter(|&&cardinality| cardinality > 1)
        .map(|&cardinality| {
            let c = cardinality as f64;
            c / total * (c - 1.0) / 2.0
        })
        .sum()
}

/// Ambiguity normalized into [0, 1) for use as a fitness contribution.
pub fn ambiguity_fitness(matrix: &[Vec<bool>]) -> f64 {
    normalize(ambiguity(matrix))
}
