//! Execution oracle boundary and batch evaluation.
//!
//! The oracle runs a candidate against the program under test and reports raw
//! fitness values plus the goals it reached. [`Evaluator`] drives it over
//! offspring batches, keeps the execution counters, and feeds the goal archive.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::archive::GoalArchive;
use super::individual::{EvaluationStatus, FitnessValues, Genome, GoalId, Individual, Objective};

/// Why the oracle could not measure a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum OracleFailure {
    #[error("execution timed out")]
    Timeout,
    #[error("execution crashed: {0}")]
    Crash(String),
    #[error("resources exhausted: {0}")]
    ResourceExhausted(String),
}

/// Measurements from one successful oracle call.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Raw fitness per requested objective.
    pub values: FitnessValues,
    /// Tests executed to produce the values.
    pub tests_executed: u64,
    /// Statements executed to produce the values.
    pub statements_executed: u64,
}

impl Evaluation {
    /// Evaluation that ran a single test.
    pub fn new(values: FitnessValues) -> Self {
        Self {
            values,
            tests_executed: 1,
            statements_executed: 0,
        }
    }

    pub fn with_statements(mut self, statements: u64) -> Self {
        self.statements_executed = statements;
        self
    }
}

/// External executor of candidate solutions.
///
/// Must be deterministic for a fixed genome and objective set.
pub trait ExecutionOracle<G>: Send + Sync {
    /// Score `genome` against `objectives`.
    fn evaluate(&self, genome: &G, objectives: &[Objective]) -> Result<Evaluation, OracleFailure>;

    /// Goals reached by executing `genome`.
    fn coverage_vector(&self, genome: &G) -> BTreeSet<GoalId>;
}

/// Counters shared between the evaluator and the stopping conditions.
#[derive(Debug, Default)]
pub struct ExecutionCounters {
    evaluations: AtomicU64,
    tests: AtomicU64,
    statements: AtomicU64,
    failures: AtomicU64,
}

impl ExecutionCounters {
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn tests(&self) -> u64 {
        self.tests.load(Ordering::Relaxed)
    }

    pub fn statements(&self) -> u64 {
        self.statements.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn record(&self, evaluation: &Evaluation) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.tests
            .fetch_add(evaluation.tests_executed, Ordering::Relaxed);
        self.statements
            .fetch_add(evaluation.statements_executed, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Runs the oracle over individuals and records the results.
pub struct Evaluator<G> {
    oracle: Arc<dyn ExecutionOracle<G>>,
    objectives: Vec<Objective>,
    counters: Arc<ExecutionCounters>,
}

impl<G: Genome> Evaluator<G> {
    pub fn new(oracle: Arc<dyn ExecutionOracle<G>>, objectives: Vec<Objective>) -> Self {
        Self {
            oracle,
            objectives,
            counters: Arc::new(ExecutionCounters::default()),
        }
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn counters(&self) -> Arc<ExecutionCounters> {
        Arc::clone(&self.counters)
    }

    pub fn oracle(&self) -> &dyn ExecutionOracle<G> {
        self.oracle.as_ref()
    }

    /// Evaluate a batch in parallel, then archive results in slot order.
    ///
    /// Individuals that are unchanged since their last evaluation are skipped.
    pub fn evaluate_batch(&self, batch: &mut [Individual<G>], archive: &GoalArchive<G>) {
        let coverage: Vec<Option<BTreeSet<GoalId>>> = batch
            .par_iter_mut()
            .map(|individual| self.execute(individual))
            .collect();

        for (individual, reached) in batch.iter().zip(coverage) {
            if let Some(reached) = reached {
                archive.record(individual, &reached);
            }
        }
    }

    /// Evaluate a single individual.
    pub fn evaluate(&self, individual: &mut Individual<G>, archive: &GoalArchive<G>) {
        if let Some(reached) = self.execute(individual) {
            archive.record(individual, &reached);
        }
    }

    /// Call the oracle and write fitness back. Returns the reached goals when
    /// the oracle actually ran successfully.
    fn execute(&self, individual: &mut Individual<G>) -> Option<BTreeSet<GoalId>> {
        if !individual.needs_evaluation() {
            return None;
        }

        let result = self.oracle.evaluate(&individual.genome, &self.objectives);
        individual.changed = false;

        match result {
            Ok(evaluation) => {
                self.counters.record(&evaluation);
                individual.fitness = evaluation.values;
                individual.aggregate(&self.objectives);
                individual.status = EvaluationStatus::Evaluated;
                Some(self.oracle.coverage_vector(&individual.genome))
            }
            Err(failure) => {
                log::warn!("Oracle failed on individual {}: {}", individual.id, failure);
                self.counters.record_failure();
                individual.fitness = self
                    .objectives
                    .iter()
                    .map(|objective| (objective.id, objective.worst()))
                    .collect();
                individual.cost = self.objectives.len() as f64;
                individual.status = EvaluationStatus::Failed(failure);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::individual::tests::Blob;
    use crate::search::individual::{Goal, ObjectiveId};

    /// Distance to goal 0 is the blob size; sizes above 100 crash.
    struct SizeOracle;

    impl ExecutionOracle<Blob> for SizeOracle {
        fn evaluate(
            &self,
            genome: &Blob,
            objectives: &[Objective],
        ) -> Result<Evaluation, OracleFailure> {
            if genome.0 > 100 {
                return Err(OracleFailure::Crash("too big".into()));
            }
            let values = objectives
                .iter()
                .map(|o| (o.id, genome.0 as f64))
                .collect();
            Ok(Evaluation::new(values).with_statements(genome.0 as u64))
        }

        fn coverage_vector(&self, genome: &Blob) -> BTreeSet<GoalId> {
            if genome.0 == 0 {
                BTreeSet::from([GoalId(0)])
            } else {
                BTreeSet::new()
            }
        }
    }

    fn setup() -> (Evaluator<Blob>, GoalArchive<Blob>) {
        let objective = Objective::minimize(0, "size");
        let evaluator = Evaluator::new(Arc::new(SizeOracle), vec![objective]);
        let archive = GoalArchive::new(vec![Goal::new(0, ObjectiveId(0), "empty")]);
        (evaluator, archive)
    }

    #[test]
    fn test_batch_evaluation_updates_counters_and_archive() {
        let (evaluator, archive) = setup();
        let mut batch: Vec<_> = [3, 0, 5]
            .iter()
            .enumerate()
            .map(|(i, size)| Individual::new(i as u64, Blob(*size), 0))
            .collect();

        evaluator.evaluate_batch(&mut batch, &archive);

        let counters = evaluator.counters();
        assert_eq!(counters.evaluations(), 3);
        assert_eq!(counters.tests(), 3);
        assert_eq!(counters.statements(), 8);
        assert!(batch.iter().all(|i| !i.changed));
        assert!((batch[0].cost - 0.75).abs() < 1e-12);
        assert!(archive.is_covered(GoalId(0)));
        assert_eq!(archive.best(GoalId(0)).unwrap().solution.id, 1);
    }

    #[test]
    fn test_unchanged_individuals_are_not_reevaluated() {
        let (evaluator, archive) = setup();
        let mut ind = Individual::new(0, Blob(2), 0);
        evaluator.evaluate(&mut ind, &archive);
        evaluator.evaluate(&mut ind, &archive);
        assert_eq!(evaluator.counters().evaluations(), 1);

        ind.changed = true;
        evaluator.evaluate(&mut ind, &archive);
        assert_eq!(evaluator.counters().evaluations(), 2);
    }

    #[test]
    fn test_oracle_failure_is_worst_case_and_distinguishable() {
        let (evaluator, archive) = setup();
        let mut ind = Individual::new(0, Blob(500), 0);
        evaluator.evaluate(&mut ind, &archive);

        assert!(ind.is_failed());
        assert_eq!(ind.cost, 1.0);
        assert_eq!(ind.fitness[&ObjectiveId(0)], f64::INFINITY);
        assert_eq!(evaluator.counters().failures(), 1);
        assert!(archive.best(GoalId(0)).is_none());
    }
}
