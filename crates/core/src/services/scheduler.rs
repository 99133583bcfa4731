use std::sync::mpsc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info};

use crate::engine::ExecutionEngine;
use crate::model::CandidateFunction;
use crate::program::Program;
use crate::services::evaluation::{EvaluationConfig, EvaluationError, EvaluationReport, Evaluator};

/// Posted by each evaluation task when it finishes.
#[derive(Debug)]
pub struct Completion {
    pub index: usize,
    pub result: Result<EvaluationReport, EvaluationError>,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Failed to build evaluation thread pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Expected {expected} completions, received {received}")]
    MissingCompletions { expected: usize, received: usize },
}

/// Derive the RNG seed for the individual at `index` from a base seed.
///
/// Each evaluation gets its own generator, seeded once; the mix keeps
/// neighbouring indices from producing correlated streams.
pub fn evaluation_seed(base: u64, index: usize) -> u64 {
    let mut z = base ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Evaluates a population concurrently on a dedicated worker pool.
pub struct PopulationEvaluator<'a, E: ExecutionEngine + ?Sized> {
    engine: &'a E,
    config: &'a EvaluationConfig,
    threads: Option<usize>,
    seed: u64,
}

impl<'a, E: ExecutionEngine + ?Sized> PopulationEvaluator<'a, E> {
    pub fn new(engine: &'a E, config: &'a EvaluationConfig, seed: u64) -> Self {
        Self { engine, config, threads: None, seed }
    }

    /// Cap the worker count; `None` lets the pool pick one per core.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Score every individual and return results in population order.
    ///
    /// Each task works on its own deep copy of its individual and posts a
    /// [`Completion`]; all completions are joined before results are read.
    pub fn evaluate(
        &self,
        population: &[Program],
        solution: &CandidateFunction,
    ) -> Result<Vec<Result<EvaluationReport, EvaluationError>>, SchedulerError> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = self.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;

        info!(
            individuals = population.len(),
            threads = pool.current_num_threads(),
            task = self.config.task.as_str(),
            rounds = self.config.rounds,
            "evaluating population"
        );

        let (tx, rx) = mpsc::channel::<Completion>();
        let evaluator = Evaluator::new(self.engine, self.config);
        let evaluator = &evaluator;
        pool.scope(|scope| {
            for (index, individual) in population.iter().enumerate() {
                let tx = tx.clone();
                let seed = evaluation_seed(self.seed, index);
                scope.spawn(move |_| {
                    let mut rng = StdRng::seed_from_u64(seed);
                    let result = evaluator.evaluate(individual, solution, &mut rng);
                    if let Ok(report) = &result {
                        debug!(index, fitness = %report.fitness, "evaluation complete");
                    }
                    // The receiver outlives the scope, so a send cannot fail here.
                    let _ = tx.send(Completion { index, result });
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<Result<EvaluationReport, EvaluationError>>> =
            (0..population.len()).map(|_| None).collect();
        let mut received = 0;
        for completion in rx {
            if let Some(slot) = slots.get_mut(completion.index) {
                *slot = Some(completion.result);
                received += 1;
            }
        }

        if received != population.len() {
            return Err(SchedulerError::MissingCompletions {
                expected: population.len(),
                received,
            });
        }
        Ok(slots.into_iter().flatten().collect())
    }
}
