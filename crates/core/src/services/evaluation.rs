use std::cmp::Ordering;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::engine::{ExecutionBudget, ExecutionEngine};
use crate::model::{CandidateFunction, ValueType};
use crate::program::marshal::{
    decode_u32, encode_i32, extract_outputs, inject_inputs, input_byte_size, MarshalError,
};
use crate::program::Program;

/// Which target behaviour an individual is scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    /// Echo the input: accumulate squared error, lower is better.
    Regression,
    /// Produce odd outputs: count passing rounds, higher is better.
    Parity,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Regression => "regression",
            Task::Parity => "parity",
        }
    }
}

/// Scalar fitness. The two conventions are never compared with each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Fitness {
    /// Accumulated squared error; lower is better.
    Error(f64),
    /// Number of passing rounds; higher is better.
    Points(i64),
}

impl Fitness {
    /// Starting value before any round is scored.
    pub fn zero(task: Task) -> Self {
        match task {
            Task::Regression => Fitness::Error(0.0),
            Task::Parity => Fitness::Points(0),
        }
    }

    /// Penalty assigned to individuals whose execution faulted.
    pub fn worst(task: Task) -> Self {
        match task {
            Task::Regression => Fitness::Error(f64::MAX),
            Task::Parity => Fitness::Points(0),
        }
    }

    /// Orders two fitness values best-first. Mixed conventions compare as equal.
    pub fn compare(&self, other: &Fitness) -> Ordering {
        match (self, other) {
            (Fitness::Error(a), Fitness::Error(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Fitness::Points(a), Fitness::Points(b)) => b.cmp(a),
            _ => Ordering::Equal,
        }
    }

    pub fn is_better_than(&self, other: &Fitness) -> bool {
        self.compare(other) == Ordering::Less
    }
}

impl fmt::Display for Fitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fitness::Error(v) => write!(f, "error={}", v),
            Fitness::Points(v) => write!(f, "points={}", v),
        }
    }
}

/// Add `score` to `total`, clamping to `f64::MAX` instead of overflowing.
pub fn saturating_accumulate(total: f64, score: f64) -> f64 {
    let sum = total + score;
    if sum < total || !sum.is_finite() {
        f64::MAX
    } else {
        sum
    }
}

/// When the individual's memory is restored from its pre-evaluation snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Restore memory and execution state at the start of every round.
    #[default]
    EveryRound,
    /// Restore once before the first round; later rounds see earlier state.
    Once,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub task: Task,
    pub rounds: usize,
    #[serde(default)]
    pub budget: ExecutionBudget,
    #[serde(default)]
    pub reset: ResetPolicy,
}

impl EvaluationConfig {
    pub fn new(task: Task, rounds: usize) -> Self {
        Self { task, rounds, budget: ExecutionBudget::default(), reset: ResetPolicy::default() }
    }

    pub fn with_budget(mut self, budget: ExecutionBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_reset(mut self, reset: ResetPolicy) -> Self {
        self.reset = reset;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("Solution '{function}' cannot be scored: {reason}")]
    UnsupportedSignature { function: String, reason: String },
    #[error(transparent)]
    Marshal(#[from] MarshalError),
}

/// Outcome of scoring one individual.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub fitness: Fitness,
    /// Rounds that completed before scoring stopped.
    pub rounds: usize,
    /// Instructions executed across all rounds.
    pub steps: u64,
    /// Engine fault that ended evaluation early, if any.
    pub fault: Option<String>,
}

/// Input for round `round`: a random non-zero probe first, then the round index.
pub fn round_input<R: Rng + ?Sized>(round: usize, rng: &mut R) -> i32 {
    if round == 0 {
        rng.gen_range(1..=i32::MAX)
    } else {
        i32::try_from(round).unwrap_or(i32::MAX)
    }
}

/// Runs the reset / inject / execute / extract / score cycle for one individual.
pub struct Evaluator<'a, E: ExecutionEngine + ?Sized> {
    engine: &'a E,
    config: &'a EvaluationConfig,
}

impl<'a, E: ExecutionEngine + ?Sized> Evaluator<'a, E> {
    pub fn new(engine: &'a E, config: &'a EvaluationConfig) -> Self {
        Self { engine, config }
    }

    /// Score `individual` against `solution`'s signature.
    ///
    /// The individual is never mutated: all rounds run on a private deep copy.
    /// Engine faults end evaluation with the task's worst fitness.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        individual: &Program,
        solution: &CandidateFunction,
        rng: &mut R,
    ) -> Result<EvaluationReport, EvaluationError> {
        check_signature(solution)?;

        let task = self.config.task;
        let mut scratch = individual.clone();
        let snapshot = scratch.memory.clone();
        let mut inputs = vec![0u8; input_byte_size(solution)];
        let mut fitness = Fitness::zero(task);
        let mut steps = 0u64;

        if self.config.reset == ResetPolicy::Once {
            scratch.reset();
            scratch.restore_memory(&snapshot);
        }

        for round in 0..self.config.rounds {
            if self.config.reset == ResetPolicy::EveryRound {
                scratch.reset();
                scratch.restore_memory(&snapshot);
            } else {
                scratch.reset();
            }

            let input = round_input(round, rng);
            inputs[..4].copy_from_slice(&encode_i32(input));
            inject_inputs(&mut scratch, solution, &inputs)?;

            match self.engine.run(&mut scratch, 0, &self.config.budget) {
                Ok(outcome) => steps += outcome.steps,
                Err(fault) => {
                    debug!(
                        round,
                        %fault,
                        engine = self.engine.name(),
                        "execution fault; applying penalty"
                    );
                    return Ok(EvaluationReport {
                        fitness: Fitness::worst(task),
                        rounds: round,
                        steps,
                        fault: Some(fault.to_string()),
                    });
                }
            }

            let outputs = extract_outputs(&scratch, solution)?;
            let raw = outputs.first().copied().unwrap_or_default();
            let output = decode_u32(raw)?;
            fitness = score_round(fitness, input, output);
            trace!(round, input, output, %fitness, "round scored");
        }

        Ok(EvaluationReport { fitness, rounds: self.config.rounds, steps, fault: None })
    }
}

/// Fold one round's result into the running fitness.
pub fn score_round(fitness: Fitness, input: i32, output: u32) -> Fitness {
    match fitness {
        Fitness::Error(total) => {
            let diff = f64::from(output) - f64::from(input);
            Fitness::Error(saturating_accumulate(total, diff * diff))
        }
        Fitness::Points(points) => {
            if output % 2 != 0 {
                Fitness::Points(points.saturating_add(1))
            } else {
                Fitness::Points(points)
            }
        }
    }
}

fn check_signature(solution: &CandidateFunction) -> Result<(), EvaluationError> {
    let unsupported = |reason: &str| EvaluationError::UnsupportedSignature {
        function: solution.name.clone(),
        reason: reason.to_string(),
    };
    match solution.inputs.first() {
        Some(first) if first.ty == ValueType::I32 => {}
        _ => return Err(unsupported("first input must be i32")),
    }
    match solution.outputs.first() {
        Some(first) if first.ty == ValueType::I32 => Ok(()),
        _ => Err(unsupported("first output must be i32")),
    }
}
