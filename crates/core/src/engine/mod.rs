//! Execution engines.
//!
//! The evaluator only needs something that runs a program from its entry point
//! and leaves results in memory. The target program is always passed in
//! explicitly; there is no process-wide "current program".

pub mod interpreter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ShapeError, ValueType};
use crate::program::{LookupError, Program};

pub use interpreter::Interpreter;

/// Default cap on executed instructions per run.
pub const DEFAULT_MAX_STEPS: u64 = 10_000;

/// Upper bound on the work one run may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionBudget {
    pub max_steps: u64,
}

impl ExecutionBudget {
    pub fn new(max_steps: u64) -> Self {
        Self { max_steps }
    }
}

impl Default for ExecutionBudget {
    fn default() -> Self {
        Self { max_steps: DEFAULT_MAX_STEPS }
    }
}

/// Bookkeeping reported by a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOutcome {
    pub steps: u64,
    pub calls: usize,
}

/// Faults raised while running a program.
///
/// The evaluator treats every variant as a property of the candidate, not a
/// failure of the evaluation itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Execution budget of {0} steps exhausted")]
    BudgetExhausted(u64),
    #[error("Call stack overflow at depth {0}")]
    StackOverflow(usize),
    #[error("Division by zero in '{0}'")]
    DivisionByZero(String),
    #[error("Entry point has no instruction at index {0}")]
    InvalidStart(usize),
    #[error("Memory access {offset}..{end} outside buffer of {memory} bytes")]
    MemoryOutOfBounds { offset: usize, end: usize, memory: usize },
    #[error("Call to '{callee}' binds {found} {direction} values, callee declares {expected}")]
    CallArity { callee: String, direction: &'static str, expected: usize, found: usize },
    #[error("Value of type {found} where {expected} was expected")]
    TypeMismatch { expected: ValueType, found: ValueType },
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Something that can run a program to completion.
pub trait ExecutionEngine: Send + Sync {
    /// Human-readable engine name.
    fn name(&self) -> &'static str;

    /// Run `program` from `main`, starting at instruction `start`, until the
    /// entry point returns or a fault occurs. Results are left in memory.
    fn run(
        &self,
        program: &mut Program,
        start: usize,
        budget: &ExecutionBudget,
    ) -> Result<RunOutcome, EngineError>;
}
