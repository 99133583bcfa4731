//! Evaluation services built on top of the program model and an engine.
//!
//! - `evaluation`: scoring one individual over a number of rounds.
//! - `scheduler`: scoring a whole population on a worker pool.

pub mod evaluation;
pub mod scheduler;

pub use evaluation::{
    round_input, saturating_accumulate, score_round, EvaluationConfig, EvaluationError,
    EvaluationReport, Evaluator, Fitness, ResetPolicy, Task,
};
pub use scheduler::{evaluation_seed, Completion, PopulationEvaluator, SchedulerError};
