//! Random construction of candidate function bodies.
//!
//! The builder draws operations from a [`Catalog`] and wires every binding to
//! a memory slot of matching type:
//! - inputs come from slots already defined at that point (the function's
//!   inputs plus every output written by an earlier instruction);
//! - outputs go to any declared variable (inputs, outputs, locals);
//! - the last instruction always writes the function's declared output.
//!
//! All randomness comes from the caller's RNG, so a fixed seed reproduces the
//! same body.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{Catalog, PrimitiveOp};
use crate::model::{CandidateFunction, Instruction, ValueType, Variable};
use crate::program::adapter::adapt_solution;
use crate::program::{LookupError, Program, MAIN_PKG};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("The operation catalog is empty")]
    EmptyCatalog,
    #[error("Target body length must be at least 1")]
    ZeroLength,
    #[error("Existing body of {existing} instructions is longer than the target length {target}")]
    BodyTooLong { existing: usize, target: usize },
    #[error("Function '{0}' declares no output to write the result to")]
    MissingOutput(String),
    #[error("No catalog operation can be wired at instruction {position}")]
    NoEligibleOperation { position: usize },
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Builds random, well-typed function bodies from a catalog.
pub struct RandomProgramBuilder<'a> {
    catalog: &'a Catalog,
}

impl<'a> RandomProgramBuilder<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Extend `function`'s body to `target_len` instructions.
    ///
    /// Existing instructions are kept verbatim; only the missing tail is
    /// generated. A body already longer than `target_len` is rejected.
    /// `length` and `size` are recomputed on success.
    pub fn build<R: Rng + ?Sized>(
        &self,
        function: &mut CandidateFunction,
        target_len: usize,
        rng: &mut R,
    ) -> Result<(), BuildError> {
        if self.catalog.is_empty() {
            return Err(BuildError::EmptyCatalog);
        }
        if target_len == 0 {
            return Err(BuildError::ZeroLength);
        }
        if function.body.len() > target_len {
            return Err(BuildError::BodyTooLong {
                existing: function.body.len(),
                target: target_len,
            });
        }
        let result_slot = function
            .outputs
            .first()
            .cloned()
            .ok_or_else(|| BuildError::MissingOutput(function.name.clone()))?;

        let mut defined: Vec<Variable> = function.inputs.clone();
        for instr in &function.body {
            for out in &instr.outputs {
                define(&mut defined, out);
            }
        }

        let existing = function.body.len();
        for position in existing..target_len {
            let instr = if position + 1 == target_len {
                self.final_instruction(&defined, &result_slot, position, rng)?
            } else {
                self.inner_instruction(function, &defined, position, rng)?
            };
            for out in &instr.outputs {
                define(&mut defined, out);
            }
            function.body.push(instr);
        }

        function.refresh();
        debug!(
            function = %function.name,
            preserved = existing,
            length = function.length,
            size = function.size,
            "built candidate body"
        );
        Ok(())
    }

    fn inner_instruction<R: Rng + ?Sized>(
        &self,
        function: &CandidateFunction,
        defined: &[Variable],
        position: usize,
        rng: &mut R,
    ) -> Result<Instruction, BuildError> {
        let eligible: Vec<&Arc<PrimitiveOp>> = self
            .catalog
            .iter()
            .filter(|op| inputs_available(op, defined))
            .filter(|op| op.outputs.iter().all(|ty| has_type(function.declared_variables(), *ty)))
            .collect();
        let op = eligible.choose(rng).ok_or(BuildError::NoEligibleOperation { position })?;

        let inputs = pick_bindings(&op.inputs, defined.iter(), position, rng)?;
        let outputs = pick_bindings(&op.outputs, function.declared_variables(), position, rng)?;
        Ok(Instruction::primitive(Arc::clone(op), inputs, outputs))
    }

    fn final_instruction<R: Rng + ?Sized>(
        &self,
        defined: &[Variable],
        result_slot: &Variable,
        position: usize,
        rng: &mut R,
    ) -> Result<Instruction, BuildError> {
        let eligible: Vec<&Arc<PrimitiveOp>> = self
            .catalog
            .iter()
            .filter(|op| op.outputs.as_slice() == [result_slot.ty])
            .filter(|op| inputs_available(op, defined))
            .collect();
        let op = eligible.choose(rng).ok_or(BuildError::NoEligibleOperation { position })?;

        let inputs = pick_bindings(&op.inputs, defined.iter(), position, rng)?;
        Ok(Instruction::primitive(Arc::clone(op), inputs, vec![result_slot.clone()]))
    }
}

fn define(defined: &mut Vec<Variable>, var: &Variable) {
    if !defined.iter().any(|d| d.same_slot(var)) {
        defined.push(var.clone());
    }
}

fn has_type<'v>(mut vars: impl Iterator<Item = &'v Variable>, ty: ValueType) -> bool {
    vars.any(|v| v.ty == ty)
}

fn inputs_available(op: &PrimitiveOp, defined: &[Variable]) -> bool {
    op.inputs.iter().all(|ty| has_type(defined.iter(), *ty))
}

/// Pick one slot per expected type, uniformly among `pool` entries of that type.
fn pick_bindings<'v, R: Rng + ?Sized>(
    expected: &[ValueType],
    pool: impl Iterator<Item = &'v Variable> + Clone,
    position: usize,
    rng: &mut R,
) -> Result<Vec<Variable>, BuildError> {
    expected
        .iter()
        .map(|ty| {
            let candidates: Vec<&Variable> = pool.clone().filter(|v| v.ty == *ty).collect();
            candidates
                .choose(rng)
                .map(|v| (*v).clone())
                .ok_or(BuildError::NoEligibleOperation { position })
        })
        .collect()
}

/// Build the solution function of `program` in place, up to `target_len` instructions.
pub fn init_solution<R: Rng + ?Sized>(
    program: &mut Program,
    solution_name: &str,
    catalog: &Catalog,
    target_len: usize,
    rng: &mut R,
) -> Result<(), BuildError> {
    let solution = program.get_function_mut(solution_name, MAIN_PKG)?;
    RandomProgramBuilder::new(catalog).build(solution, target_len, rng)?;
    program.fit_memory();
    Ok(())
}

/// Derive a fully-wired individual from an immutable template.
///
/// The template is deep-copied, its solution body generated, and `main`
/// rewired to call it. A failure here affects only this individual.
pub fn build_individual<R: Rng + ?Sized>(
    template: &Program,
    solution_name: &str,
    catalog: &Catalog,
    target_len: usize,
    rng: &mut R,
) -> Result<Program, BuildError> {
    let mut individual = template.clone();
    init_solution(&mut individual, solution_name, catalog, target_len, rng)?;
    adapt_solution(&mut individual, solution_name)?;
    individual.reset();
    Ok(individual)
}
