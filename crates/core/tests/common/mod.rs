// Shared fixtures for evolve-core integration tests.
#![allow(dead_code)]

use evolve_core::catalog::Catalog;
use evolve_core::model::{
    CandidateFunction, FunctionSignature, Instruction, Package, ParamSpec, ValueType,
};
use evolve_core::program::adapter::adapt_solution;
use evolve_core::program::{Program, MAIN_FUNC, MAIN_PKG};

pub const SOLUTION: &str = "solution";

/// One i32 input, one i32 output, one i32 and one bool scratch slot.
pub fn signature() -> FunctionSignature {
    FunctionSignature {
        inputs: vec![ParamSpec::new("x", ValueType::I32)],
        outputs: vec![ParamSpec::new("out", ValueType::I32)],
        locals: vec![ParamSpec::new("t0", ValueType::I32), ParamSpec::new("flag", ValueType::Bool)],
    }
}

/// Template program: an empty `main` plus an empty-bodied solution.
pub fn template() -> Program {
    let package = Package::new(MAIN_PKG)
        .with_function(CandidateFunction::new(MAIN_FUNC, vec![], vec![], vec![]))
        .with_function(signature().layout(SOLUTION));
    Program::new(vec![package])
}

/// Individual whose solution body is `body(solution)`, already adapted.
pub fn individual_with(
    body: impl FnOnce(&CandidateFunction, &Catalog) -> Vec<Instruction>,
) -> Program {
    let catalog = Catalog::standard();
    let mut program = template();
    let solution = program.get_function_mut(SOLUTION, MAIN_PKG).expect("solution");
    solution.body = body(solution, &catalog);
    solution.refresh();
    adapt_solution(&mut program, SOLUTION).expect("adapt");
    program.fit_memory();
    program
}

pub fn solution_of(program: &Program) -> CandidateFunction {
    program.get_function(SOLUTION, MAIN_PKG).expect("solution").clone()
}

/// out = x
pub fn identity() -> Program {
    individual_with(|f, c| {
        vec![Instruction::primitive(
            c.get("i32.copy").unwrap(),
            vec![f.inputs[0].clone()],
            vec![f.outputs[0].clone()],
        )]
    })
}

/// out = 0
pub fn constant_zero() -> Program {
    individual_with(|f, c| {
        vec![Instruction::primitive(c.get("i32.zero").unwrap(), vec![], vec![f.outputs[0].clone()])]
    })
}

/// out = 1
pub fn constant_one() -> Program {
    individual_with(|f, c| {
        vec![Instruction::primitive(c.get("i32.one").unwrap(), vec![], vec![f.outputs[0].clone()])]
    })
}

/// t0 = 1; out = t0 + t0
pub fn constant_two() -> Program {
    individual_with(|f, c| {
        let t0 = f.locals[0].clone();
        vec![
            Instruction::primitive(c.get("i32.one").unwrap(), vec![], vec![t0.clone()]),
            Instruction::primitive(
                c.get("i32.add").unwrap(),
                vec![t0.clone(), t0],
                vec![f.outputs[0].clone()],
            ),
        ]
    })
}

/// out = x / 0
pub fn divides_by_zero() -> Program {
    individual_with(|f, c| {
        let t0 = f.locals[0].clone();
        vec![
            Instruction::primitive(c.get("i32.zero").unwrap(), vec![], vec![t0.clone()]),
            Instruction::primitive(
                c.get("i32.div").unwrap(),
                vec![f.inputs[0].clone(), t0],
                vec![f.outputs[0].clone()],
            ),
        ]
    })
}
