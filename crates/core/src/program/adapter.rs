//! Rewiring a program's entry point around the solution under evolution.

use crate::model::{CandidateFunction, Instruction, Operator};
use crate::program::{LookupError, Program, MAIN_FUNC, MAIN_PKG};

/// Replace `main` with a single call to `solution_name`.
///
/// `main`'s inputs become the solution's inputs followed by its outputs, which
/// reserves the solution's slots at their fixed offsets so callers can inject
/// inputs at offset 0 and read outputs back after a run. If `main` does not
/// exist yet it is added to the package.
pub fn adapt_solution(program: &mut Program, solution_name: &str) -> Result<(), LookupError> {
    let main_pkg = program.get_package_mut(MAIN_PKG)?;
    let solution = main_pkg.get_function(solution_name)?;

    let inputs: Vec<_> = solution.inputs.iter().chain(&solution.outputs).cloned().collect();
    let call = Instruction::call(
        solution.name.clone(),
        solution.inputs.clone(),
        solution.outputs.clone(),
    );
    let size = inputs.iter().map(|v| v.size()).sum();

    let main_fn = CandidateFunction {
        name: MAIN_FUNC.to_string(),
        inputs,
        outputs: Vec::new(),
        locals: Vec::new(),
        body: vec![call],
        length: 1,
        size,
    };

    match main_pkg.functions.iter_mut().find(|f| f.name == MAIN_FUNC) {
        Some(existing) => *existing = main_fn,
        None => main_pkg.functions.push(main_fn),
    }
    program.fit_memory();
    Ok(())
}

/// Overwrite the body of `solution_name` with `solution`'s instructions.
///
/// Instructions are copied slot by slot into the existing function, so the
/// individual keeps its own storage and nothing is shared with `solution` or
/// with any sibling derived from the same template. The function keeps its
/// name and `main`'s call is re-pointed at it. Both functions are looked up
/// before anything is written, so a lookup error leaves the program unchanged.
pub fn replace_solution(
    program: &mut Program,
    solution_name: &str,
    solution: &CandidateFunction,
) -> Result<(), LookupError> {
    let main_pkg = program.get_package_mut(MAIN_PKG)?;
    main_pkg.get_function(MAIN_FUNC)?;
    let target = main_pkg.get_function_mut(solution_name)?;

    target.body.truncate(solution.body.len());
    for (j, instr) in solution.body.iter().enumerate() {
        match target.body.get_mut(j) {
            Some(slot) => slot.clone_from(instr),
            None => target.body.push(instr.clone()),
        }
    }
    target.refresh();

    let main_fn = main_pkg.get_function_mut(MAIN_FUNC)?;
    if let Some(call) = main_fn.body.first_mut() {
        call.operator = Operator::Call(solution_name.to_string());
    }
    program.fit_memory();
    Ok(())
}
