use std::ops::Range;

use crate::catalog::{OpKind, PrimitiveOp};
use crate::engine::{EngineError, ExecutionBudget, ExecutionEngine, RunOutcome};
use crate::model::{CandidateFunction, Operator, Package, Value, Variable};
use crate::program::{CallFrame, LookupError, Program, CALL_STACK_SIZE, MAIN_FUNC, MAIN_PKG};

/// Reference engine: walks the instruction graph directly over program memory.
///
/// Integer arithmetic wraps. Calls copy bound inputs into the callee's input
/// slots and copy the callee's outputs back into the bound output slots on
/// return.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutionEngine for Interpreter {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn run(
        &self,
        program: &mut Program,
        start: usize,
        budget: &ExecutionBudget,
    ) -> Result<RunOutcome, EngineError> {
        let Program { packages, memory, call_stack, call_counter, stack_pointer, terminated } =
            program;
        let packages: &[Package] = packages;

        let entry = find_package(packages, MAIN_PKG)?.get_function(MAIN_FUNC)?;
        if start > entry.body.len() {
            return Err(EngineError::InvalidStart(start));
        }

        call_stack.clear();
        *terminated = false;
        call_stack.push(CallFrame {
            package: MAIN_PKG.to_string(),
            function: MAIN_FUNC.to_string(),
            pc: start,
            returns_to: Vec::new(),
        });
        *stack_pointer += entry.size;

        let mut outcome = RunOutcome::default();

        while let Some(frame) = call_stack.last() {
            let package = find_package(packages, &frame.package)?;
            let function = package.get_function(&frame.function)?;

            let Some(instr) = function.body.get(frame.pc) else {
                if let Some(finished) = call_stack.pop() {
                    *stack_pointer = stack_pointer.saturating_sub(function.size);
                    copy_slots(memory, &function.outputs, &finished.returns_to)?;
                }
                continue;
            };

            outcome.steps += 1;
            if outcome.steps > budget.max_steps {
                return Err(EngineError::BudgetExhausted(budget.max_steps));
            }
            if let Some(frame) = call_stack.last_mut() {
                frame.pc += 1;
            }

            match &instr.operator {
                Operator::Primitive(op) => {
                    instr.check_shape()?;
                    let args = instr
                        .inputs
                        .iter()
                        .map(|var| read(memory, var))
                        .collect::<Result<Vec<_>, _>>()?;
                    let results = apply(op, &args)?;
                    for (var, value) in instr.outputs.iter().zip(&results) {
                        write(memory, var, value)?;
                    }
                }
                Operator::Call(callee_name) => {
                    let callee = package.get_function(callee_name)?;
                    check_call(callee, &instr.inputs, &instr.outputs)?;
                    if call_stack.len() >= CALL_STACK_SIZE {
                        return Err(EngineError::StackOverflow(call_stack.len()));
                    }
                    copy_slots(memory, &instr.inputs, &callee.inputs)?;
                    call_stack.push(CallFrame {
                        package: package.name.clone(),
                        function: callee.name.clone(),
                        pc: 0,
                        returns_to: instr.outputs.clone(),
                    });
                    *call_counter += 1;
                    *stack_pointer += callee.size;
                    outcome.calls += 1;
                }
            }
        }

        *terminated = true;
        Ok(outcome)
    }
}

fn find_package<'p>(packages: &'p [Package], name: &str) -> Result<&'p Package, LookupError> {
    packages
        .iter()
        .find(|pkg| pkg.name == name)
        .ok_or_else(|| LookupError::PackageNotFound(name.to_string()))
}

fn check_call(
    callee: &CandidateFunction,
    inputs: &[Variable],
    outputs: &[Variable],
) -> Result<(), EngineError> {
    for (direction, declared, bound) in
        [("input", &callee.inputs, inputs), ("output", &callee.outputs, outputs)]
    {
        if declared.len() != bound.len() {
            return Err(EngineError::CallArity {
                callee: callee.name.clone(),
                direction,
                expected: declared.len(),
                found: bound.len(),
            });
        }
        if let Some((d, b)) = declared.iter().zip(bound).find(|(d, b)| d.ty != b.ty) {
            return Err(EngineError::TypeMismatch { expected: d.ty, found: b.ty });
        }
    }
    Ok(())
}

fn checked_range(memory: &[u8], var: &Variable) -> Result<Range<usize>, EngineError> {
    let range = var.range();
    if range.end > memory.len() {
        return Err(EngineError::MemoryOutOfBounds {
            offset: range.start,
            end: range.end,
            memory: memory.len(),
        });
    }
    Ok(range)
}

fn read(memory: &[u8], var: &Variable) -> Result<Value, EngineError> {
    let range = checked_range(memory, var)?;
    let (start, end) = (range.start, range.end);
    Value::decode(var.ty, &memory[range]).ok_or(EngineError::MemoryOutOfBounds {
        offset: start,
        end,
        memory: memory.len(),
    })
}

fn write(memory: &mut [u8], var: &Variable, value: &Value) -> Result<(), EngineError> {
    if value.ty() != var.ty {
        return Err(EngineError::TypeMismatch { expected: var.ty, found: value.ty() });
    }
    let range = checked_range(memory, var)?;
    value.encode_into(&mut memory[range]);
    Ok(())
}

/// Copy bytes slot-to-slot, pairing `from[i]` with `to[i]`.
fn copy_slots(memory: &mut [u8], from: &[Variable], to: &[Variable]) -> Result<(), EngineError> {
    for (src, dst) in from.iter().zip(to) {
        if src.same_slot(dst) {
            continue;
        }
        let src_range = checked_range(memory, src)?;
        checked_range(memory, dst)?;
        memory.copy_within(src_range, dst.offset);
    }
    Ok(())
}

fn apply(op: &PrimitiveOp, args: &[Value]) -> Result<Vec<Value>, EngineError> {
    use Value::{Bool, I32, I64};

    let div_by_zero = || EngineError::DivisionByZero(op.name.clone());
    let value = match (op.kind, args) {
        (OpKind::I32Add, [I32(a), I32(b)]) => I32(a.wrapping_add(*b)),
        (OpKind::I32Sub, [I32(a), I32(b)]) => I32(a.wrapping_sub(*b)),
        (OpKind::I32Mul, [I32(a), I32(b)]) => I32(a.wrapping_mul(*b)),
        (OpKind::I32Div, [I32(_), I32(0)]) => return Err(div_by_zero()),
        (OpKind::I32Div, [I32(a), I32(b)]) => I32(a.wrapping_div(*b)),
        (OpKind::I32Mod, [I32(_), I32(0)]) => return Err(div_by_zero()),
        (OpKind::I32Mod, [I32(a), I32(b)]) => I32(a.wrapping_rem(*b)),
        (OpKind::I32BitAnd, [I32(a), I32(b)]) => I32(a & b),
        (OpKind::I32BitOr, [I32(a), I32(b)]) => I32(a | b),
        (OpKind::I32BitXor, [I32(a), I32(b)]) => I32(a ^ b),
        (OpKind::I32Shl, [I32(a), I32(b)]) => I32(a.wrapping_shl(*b as u32)),
        (OpKind::I32Shr, [I32(a), I32(b)]) => I32(a.wrapping_shr(*b as u32)),
        (OpKind::I32Neg, [I32(a)]) => I32(a.wrapping_neg()),
        (OpKind::I32Copy, [I32(a)]) => I32(*a),
        (OpKind::I32Zero, []) => I32(0),
        (OpKind::I32One, []) => I32(1),
        (OpKind::I32Lt, [I32(a), I32(b)]) => Bool(a < b),
        (OpKind::I32Gt, [I32(a), I32(b)]) => Bool(a > b),
        (OpKind::I32Eq, [I32(a), I32(b)]) => Bool(a == b),
        (OpKind::I32Select, [Bool(c), I32(a), I32(b)]) => I32(if *c { *a } else { *b }),
        (OpKind::BoolNot, [Bool(a)]) => Bool(!a),
        (OpKind::BoolAnd, [Bool(a), Bool(b)]) => Bool(*a && *b),
        (OpKind::BoolOr, [Bool(a), Bool(b)]) => Bool(*a || *b),
        (OpKind::I64Add, [I64(a), I64(b)]) => I64(a.wrapping_add(*b)),
        (OpKind::I64Mul, [I64(a), I64(b)]) => I64(a.wrapping_mul(*b)),
        (OpKind::I32ToI64, [I32(a)]) => I64(i64::from(*a)),
        (OpKind::I64ToI32, [I64(a)]) => I32(*a as i32),
        _ => {
            let expected = op.inputs.first().copied().unwrap_or(crate::model::ValueType::I32);
            let found = args.first().map(Value::ty).unwrap_or(expected);
            return Err(EngineError::TypeMismatch { expected, found });
        }
    };
    Ok(vec![value])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::model::{FunctionSignature, Instruction, ParamSpec, ValueType};
    use crate::program::adapter::adapt_solution;

    fn program_with_body(body: Vec<Instruction>) -> Program {
        let signature = FunctionSignature {
            inputs: vec![ParamSpec::new("a", ValueType::I32), ParamSpec::new("b", ValueType::I32)],
            outputs: vec![ParamSpec::new("out", ValueType::I32)],
            locals: vec![ParamSpec::new("flag", ValueType::Bool)],
        };
        let mut solution = signature.layout("solution");
        solution.body = body;
        solution.refresh();
        let package = Package::new(MAIN_PKG).with_function(solution);
        let mut program = Program::new(vec![package]);
        adapt_solution(&mut program, "solution").unwrap();
        program
    }

    fn vars(program: &Program) -> (Variable, Variable, Variable, Variable) {
        let f = program.get_function("solution", MAIN_PKG).unwrap();
        (f.inputs[0].clone(), f.inputs[1].clone(), f.outputs[0].clone(), f.locals[0].clone())
    }

    fn set_inputs(program: &mut Program, a: i32, b: i32) {
        program.memory[0..4].copy_from_slice(&a.to_be_bytes());
        program.memory[4..8].copy_from_slice(&b.to_be_bytes());
    }

    fn output(program: &Program) -> i32 {
        i32::from_be_bytes(program.memory[8..12].try_into().unwrap())
    }

    #[test]
    fn runs_arithmetic_through_main_call() {
        let catalog = Catalog::standard();
        let mut program = program_with_body(vec![]);
        let (a, b, out, _) = vars(&program);
        let add = Instruction::primitive(catalog.get("i32.add").unwrap(), vec![a, b], vec![out]);
        program.get_function_mut("solution", MAIN_PKG).unwrap().body.push(add);
        set_inputs(&mut program, 40, 2);

        let outcome = Interpreter.run(&mut program, 0, &ExecutionBudget::default()).unwrap();

        assert_eq!(output(&program), 42);
        assert!(program.terminated);
        assert_eq!(program.call_counter, 1);
        assert_eq!(outcome.steps, 2);
        assert!(program.call_stack.is_empty());
        assert_eq!(program.stack_pointer, 0);
    }

    #[test]
    fn select_uses_boolean_local() {
        let catalog = Catalog::standard();
        let mut program = program_with_body(vec![]);
        let (a, b, out, flag) = vars(&program);
        let body = vec![
            Instruction::primitive(
                catalog.get("i32.lt").unwrap(),
                vec![a.clone(), b.clone()],
                vec![flag.clone()],
            ),
            Instruction::primitive(catalog.get("i32.select").unwrap(), vec![flag, a, b], vec![out]),
        ];
        program.get_function_mut("solution", MAIN_PKG).unwrap().body = body;
        set_inputs(&mut program, 3, 9);

        Interpreter.run(&mut program, 0, &ExecutionBudget::default()).unwrap();
        assert_eq!(output(&program), 3);
    }

    #[test]
    fn division_by_zero_is_a_fault() {
        let catalog = Catalog::standard();
        let mut program = program_with_body(vec![]);
        let (a, b, out, _) = vars(&program);
        let div = Instruction::primitive(catalog.get("i32.div").unwrap(), vec![a, b], vec![out]);
        program.get_function_mut("solution", MAIN_PKG).unwrap().body.push(div);
        set_inputs(&mut program, 1, 0);

        let err = Interpreter.run(&mut program, 0, &ExecutionBudget::default()).unwrap_err();
        assert_eq!(err, EngineError::DivisionByZero("i32.div".into()));
    }

    #[test]
    fn self_recursion_hits_the_stack_limit() {
        let mut program = program_with_body(vec![]);
        let (a, b, out, _) = vars(&program);
        let recurse = Instruction::call("solution", vec![a, b], vec![out]);
        program.get_function_mut("solution", MAIN_PKG).unwrap().body.push(recurse);

        let budget = ExecutionBudget::new(1_000_000);
        let err = Interpreter.run(&mut program, 0, &budget).unwrap_err();
        assert_eq!(err, EngineError::StackOverflow(CALL_STACK_SIZE));
    }

    #[test]
    fn budget_caps_executed_steps() {
        let catalog = Catalog::standard();
        let mut program = program_with_body(vec![]);
        let (a, b, out, _) = vars(&program);
        let add = Instruction::primitive(catalog.get("i32.add").unwrap(), vec![a, b], vec![out]);
        program.get_function_mut("solution", MAIN_PKG).unwrap().body = vec![add; 5];

        let err = Interpreter.run(&mut program, 0, &ExecutionBudget::new(3)).unwrap_err();
        assert_eq!(err, EngineError::BudgetExhausted(3));
    }

    #[test]
    fn start_past_the_entry_body_is_rejected() {
        let mut program = program_with_body(vec![]);
        let err = Interpreter.run(&mut program, 5, &ExecutionBudget::default()).unwrap_err();
        assert_eq!(err, EngineError::InvalidStart(5));
    }
}
