mod common;

use evolve_core::builder::{build_individual, init_solution, BuildError, RandomProgramBuilder};
use evolve_core::catalog::Catalog;
use evolve_core::model::{Instruction, Operator};
use evolve_core::program::{LookupError, MAIN_FUNC, MAIN_PKG};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use common::{signature, template, SOLUTION};

fn built_body(seed: u64, len: usize) -> Vec<Instruction> {
    let catalog = Catalog::standard();
    let mut function = signature().layout(SOLUTION);
    let mut rng = StdRng::seed_from_u64(seed);
    RandomProgramBuilder::new(&catalog).build(&mut function, len, &mut rng).expect("build");
    function.body
}

#[test]
fn same_seed_produces_same_body() {
    assert_eq!(built_body(42, 12), built_body(42, 12));
}

#[test]
fn built_body_has_requested_length_and_valid_shapes() {
    let catalog = Catalog::standard();
    let mut function = signature().layout(SOLUTION);
    let mut rng = StdRng::seed_from_u64(3);
    RandomProgramBuilder::new(&catalog).build(&mut function, 8, &mut rng).expect("build");

    assert_eq!(function.body.len(), 8);
    assert_eq!(function.length, 8);
    assert_eq!(function.size, function.footprint());
    for instr in &function.body {
        instr.check_shape().expect("bindings match operator shape");
    }
}

#[test]
fn inputs_only_read_slots_defined_earlier() {
    let catalog = Catalog::standard();
    let mut function = signature().layout(SOLUTION);
    let mut rng = StdRng::seed_from_u64(99);
    RandomProgramBuilder::new(&catalog).build(&mut function, 16, &mut rng).expect("build");

    let mut defined = function.inputs.clone();
    for instr in &function.body {
        for input in &instr.inputs {
            assert!(
                defined.iter().any(|d| d.same_slot(input)),
                "{} reads {} before it is written",
                instr,
                input
            );
        }
        defined.extend(instr.outputs.iter().cloned());
    }
}

#[test]
fn existing_instructions_are_preserved() {
    let catalog = Catalog::standard();
    let mut function = signature().layout(SOLUTION);
    let seed_instr = Instruction::primitive(
        catalog.get("i32.copy").unwrap(),
        vec![function.inputs[0].clone()],
        vec![function.locals[0].clone()],
    );
    function.body.push(seed_instr.clone());

    let mut rng = StdRng::seed_from_u64(5);
    RandomProgramBuilder::new(&catalog).build(&mut function, 4, &mut rng).expect("build");

    assert_eq!(function.body.len(), 4);
    assert_eq!(function.body[0], seed_instr);
}

#[test]
fn full_body_is_kept_without_drawing() {
    let catalog = Catalog::standard();
    let mut function = signature().layout(SOLUTION);
    let mut rng = StdRng::seed_from_u64(8);
    RandomProgramBuilder::new(&catalog).build(&mut function, 3, &mut rng).expect("first build");
    let before = function.body.clone();

    let mut rng = StdRng::seed_from_u64(13);
    RandomProgramBuilder::new(&catalog).build(&mut function, 3, &mut rng).expect("second build");

    assert_eq!(function.body, before);
    assert_eq!(function.length, 3);
    assert_eq!(rng.gen::<u64>(), StdRng::seed_from_u64(13).gen::<u64>());
}

#[test]
fn body_longer_than_target_is_rejected() {
    let catalog = Catalog::standard();
    let mut function = signature().layout(SOLUTION);
    let mut rng = StdRng::seed_from_u64(8);
    RandomProgramBuilder::new(&catalog).build(&mut function, 5, &mut rng).expect("build");
    let before = function.clone();

    let err = RandomProgramBuilder::new(&catalog).build(&mut function, 2, &mut rng).unwrap_err();
    assert_eq!(err, BuildError::BodyTooLong { existing: 5, target: 2 });
    assert_eq!(function, before);
}

#[test]
fn empty_catalog_fails_fast() {
    let catalog = Catalog::new();
    let mut function = signature().layout(SOLUTION);
    let mut rng = StdRng::seed_from_u64(1);
    let err = RandomProgramBuilder::new(&catalog).build(&mut function, 3, &mut rng).unwrap_err();
    assert_eq!(err, BuildError::EmptyCatalog);
    assert!(function.body.is_empty());
}

#[test]
fn zero_length_is_rejected() {
    let catalog = Catalog::standard();
    let mut function = signature().layout(SOLUTION);
    let mut rng = StdRng::seed_from_u64(1);
    let err = RandomProgramBuilder::new(&catalog).build(&mut function, 0, &mut rng).unwrap_err();
    assert_eq!(err, BuildError::ZeroLength);
}

#[test]
fn catalog_without_a_fitting_final_operation_fails() {
    // Only boolean producers: nothing can write the i32 output.
    let catalog = Catalog::standard().subset(&["i32.lt", "bool.not"]).unwrap();
    let mut function = signature().layout(SOLUTION);
    let mut rng = StdRng::seed_from_u64(1);
    let err = RandomProgramBuilder::new(&catalog).build(&mut function, 2, &mut rng).unwrap_err();
    assert_eq!(err, BuildError::NoEligibleOperation { position: 1 });
}

#[test]
fn init_solution_reports_missing_function() {
    let catalog = Catalog::standard();
    let mut program = template();
    let mut rng = StdRng::seed_from_u64(1);
    let err = init_solution(&mut program, "nope", &catalog, 3, &mut rng).unwrap_err();
    assert_eq!(
        err,
        BuildError::Lookup(LookupError::FunctionNotFound {
            package: MAIN_PKG.into(),
            function: "nope".into()
        })
    );
}

#[test]
fn build_individual_wires_main_and_leaves_template_untouched() {
    let catalog = Catalog::standard();
    let template = template();
    let mut rng = StdRng::seed_from_u64(11);

    let individual = build_individual(&template, SOLUTION, &catalog, 5, &mut rng).expect("build");

    let main_fn = individual.get_function(MAIN_FUNC, MAIN_PKG).unwrap();
    assert_eq!(main_fn.body.len(), 1);
    assert_eq!(main_fn.body[0].operator, Operator::Call(SOLUTION.into()));
    assert_eq!(individual.get_function(SOLUTION, MAIN_PKG).unwrap().body.len(), 5);
    assert!(template.get_function(SOLUTION, MAIN_PKG).unwrap().body.is_empty());
    assert!(individual.memory.len() >= individual.required_memory());
}

proptest! {
    #[test]
    fn last_instruction_writes_declared_output(seed in any::<u64>(), len in 1usize..24) {
        let body = built_body(seed, len);
        let declared = signature().layout(SOLUTION).outputs[0].clone();
        let last = body.last().expect("non-empty body");
        prop_assert_eq!(body.len(), len);
        prop_assert_eq!(&last.outputs, &vec![declared]);
    }

    #[test]
    fn wiring_is_deterministic_per_seed(seed in any::<u64>(), len in 1usize..16) {
        prop_assert_eq!(built_body(seed, len), built_body(seed, len));
    }
}
