mod common;

use evolve_core::engine::{ExecutionBudget, ExecutionEngine, Interpreter};
use evolve_core::program::marshal::{decode_u32, encode_i32, extract_outputs, inject_inputs};
use evolve_core::services::{evaluation_seed, EvaluationConfig, Fitness, PopulationEvaluator, Task};

use common::{constant_one, constant_zero, divides_by_zero, identity, solution_of};

#[test]
fn results_follow_population_order() {
    let population = vec![identity(), divides_by_zero(), constant_one(), constant_zero()];
    let solution = solution_of(&population[0]);
    let config = EvaluationConfig::new(Task::Parity, 5);
    let engine = Interpreter;

    let results = PopulationEvaluator::new(&engine, &config, 4)
        .with_threads(Some(2))
        .evaluate(&population, &solution)
        .expect("schedule");

    assert_eq!(results.len(), 4);
    let reports: Vec<_> = results.into_iter().map(|r| r.expect("report")).collect();
    assert!(reports[1].fault.is_some());
    assert_eq!(reports[2].fitness, Fitness::Points(5));
    assert_eq!(reports[3].fitness, Fitness::Points(0));
    assert!(reports[0].fault.is_none());
}

#[test]
fn same_seed_is_reproducible_across_thread_counts() {
    let population = vec![constant_zero(), identity(), constant_zero()];
    let solution = solution_of(&population[0]);
    let config = EvaluationConfig::new(Task::Regression, 3);
    let engine = Interpreter;

    let single = PopulationEvaluator::new(&engine, &config, 42)
        .with_threads(Some(1))
        .evaluate(&population, &solution)
        .expect("single");
    let many = PopulationEvaluator::new(&engine, &config, 42)
        .with_threads(Some(3))
        .evaluate(&population, &solution)
        .expect("many");
    assert_eq!(single, many);

    // Identical individuals at different indices draw different probes.
    let first = single[0].as_ref().expect("first").fitness;
    let third = single[2].as_ref().expect("third").fitness;
    assert_ne!(first, third);
}

#[test]
fn empty_population_yields_no_results() {
    let config = EvaluationConfig::new(Task::Parity, 1);
    let engine = Interpreter;
    let solution = solution_of(&identity());
    let results = PopulationEvaluator::new(&engine, &config, 0)
        .evaluate(&[], &solution)
        .expect("schedule");
    assert!(results.is_empty());
}

#[test]
fn evaluation_seeds_differ_per_index() {
    assert_ne!(evaluation_seed(1, 0), evaluation_seed(1, 1));
    assert_eq!(evaluation_seed(1, 5), evaluation_seed(1, 5));
}

#[test]
fn clones_run_concurrently_without_interference() {
    let template = identity();
    let solution = solution_of(&template);
    let engine = Interpreter;
    let budget = ExecutionBudget::default();

    let outputs: Vec<u32> = std::thread::scope(|scope| {
        let handles: Vec<_> = [17, 91]
            .into_iter()
            .map(|input| {
                let mut program = template.clone();
                let solution = &solution;
                let engine = &engine;
                let budget = &budget;
                scope.spawn(move || {
                    for _ in 0..200 {
                        program.reset();
                        inject_inputs(&mut program, solution, &encode_i32(input)).unwrap();
                        engine.run(&mut program, 0, budget).unwrap();
                    }
                    decode_u32(extract_outputs(&program, solution).unwrap()[0]).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(outputs, vec![17, 91]);
    assert!(template.memory.iter().all(|b| *b == 0));
}
