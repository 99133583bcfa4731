use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use evolve_core::builder::build_individual;
use evolve_core::engine::{ExecutionBudget, Interpreter, DEFAULT_MAX_STEPS};
use evolve_core::model::{CandidateFunction, Package};
use evolve_core::program::{Program, MAIN_FUNC, MAIN_PKG};
use evolve_core::services::{EvaluationConfig, Fitness, PopulationEvaluator, Task};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::commands::{load_task_spec, TaskSpec};

/// Name of the evolved function inside the `main` package.
pub const SOLUTION_FUNC: &str = "solution";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub task_path: PathBuf,
    pub seed: Option<u64>,
    pub threads: Option<usize>,
    pub json: bool,
    pub out: Option<PathBuf>,
}

#[derive(Debug, Serialize, Clone)]
pub struct IndividualResult {
    pub index: usize,
    pub fitness: Option<Fitness>,
    pub rounds: usize,
    pub steps: u64,
    pub fault: Option<String>,
    /// Build or evaluation error that kept this individual from being scored.
    pub error: Option<String>,
    pub program: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct RunReport {
    pub name: String,
    pub task: Task,
    pub task_hash: String,
    pub seed: u64,
    pub population: usize,
    pub rounds: usize,
    pub instructions: usize,
    pub started_at: String,
    pub finished_at: String,
    /// Population index of the best-scoring individual.
    pub best: Option<usize>,
    /// Ranked best-first; unscored individuals come last.
    pub individuals: Vec<IndividualResult>,
}

/// Template every individual is derived from: an empty `main` and the
/// solution laid out from the task's signature.
pub fn template_program(spec: &TaskSpec) -> Program {
    let package = Package::new(MAIN_PKG)
        .with_function(CandidateFunction::new(MAIN_FUNC, vec![], vec![], vec![]))
        .with_function(spec.signature.layout(SOLUTION_FUNC));
    Program::new(vec![package])
}

pub fn evaluation_config(spec: &TaskSpec) -> EvaluationConfig {
    EvaluationConfig::new(spec.task, spec.rounds)
        .with_budget(ExecutionBudget::new(spec.max_steps.unwrap_or(DEFAULT_MAX_STEPS)))
        .with_reset(spec.reset)
}

/// Build a population, score it, and rank the results.
pub fn evolve_population(
    spec: &TaskSpec,
    seed: u64,
    threads: Option<usize>,
) -> Result<Vec<IndividualResult>> {
    let catalog = spec.catalog()?;
    let template = template_program(spec);
    let solution = template
        .get_function(SOLUTION_FUNC, MAIN_PKG)
        .context("Template is missing its solution function")?
        .clone();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut population = Vec::with_capacity(spec.population);
    let mut indices = Vec::with_capacity(spec.population);
    let mut results = Vec::new();
    for index in 0..spec.population {
        match build_individual(&template, SOLUTION_FUNC, &catalog, spec.instructions, &mut rng) {
            Ok(individual) => {
                population.push(individual);
                indices.push(index);
            }
            Err(err) => {
                warn!(index, %err, "failed to build individual");
                results.push(IndividualResult {
                    index,
                    fitness: None,
                    rounds: 0,
                    steps: 0,
                    fault: None,
                    error: Some(err.to_string()),
                    program: None,
                });
            }
        }
    }
    if population.is_empty() {
        let reason = results.first().and_then(|r| r.error.clone()).unwrap_or_default();
        return Err(anyhow!("No individual could be built: {}", reason));
    }

    let config = evaluation_config(spec);
    let engine = Interpreter;
    let reports = PopulationEvaluator::new(&engine, &config, seed)
        .with_threads(threads.or(spec.threads))
        .evaluate(&population, &solution)
        .context("Failed to evaluate population")?;

    for ((index, individual), report) in indices.into_iter().zip(&population).zip(reports) {
        let program = individual
            .get_function(SOLUTION_FUNC, MAIN_PKG)
            .ok()
            .map(|f| f.to_string());
        results.push(match report {
            Ok(report) => IndividualResult {
                index,
                fitness: Some(report.fitness),
                rounds: report.rounds,
                steps: report.steps,
                fault: report.fault,
                error: None,
                program,
            },
            Err(err) => IndividualResult {
                index,
                fitness: None,
                rounds: 0,
                steps: 0,
                fault: None,
                error: Some(err.to_string()),
                program,
            },
        });
    }

    rank(&mut results);
    Ok(results)
}

/// Sort best-first; ties keep population order and unscored entries sink.
pub fn rank(results: &mut [IndividualResult]) {
    results.sort_by(|a, b| match (&a.fitness, &b.fitness) {
        (Some(fa), Some(fb)) => fa.compare(fb).then(a.index.cmp(&b.index)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.index.cmp(&b.index),
    });
}

pub fn run_command(opts: &RunOptions) -> Result<()> {
    let started_at = Utc::now().to_rfc3339();
    let loaded = load_task_spec(&opts.task_path)?;
    let spec = loaded.spec;
    let seed = opts.seed.or(spec.seed).unwrap_or_else(rand::random);

    info!(task = %spec.name, seed, population = spec.population, "starting run");
    let individuals = evolve_population(&spec, seed, opts.threads)?;
    let best = individuals.first().filter(|r| r.fitness.is_some()).map(|r| r.index);

    let report = RunReport {
        name: spec.name.clone(),
        task: spec.task,
        task_hash: loaded.hash,
        seed,
        population: spec.population,
        rounds: spec.rounds,
        instructions: spec.instructions,
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        best,
        individuals,
    };

    if let Some(out) = &opts.out {
        write_report(out, &report)?;
    }

    if opts.json {
        let serialized =
            serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
        println!("{}", serialized);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report dir {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write run report at {}", path.display()))
}

fn print_report(report: &RunReport) {
    println!("Run: {} [{}]", report.name, report.task.as_str());
    println!("  Seed: {}", report.seed);
    println!("  Population: {}", report.population);
    println!("  Rounds: {}", report.rounds);
    println!();
    println!("Individuals (best first):");
    for result in &report.individuals {
        match (&result.fitness, &result.error) {
            (Some(fitness), _) => {
                let fault =
                    result.fault.as_deref().map(|f| format!(" fault: {f}")).unwrap_or_default();
                println!("  - #{} {} steps={}{}", result.index, fitness, result.steps, fault);
            }
            (None, Some(err)) => println!("  - #{} error: {}", result.index, err),
            (None, None) => println!("  - #{} (unscored)", result.index),
        }
    }

    match report.individuals.first() {
        Some(best) if best.fitness.is_some() => {
            println!();
            println!("Best individual: #{}", best.index);
            if let Some(program) = &best.program {
                println!("{}", program);
            }
        }
        _ => println!("No individual was scored."),
    }
}
