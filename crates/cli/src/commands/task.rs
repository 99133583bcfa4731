use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use evolve_core::catalog::Catalog;
use evolve_core::model::{FunctionSignature, ParamSpec, ValueType};
use evolve_core::services::{ResetPolicy, Task};
use serde::{Deserialize, Serialize};

use crate::sha256_bytes;

/// An evolution task as written in a YAML or JSON task file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TaskSpec {
    pub name: String,
    pub task: Task,
    pub rounds: usize,
    pub population: usize,
    /// Body length of every generated solution.
    pub instructions: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub max_steps: Option<u64>,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub reset: ResetPolicy,
    pub signature: FunctionSignature,
    /// Catalog subset to build from; empty means the whole standard catalog.
    #[serde(default)]
    pub operations: Vec<String>,
}

impl TaskSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(anyhow!("Task 'name' is required"));
        }
        if self.rounds == 0 {
            return Err(anyhow!("Task 'rounds' must be at least 1"));
        }
        if self.population == 0 {
            return Err(anyhow!("Task 'population' must be at least 1"));
        }
        if self.instructions == 0 {
            return Err(anyhow!("Task 'instructions' must be at least 1"));
        }
        if self.threads == Some(0) {
            return Err(anyhow!("Task 'threads' must be at least 1 when set"));
        }
        match self.signature.inputs.first() {
            Some(p) if p.ty == ValueType::I32 => {}
            _ => return Err(anyhow!("Task signature must start with an i32 input")),
        }
        match self.signature.outputs.first() {
            Some(p) if p.ty == ValueType::I32 => {}
            _ => return Err(anyhow!("Task signature must declare an i32 output first")),
        }
        Ok(())
    }

    /// Catalog the population is built from.
    pub fn catalog(&self) -> Result<Catalog> {
        let standard = Catalog::standard();
        if self.operations.is_empty() {
            return Ok(standard);
        }
        standard.subset(&self.operations).context("Invalid 'operations' list in task")
    }

    /// Starter task written by `init-task`.
    pub fn sample(name: &str, task: Task) -> Self {
        TaskSpec {
            name: name.to_string(),
            task,
            rounds: 10,
            population: 32,
            instructions: 8,
            seed: None,
            max_steps: None,
            threads: None,
            reset: ResetPolicy::EveryRound,
            signature: FunctionSignature {
                inputs: vec![ParamSpec::new("x", ValueType::I32)],
                outputs: vec![ParamSpec::new("y", ValueType::I32)],
                locals: vec![
                    ParamSpec::new("t0", ValueType::I32),
                    ParamSpec::new("t1", ValueType::I32),
                    ParamSpec::new("cond", ValueType::Bool),
                ],
            },
            operations: Vec::new(),
        }
    }
}

pub fn parse_task(task: &str) -> Result<Task> {
    match task {
        "regression" => Ok(Task::Regression),
        "parity" => Ok(Task::Parity),
        other => Err(anyhow!("Invalid task '{}'. Allowed: regression, parity", other)),
    }
}

/// A parsed and validated task file together with the hash of its raw bytes.
#[derive(Debug, Clone)]
pub struct LoadedTask {
    pub spec: TaskSpec,
    pub hash: String,
}

/// Load a task file. `.json` files are parsed as JSON, anything else as YAML.
pub fn load_task_spec(path: &Path) -> Result<LoadedTask> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read task file at {}", path.display()))?;
    let hash = sha256_bytes(&bytes);
    let spec: TaskSpec = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_slice(&bytes).context("Failed to parse task JSON")?
    } else {
        serde_yaml::from_slice(&bytes).context("Failed to parse task YAML")?
    };
    spec.validate()?;
    Ok(LoadedTask { spec, hash })
}

/// Write a starter task file to `path`.
pub fn init_task_command(path: &str, name: Option<String>, task: &str, force: bool) -> Result<()> {
    let task = parse_task(task)?;
    let path = Path::new(path);
    if path.exists() && !force {
        return Err(anyhow!(
            "Task file already exists at {} (rerun with --force to overwrite)",
            path.display()
        ));
    }

    let name = name.unwrap_or_else(|| {
        path.file_stem().and_then(|s| s.to_str()).unwrap_or("unnamed-task").to_string()
    });
    let spec = TaskSpec::sample(&name, task);

    let contents = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::to_string_pretty(&spec).context("Failed to serialize task JSON")?
    } else {
        serde_yaml::to_string(&spec).context("Failed to serialize task YAML")?
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, contents)
        .with_context(|| format!("Failed to write task file at {}", path.display()))?;

    println!("Initialized task:");
    println!("  Name: {}", spec.name);
    println!("  Task: {}", spec.task.as_str());
    println!("  File: {}", path.display());
    Ok(())
}
