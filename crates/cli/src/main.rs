use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use evolve_cli::commands::{init_task_command, list_ops_command, run_command, RunOptions};
use evolve_cli::init_tracing;

/// Evolutionary program synthesis over typed primitive-operation programs.
///
/// This CLI is a thin wrapper around `evolve-core` (exposed in code as
/// `evolve_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(name = "evolve", version, about = "Evolve small typed programs", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the primitive operations available to task files.
    Ops {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Write a starter task file.
    ///
    /// The format follows the extension: `.json` writes JSON, anything else YAML.
    InitTask {
        /// Where to write the task file.
        #[arg(long)]
        path: String,

        /// Task name. Defaults to the file stem.
        #[arg(long)]
        name: Option<String>,

        /// Scoring task: `regression` or `parity`.
        #[arg(long, default_value = "regression")]
        task: String,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Build a random population for a task and score it.
    ///
    /// This will:
    /// - Generate `population` individuals from the task's signature.
    /// - Evaluate them in parallel on a worker pool.
    /// - Print every individual's fitness and the best program.
    Run {
        /// Path to the task file (YAML or JSON).
        #[arg(long)]
        task: PathBuf,

        /// Seed overriding the task file's; random when neither is set.
        #[arg(long)]
        seed: Option<u64>,

        /// Worker threads overriding the task file's.
        #[arg(long)]
        threads: Option<usize>,

        /// Emit the run report as JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Also write the JSON run report to this file.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Ops { json } => list_ops_command(json)?,
        Command::InitTask { path, name, task, force } => {
            init_task_command(&path, name, &task, force)?
        }
        Command::Run { task, seed, threads, json, out } => {
            run_command(&RunOptions { task_path: task, seed, threads, json, out })?
        }
    }

    Ok(())
}
