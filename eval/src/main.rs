mod cli;
mod judge;
mod report;
mod results;
mod rubric;
mod run;
mod score;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "eval", version, about = "Documentation benchmark evaluator")]
struct Cli {
    /// Path to the benchmark config (defaults are used if missing).
    #[arg(long, global = true, default_value = "bench.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available test cases.
    List,
    /// Run test cases through the participant and score them.
    Run {
        /// Case ids to run; empty means all.
        case_ids: Vec<String>,
        /// Run every discovered case.
        #[arg(long)]
        all: bool,
        /// Repeat each case this many times.
        #[arg(long, default_value_t = 1)]
        runs: u32,
        /// Worker threads for independent cases.
        #[arg(long, default_value_t = 1)]
        jobs: usize,
    },
    /// Aggregate persisted results for a case.
    Report { case_id: String },
    /// Score the synthetic calibration documents against their expected ranges.
    ValidateRubric,
    /// Remove persisted results for a case.
    Clean { case_id: String },
}

fn main() -> Result<()> {
    harness::logging::init();
    let cli = Cli::parse();
    match cli.command {
        Command::List => cli::list_cases(&cli.config),
        Command::Run {
            case_ids,
            all,
            runs,
            jobs,
        } => cli::run_cases(&cli.config, &case_ids, all, runs, jobs),
        Command::Report { case_id } => cli::report_case(&cli.config, &case_id),
        Command::ValidateRubric => cli::validate_rubric_cmd(&cli.config),
        Command::Clean { case_id } => cli::clean_case(&cli.config, &case_id),
    }
}
