mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::amortize::{ScheduleArgs, TotalsArgs};
use commands::eligibility::EligibilityArgs;
use commands::lifecycle::LifecycleArgs;

/// SACCO loan lifecycle and repayment calculations
#[derive(Parser)]
#[command(
    name = "sacco",
    version,
    about = "SACCO loan lifecycle and repayment calculations",
    long_about = "A CLI for SACCO loan computations with decimal precision. \
                  Supports amortization schedules (flat and reducing-balance), \
                  member eligibility evaluation, and full loan lifecycle \
                  simulation: application, multi-admin approval, guarantors, \
                  disbursement, repayments and penalty sweeps."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an amortization schedule
    Schedule(ScheduleArgs),
    /// Compute frozen loan totals (interest, repayable, installment)
    Totals(TotalsArgs),
    /// Evaluate member eligibility for a requested principal
    Eligibility(EligibilityArgs),
    /// Run a full loan lifecycle scenario from a JSON description
    Lifecycle(LifecycleArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Schedule(args) => commands::amortize::run_schedule(args),
        Commands::Totals(args) => commands::amortize::run_totals(args),
        Commands::Eligibility(args) => commands::eligibility::run_eligibility(args),
        Commands::Lifecycle(args) => commands::lifecycle::run_lifecycle(args),
        Commands::Version => {
            println!("sacco {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
