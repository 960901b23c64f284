mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::optimize::{MpoArgs, SpoArgs};
use commands::portfolio::PortfolioArgs;

/// Portfolio tracking and convex rebalancing
#[derive(Parser)]
#[command(
    name = "ctrader",
    version,
    about = "Portfolio tracking and convex rebalancing",
    long_about = "A CLI for replaying trades into a portfolio and computing optimal \
                  weight-space rebalancing trades. Single-period and multi-period \
                  problems are read as JSON from --input or stdin."
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
    /// Single-period optimal trades
    Spo(SpoArgs),
    /// Multi-period trade plan
    Mpo(MpoArgs),
    /// Replay trades into a portfolio, value it and optionally rebalance
    Portfolio(PortfolioArgs),
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
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Spo(args) => commands::optimize::run_spo(args),
        Commands::Mpo(args) => commands::optimize::run_mpo(args),
        Commands::Portfolio(args) => commands::portfolio::run_portfolio(args),
        Commands::Version => {
            println!("ctrader {}", env!("CARGO_PKG_VERSION"));
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
