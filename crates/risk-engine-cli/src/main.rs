mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::Value;
use std::process;
use tracing_subscriber::EnvFilter;

use risk_engine_core::engine::RiskEngine;
use risk_engine_core::EngineConfig;

use commands::config::ConfigArgs;
use commands::metrics::{LimitsArgs, MetricsArgs};
use commands::optimization::{FrontierArgs, OptimizeArgs};
use commands::regimes::RegimesArgs;
use commands::report::ReportArgs;
use commands::stress::{HistoricalArgs, MonteCarloArgs, StressArgs};

/// Portfolio risk metrics, limit checks, optimisation and stress testing
#[derive(Parser)]
#[command(
    name = "prisk",
    version,
    about = "Portfolio risk metrics, limit checks, optimisation and stress testing",
    long_about = "A CLI for portfolio risk analysis over periodic return series. \
                  Computes VaR, CVaR, volatility and drawdown, checks risk limits, \
                  optimises mean-variance weights, runs scenario, historical and \
                  Monte Carlo stress tests, and detects volatility regimes."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (JSON or YAML)
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Risk metrics for a return series (VaR, CVaR, volatility, ratios)
    Metrics(MetricsArgs),
    /// Check a portfolio against the configured risk limits
    Limits(LimitsArgs),
    /// Mean-variance optimisation (max Sharpe or min volatility at a target)
    Optimize(OptimizeArgs),
    /// Efficient frontier over the achievable return range
    Frontier(FrontierArgs),
    /// Run the configured stress scenarios
    Stress(StressArgs),
    /// Replay historical crises as uniform shocks
    Historical(HistoricalArgs),
    /// Monte Carlo stress test
    MonteCarlo(MonteCarloArgs),
    /// Detect high-volatility regimes and their recovery
    Regimes(RegimesArgs),
    /// Full risk assessment of a portfolio
    Report(ReportArgs),
    /// Print the effective engine configuration
    Config(ConfigArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_engine(path: Option<&str>) -> Result<RiskEngine, Box<dyn std::error::Error>> {
    let config = match path {
        Some(p) => input::file::read_config(p)?,
        None => EngineConfig::default(),
    };
    Ok(RiskEngine::new(config)?)
}

fn dispatch(command: Commands, engine: &RiskEngine) -> Result<Value, Box<dyn std::error::Error>> {
    match command {
        Commands::Metrics(args) => commands::metrics::run_metrics(args, engine),
        Commands::Limits(args) => commands::metrics::run_limits(args, engine),
        Commands::Optimize(args) => commands::optimization::run_optimize(args, engine),
        Commands::Frontier(args) => commands::optimization::run_frontier(args, engine),
        Commands::Stress(args) => commands::stress::run_stress(args, engine),
        Commands::Historical(args) => commands::stress::run_historical(args, engine),
        Commands::MonteCarlo(args) => commands::stress::run_monte_carlo(args, engine),
        Commands::Regimes(args) => commands::regimes::run_regimes(args, engine),
        Commands::Report(args) => commands::report::run_report(args, engine),
        Commands::Config(args) => commands::config::run_config(args, engine),
        Commands::Version => Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") })),
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("prisk {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = load_engine(cli.config.as_deref()).and_then(|engine| dispatch(cli.command, &engine));

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
