use clap::Args;
use serde_json::Value;

use risk_engine_core::engine::RiskEngine;
use risk_engine_core::stress::{self, HistoricalCrisis, StressInput, StressScenario};

use crate::input;

/// Arguments for scenario stress tests
#[derive(Args)]
pub struct StressArgs {
    /// Path to a JSON/YAML request with return_matrix, weights and asset_classes
    #[arg(long)]
    pub input: Option<String>,

    /// Only run the named scenario (repeatable)
    #[arg(long)]
    pub scenario: Vec<String>,
}

/// Arguments for historical crisis replay
#[derive(Args)]
pub struct HistoricalArgs {
    /// Path to a JSON/YAML request with return_matrix and weights
    #[arg(long)]
    pub input: Option<String>,

    /// Only replay the named crisis (repeatable)
    #[arg(long)]
    pub crisis: Vec<String>,

    /// Replay a single custom uniform shock instead of the crisis table
    #[arg(long, allow_hyphen_values = true)]
    pub shock: Option<f64>,

    /// Name for the custom shock
    #[arg(long, default_value = "custom")]
    pub name: String,
}

/// Arguments for Monte Carlo stress testing
#[derive(Args)]
pub struct MonteCarloArgs {
    /// Path to a JSON/YAML request with return_matrix and weights
    #[arg(long)]
    pub input: Option<String>,

    /// Number of simulated periods
    #[arg(long)]
    pub simulations: Option<u32>,

    /// Stress intensity: means drop by s * |mean|, dispersion scales by (1 + s)
    #[arg(long)]
    pub intensity: Option<f64>,

    /// Seed for reproducible draws
    #[arg(long)]
    pub seed: Option<u64>,

    /// Draw assets jointly from the sample covariance
    #[arg(long)]
    pub correlated: bool,
}

/// Keep the entries whose names were asked for, in table order.
fn select<T: Clone>(
    table: &[T],
    wanted: &[String],
    name_of: impl Fn(&T) -> &str,
    what: &str,
) -> Result<Vec<T>, Box<dyn std::error::Error>> {
    if wanted.is_empty() {
        return Ok(table.to_vec());
    }
    for name in wanted {
        if !table.iter().any(|t| name_of(t) == name) {
            let available: Vec<&str> = table.iter().map(&name_of).collect();
            return Err(format!(
                "Unknown {what} '{name}'. Available: {}",
                available.join(", ")
            )
            .into());
        }
    }
    Ok(table
        .iter()
        .filter(|t| wanted.iter().any(|w| w == name_of(*t)))
        .cloned()
        .collect())
}

pub fn run_stress(args: StressArgs, engine: &RiskEngine) -> Result<Value, Box<dyn std::error::Error>> {
    let request: StressInput = input::read_request(args.input.as_deref())?;
    let config = engine.config();
    let scenarios = select(
        &config.stress.stress_scenarios,
        &args.scenario,
        |s: &StressScenario| s.name.as_str(),
        "scenario",
    )?;
    let result = stress::run_scenarios(&request, &scenarios, &config.metrics_settings())?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_historical(args: HistoricalArgs, engine: &RiskEngine) -> Result<Value, Box<dyn std::error::Error>> {
    let request: StressInput = input::read_request(args.input.as_deref())?;
    let config = engine.config();
    let crises = match args.shock {
        Some(multiplier) => vec![HistoricalCrisis {
            name: args.name,
            description: "Custom uniform shock".into(),
            shock_multiplier: multiplier,
        }],
        None => select(
            &config.stress.historical_crises,
            &args.crisis,
            |c: &HistoricalCrisis| c.name.as_str(),
            "crisis",
        )?,
    };
    let result = stress::run_historical(&request, &crises, &config.metrics_settings())?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_monte_carlo(args: MonteCarloArgs, engine: &RiskEngine) -> Result<Value, Box<dyn std::error::Error>> {
    let request: StressInput = input::read_request(args.input.as_deref())?;
    let mut settings = engine.config().stress.monte_carlo.clone();
    if let Some(n) = args.simulations {
        settings.num_simulations = n;
    }
    if let Some(s) = args.intensity {
        settings.stress_intensity = s;
    }
    if args.seed.is_some() {
        settings.seed = args.seed;
    }
    settings.correlated |= args.correlated;

    let result = stress::run_monte_carlo(&request, &settings)?;
    Ok(serde_json::to_value(result)?)
}
