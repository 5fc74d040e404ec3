use clap::Args;
use serde_json::Value;

use risk_engine_core::engine::RiskEngine;
use risk_engine_core::optimization::{self, OptimizationRequest, WeightBounds};

use crate::input;

/// Arguments for mean-variance optimisation
#[derive(Args)]
pub struct OptimizeArgs {
    /// Path to a JSON/YAML request with a return_matrix
    #[arg(long)]
    pub input: Option<String>,

    /// Annualised target return; maximises Sharpe when absent
    #[arg(long, allow_hyphen_values = true)]
    pub target_return: Option<f64>,

    #[command(flatten)]
    pub bounds: BoundsArgs,
}

/// Arguments for the efficient frontier
#[derive(Args)]
pub struct FrontierArgs {
    /// Path to a JSON/YAML request with a return_matrix
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub bounds: BoundsArgs,
}

#[derive(Args)]
pub struct BoundsArgs {
    /// Lower weight bound per asset
    #[arg(long)]
    pub min_weight: Option<f64>,

    /// Upper weight bound per asset (defaults to the position limit)
    #[arg(long)]
    pub max_weight: Option<f64>,
}

impl BoundsArgs {
    /// Apply flag overrides on top of the request's bounds.
    fn apply(&self, request: &mut OptimizationRequest, position_limit: f64) {
        if self.min_weight.is_none() && self.max_weight.is_none() {
            return;
        }
        let base = request.bounds.unwrap_or(WeightBounds {
            min: 0.0,
            max: position_limit,
        });
        request.bounds = Some(WeightBounds {
            min: self.min_weight.unwrap_or(base.min),
            max: self.max_weight.unwrap_or(base.max),
        });
    }
}

pub fn run_optimize(args: OptimizeArgs, engine: &RiskEngine) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: OptimizationRequest = input::read_request(args.input.as_deref())?;
    if args.target_return.is_some() {
        request.target_return = args.target_return;
    }
    args.bounds
        .apply(&mut request, engine.config().limits.max_position_size);
    let result = optimization::optimize(&request, engine.config())?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_frontier(args: FrontierArgs, engine: &RiskEngine) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: OptimizationRequest = input::read_request(args.input.as_deref())?;
    args.bounds
        .apply(&mut request, engine.config().limits.max_position_size);
    let result = optimization::efficient_frontier(&request, engine.config())?;
    Ok(serde_json::to_value(result)?)
}
