use clap::Args;
use serde_json::Value;

use risk_engine_core::engine::RiskEngine;
use risk_engine_core::regimes::{self, RegimeSettings};
use risk_engine_core::ReturnSeries;

use crate::input;

/// Arguments for regime detection
#[derive(Args)]
pub struct RegimesArgs {
    /// Path to a JSON/YAML series: {"values": [...], "dates": [...]}
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated periodic returns
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub returns: Option<Vec<f64>>,

    /// Rolling volatility window (periods)
    #[arg(long)]
    pub window: Option<usize>,

    /// Relative one-period rise in rolling volatility that flags a regime
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Skip the loss and recovery analysis
    #[arg(long)]
    pub no_recovery: bool,
}

pub fn run_regimes(args: RegimesArgs, engine: &RiskEngine) -> Result<Value, Box<dyn std::error::Error>> {
    let series: ReturnSeries = match args.returns {
        Some(values) => ReturnSeries::from_values(values),
        None => input::read_request(args.input.as_deref())?,
    };
    let defaults = engine.config().regimes;
    let settings = RegimeSettings {
        window_size: args.window.unwrap_or(defaults.window_size),
        volatility_change_threshold: args
            .threshold
            .unwrap_or(defaults.volatility_change_threshold),
    };

    let detection = regimes::detect_regimes(&series, &settings)?;
    let recovery = if args.no_recovery {
        None
    } else {
        Some(regimes::analyze_recovery(
            &series.values,
            &detection.result.regimes,
        )?)
    };

    let mut value = serde_json::to_value(&detection)?;
    if let (Some(recovery), Value::Object(map)) = (recovery, &mut value) {
        map.insert("recovery".into(), serde_json::to_value(recovery)?);
    }
    Ok(value)
}
