use clap::Args;
use serde_json::Value;

use risk_engine_core::engine::RiskEngine;
use risk_engine_core::EngineConfig;

/// Arguments for printing the configuration
#[derive(Args)]
pub struct ConfigArgs {
    /// Print the built-in defaults instead of the loaded configuration
    #[arg(long)]
    pub defaults: bool,
}

pub fn run_config(args: ConfigArgs, engine: &RiskEngine) -> Result<Value, Box<dyn std::error::Error>> {
    let value = if args.defaults {
        serde_json::to_value(EngineConfig::default())?
    } else {
        serde_json::to_value(engine.config())?
    };
    Ok(value)
}
