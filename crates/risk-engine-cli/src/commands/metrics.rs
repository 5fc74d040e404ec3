use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use risk_engine_core::engine::RiskEngine;
use risk_engine_core::limits::{self, LimitCheckInput};
use risk_engine_core::metrics::{self, RiskMetricsInput};
use risk_engine_core::session::RiskSession;

use crate::input;

/// Arguments for risk metrics
#[derive(Args)]
pub struct MetricsArgs {
    /// Path to a JSON/YAML request: {"returns": [...], "benchmark": [...]}
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated periodic returns (e.g. "0.01,-0.02,0.005")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub returns: Option<Vec<f64>>,

    /// Comma-separated benchmark returns aligned with --returns
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub benchmark: Option<Vec<f64>>,

    /// Warn when benchmark-relative metrics fall back to defaults
    #[arg(long)]
    pub require_benchmark: bool,
}

/// Arguments for a limit check
#[derive(Args)]
pub struct LimitsArgs {
    /// Path to a JSON/YAML request with weights, return_matrix and sectors
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetricsRequest {
    returns: Vec<f64>,
    #[serde(default)]
    benchmark: Option<Vec<f64>>,
    #[serde(default)]
    require_benchmark_metrics: bool,
}

pub fn run_metrics(args: MetricsArgs, engine: &RiskEngine) -> Result<Value, Box<dyn std::error::Error>> {
    let request: MetricsRequest = match args.returns {
        Some(returns) => MetricsRequest {
            returns,
            benchmark: args.benchmark,
            require_benchmark_metrics: args.require_benchmark,
        },
        None => input::read_request(args.input.as_deref())?,
    };
    let metrics_input = RiskMetricsInput {
        returns: request.returns,
        benchmark: request.benchmark,
        settings: engine.config().metrics_settings(),
        require_benchmark_metrics: request.require_benchmark_metrics || args.require_benchmark,
    };
    let result = metrics::calculate_risk_metrics(&metrics_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_limits(args: LimitsArgs, engine: &RiskEngine) -> Result<Value, Box<dyn std::error::Error>> {
    let request: LimitCheckInput = input::read_request(args.input.as_deref())?;
    let config = engine.config();
    let alerts = limits::check_limits(&request, &config.limits, &config.metrics_settings())?;

    let mut session = RiskSession::new();
    session.record_alerts(alerts);
    Ok(serde_json::json!({
        "result": session.alerts(),
        "alert_count": session.alerts().len(),
        "highest_severity": session.highest_severity(),
    }))
}
