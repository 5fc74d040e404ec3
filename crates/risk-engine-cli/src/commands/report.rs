use clap::Args;
use serde_json::Value;

use risk_engine_core::engine::{AssessmentRequest, RiskEngine};
use risk_engine_core::session::RiskSession;

use crate::input;

/// Arguments for a full risk assessment
#[derive(Args)]
pub struct ReportArgs {
    /// Path to a JSON/YAML assessment request
    #[arg(long)]
    pub input: Option<String>,

    /// Also propose optimised weights
    #[arg(long)]
    pub optimize: bool,

    /// Skip the Monte Carlo stress test
    #[arg(long)]
    pub skip_monte_carlo: bool,
}

pub fn run_report(args: ReportArgs, engine: &RiskEngine) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: AssessmentRequest = input::read_request(args.input.as_deref())?;
    request.optimize |= args.optimize;
    request.skip_monte_carlo |= args.skip_monte_carlo;

    let mut session = RiskSession::new();
    let report = engine.assess(&mut session, &request)?;
    tracing::debug!(
        stress_results = session.stress_results().len(),
        "session populated"
    );

    Ok(serde_json::json!({
        "result": report,
        "highest_severity": session.highest_severity(),
        "warnings": session.warnings(),
    }))
}
