use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::scenario::{apply_shock, floored_warning, ShockSpec};
use super::{evaluate_shocked_portfolio, StressInput, StressTestResult};
use crate::error::RiskEngineError;
use crate::metrics::MetricsSettings;
use crate::types::{with_metadata, ComputationOutput};
use crate::RiskEngineResult;

/// A historical crisis replayed as a uniform shock on every asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalCrisis {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub shock_multiplier: f64,
}

impl HistoricalCrisis {
    pub fn validate(&self) -> RiskEngineResult<()> {
        self.as_shock().validate()
    }

    fn as_shock(&self) -> ShockSpec {
        ShockSpec::UniformShock {
            multiplier: self.shock_multiplier,
        }
    }
}

/// The five canonical crises, using their equity-market drawdowns.
pub fn default_crises() -> Vec<HistoricalCrisis> {
    vec![
        HistoricalCrisis {
            name: "GFC 2008".into(),
            description: "Global financial crisis".into(),
            shock_multiplier: -0.38,
        },
        HistoricalCrisis {
            name: "COVID March 2020".into(),
            description: "Pandemic sell-off".into(),
            shock_multiplier: -0.34,
        },
        HistoricalCrisis {
            name: "Dot-Com 2000".into(),
            description: "Technology bubble collapse".into(),
            shock_multiplier: -0.49,
        },
        HistoricalCrisis {
            name: "Euro Crisis 2011".into(),
            description: "European sovereign debt crisis".into(),
            shock_multiplier: -0.22,
        },
        HistoricalCrisis {
            name: "Taper Tantrum 2013".into(),
            description: "Fed tapering announcement".into(),
            shock_multiplier: -0.06,
        },
    ]
}

/// Replay each crisis against the portfolio.
pub fn run_historical(
    input: &StressInput,
    crises: &[HistoricalCrisis],
    settings: &MetricsSettings,
) -> RiskEngineResult<ComputationOutput<BTreeMap<String, StressTestResult>>> {
    let start = Instant::now();
    input.validate()?;
    if crises.is_empty() {
        return Err(RiskEngineError::invalid(
            "historical_crises",
            "At least one historical crisis is required",
        ));
    }

    let mut warnings = Vec::new();
    let mut results = BTreeMap::new();
    for crisis in crises {
        let shocked = apply_shock(&input.return_matrix, &crisis.as_shock(), &input.asset_classes)?;
        warnings.extend(floored_warning(&crisis.name, shocked.floored, &input.weights));
        let portfolio = shocked.matrix.portfolio_returns(&input.weights)?;
        let result = evaluate_shocked_portfolio(
            &crisis.name,
            &portfolio,
            settings,
            serde_json::json!({
                "mode": "historical",
                "description": crisis.description,
                "shock_multiplier": crisis.shock_multiplier,
            }),
        )?;
        results.insert(crisis.name.clone(), result);
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Historical Crisis Replay (uniform multiplicative shock)",
        &serde_json::json!({
            "crises": crises.iter().map(|c| &c.name).collect::<Vec<_>>(),
            "observations": input.return_matrix.num_periods(),
        }),
        warnings,
        elapsed,
        results,
    ))
}
