//! Stress testing: deterministic scenario shocks, historical-crisis replay
//! and Monte Carlo perturbation of a return matrix.

pub mod historical;
pub mod monte_carlo;
pub mod recovery;
pub mod scenario;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::RiskEngineError;
use crate::metrics::{compute_risk_metrics, MetricsSettings};
use crate::stats;
use crate::types::{validate_weight_map, ReturnMatrix, WeightMap};
use crate::RiskEngineResult;

pub use historical::{default_crises, run_historical, HistoricalCrisis};
pub use monte_carlo::{run_monte_carlo, McPercentiles, MonteCarloSettings, MonteCarloStressResult};
pub use recovery::{estimate_recovery_time, post_stress_series};
pub use scenario::{
    default_scenarios, run_scenarios, AssetClass, ShockSpec, ShockedMatrix, StressScenario,
    SHOCKED_RETURN_FLOOR,
};

/// Portfolio and history handed to every stress mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressInput {
    pub return_matrix: ReturnMatrix,
    pub weights: WeightMap,
    /// Asset → class, consulted by class shocks only.
    #[serde(default)]
    pub asset_classes: BTreeMap<String, AssetClass>,
    #[serde(default)]
    pub allow_partial: bool,
}

impl StressInput {
    pub(crate) fn validate(&self) -> RiskEngineResult<()> {
        self.return_matrix.validate()?;
        validate_weight_map(&self.weights, self.allow_partial)?;
        for asset in self.weights.keys() {
            if self.return_matrix.get(asset).is_none() {
                return Err(RiskEngineError::InvalidWeightMap(format!(
                    "Asset '{asset}' has a weight but no return series"
                )));
            }
        }
        Ok(())
    }
}

/// Portfolio behaviour under one stress scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestResult {
    pub scenario_name: String,
    /// Mean per-period return of the shocked portfolio.
    pub portfolio_return: f64,
    /// Annualised volatility of the shocked portfolio.
    pub portfolio_volatility: f64,
    pub var95: f64,
    pub var99: f64,
    pub max_drawdown: f64,
    /// Periods of positive return after the trough, when recovery looks likely.
    pub recovery_time: Option<usize>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Shock tables and Monte Carlo defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressSettings {
    pub stress_scenarios: Vec<StressScenario>,
    pub historical_crises: Vec<HistoricalCrisis>,
    pub monte_carlo: MonteCarloSettings,
}

impl Default for StressSettings {
    fn default() -> Self {
        StressSettings {
            stress_scenarios: default_scenarios(),
            historical_crises: default_crises(),
            monte_carlo: MonteCarloSettings::default(),
        }
    }
}

impl StressSettings {
    pub fn validate(&self) -> RiskEngineResult<()> {
        let mut names = BTreeSet::new();
        for scenario in &self.stress_scenarios {
            if scenario.name.trim().is_empty() {
                return Err(RiskEngineError::ConfigError(
                    "stress scenario names must not be empty".into(),
                ));
            }
            if !names.insert(scenario.name.as_str()) {
                return Err(RiskEngineError::ConfigError(format!(
                    "duplicate stress scenario '{}'",
                    scenario.name
                )));
            }
            scenario
                .shock
                .validate()
                .map_err(|e| RiskEngineError::ConfigError(format!("{}: {e}", scenario.name)))?;
        }
        let mut crisis_names = BTreeSet::new();
        for crisis in &self.historical_crises {
            if !crisis_names.insert(crisis.name.as_str()) {
                return Err(RiskEngineError::ConfigError(format!(
                    "duplicate historical crisis '{}'",
                    crisis.name
                )));
            }
            crisis
                .validate()
                .map_err(|e| RiskEngineError::ConfigError(format!("{}: {e}", crisis.name)))?;
        }
        self.monte_carlo
            .validate()
            .map_err(|e| RiskEngineError::ConfigError(format!("monte_carlo: {e}")))?;
        Ok(())
    }
}

/// Build a [`StressTestResult`] from a shocked portfolio series.
pub(crate) fn evaluate_shocked_portfolio(
    scenario_name: &str,
    portfolio: &[f64],
    settings: &MetricsSettings,
    metadata: serde_json::Value,
) -> RiskEngineResult<StressTestResult> {
    let metrics = compute_risk_metrics(portfolio, None, settings)?;
    let recovery_time = estimate_recovery_time(&post_stress_series(portfolio));
    tracing::debug!(
        scenario = scenario_name,
        portfolio_return = stats::mean(portfolio),
        max_drawdown = metrics.max_drawdown,
        "stress scenario evaluated"
    );
    Ok(StressTestResult {
        scenario_name: scenario_name.to_string(),
        portfolio_return: stats::mean(portfolio),
        portfolio_volatility: metrics.volatility,
        var95: metrics.var95,
        var99: metrics.var99,
        max_drawdown: metrics.max_drawdown,
        recovery_time,
        metadata,
    })
}
