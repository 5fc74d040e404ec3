use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::{evaluate_shocked_portfolio, StressInput, StressTestResult};
use crate::error::RiskEngineError;
use crate::metrics::MetricsSettings;
use crate::stats;
use crate::types::{with_metadata, ComputationOutput, EngineWarning, ReturnMatrix};
use crate::RiskEngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Asset class used to target class-specific shocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    FixedIncome,
    Commodity,
    Currency,
    RealEstate,
    Cash,
    Alternative,
}

/// How a scenario transforms each asset's return series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShockSpec {
    /// Every gross return is rebased: `r' = (1 + r)(1 + m) - 1`.
    UniformShock { multiplier: f64 },
    /// Multiplicative shock per asset class; classes not listed are unshocked.
    ClassShock { class_shocks: BTreeMap<AssetClass, f64> },
    /// Deviations from the asset mean scaled by `multiplier`.
    VolatilityShock { multiplier: f64 },
}

impl ShockSpec {
    pub fn validate(&self) -> RiskEngineResult<()> {
        let check_multiplicative = |field: &str, m: f64| -> RiskEngineResult<()> {
            if !m.is_finite() || m <= -1.0 {
                return Err(RiskEngineError::invalid(
                    field,
                    format!("Shock multiplier must be above -1, got {m}"),
                ));
            }
            Ok(())
        };
        match self {
            ShockSpec::UniformShock { multiplier } => check_multiplicative("multiplier", *multiplier),
            ShockSpec::ClassShock { class_shocks } => {
                if class_shocks.is_empty() {
                    return Err(RiskEngineError::invalid(
                        "class_shocks",
                        "At least one asset class shock is required",
                    ));
                }
                class_shocks
                    .values()
                    .try_for_each(|m| check_multiplicative("class_shocks", *m))
            }
            ShockSpec::VolatilityShock { multiplier } => {
                if !multiplier.is_finite() || *multiplier < 0.0 {
                    return Err(RiskEngineError::invalid(
                        "multiplier",
                        format!("Volatility multiplier must be non-negative, got {multiplier}"),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// A named, configurable stress scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub shock: ShockSpec,
}

/// Built-in scenario table.
pub fn default_scenarios() -> Vec<StressScenario> {
    vec![
        StressScenario {
            name: "market_crash".into(),
            description: "Broad 20% markdown of every asset".into(),
            shock: ShockSpec::UniformShock { multiplier: -0.20 },
        },
        StressScenario {
            name: "volatility_spike".into(),
            description: "Return dispersion doubles around each asset's mean".into(),
            shock: ShockSpec::VolatilityShock { multiplier: 2.0 },
        },
        StressScenario {
            name: "rate_shock".into(),
            description: "Rising rates hit duration and rate-sensitive assets".into(),
            shock: ShockSpec::ClassShock {
                class_shocks: BTreeMap::from([
                    (AssetClass::FixedIncome, -0.05),
                    (AssetClass::RealEstate, -0.08),
                    (AssetClass::Equity, -0.03),
                ]),
            },
        },
        StressScenario {
            name: "equity_bond_rotation".into(),
            description: "Flight to quality out of equities into bonds".into(),
            shock: ShockSpec::ClassShock {
                class_shocks: BTreeMap::from([
                    (AssetClass::Equity, -0.10),
                    (AssetClass::FixedIncome, 0.03),
                ]),
            },
        },
    ]
}

// ---------------------------------------------------------------------------
// Shock application
// ---------------------------------------------------------------------------

fn rebase(values: &[f64], m: f64) -> Vec<f64> {
    values.iter().map(|r| (1.0 + r) * (1.0 + m) - 1.0).collect()
}

fn scale_dispersion(values: &[f64], k: f64) -> Vec<f64> {
    let mu = stats::mean(values);
    values.iter().map(|r| mu + k * (r - mu)).collect()
}

/// Lowest shocked return kept; lower values are clamped to it.
pub const SHOCKED_RETURN_FLOOR: f64 = -0.9999;

/// Clamp to [`SHOCKED_RETURN_FLOOR`]; returns the number of clamped periods.
fn floor_returns(values: &mut [f64]) -> usize {
    let mut clamped = 0;
    for r in values.iter_mut() {
        if *r < SHOCKED_RETURN_FLOOR {
            *r = SHOCKED_RETURN_FLOOR;
            clamped += 1;
        }
    }
    clamped
}

/// A return matrix after one shock.
#[derive(Debug, Clone)]
pub struct ShockedMatrix {
    pub matrix: ReturnMatrix,
    /// Assets a class shock could not classify (left unshocked).
    pub unclassified: Vec<String>,
    /// Assets with at least one period clamped to the return floor.
    pub floored: Vec<String>,
}

/// Apply a shock to every series of the matrix.
pub fn apply_shock(
    matrix: &ReturnMatrix,
    shock: &ShockSpec,
    asset_classes: &BTreeMap<String, AssetClass>,
) -> RiskEngineResult<ShockedMatrix> {
    shock.validate()?;
    let mut unclassified = Vec::new();
    let mut floored = Vec::new();
    let series: BTreeMap<String, Vec<f64>> = matrix
        .series
        .iter()
        .map(|(asset, values)| {
            let mut shocked = match shock {
                ShockSpec::UniformShock { multiplier } => rebase(values, *multiplier),
                ShockSpec::VolatilityShock { multiplier } => scale_dispersion(values, *multiplier),
                ShockSpec::ClassShock { class_shocks } => match asset_classes.get(asset) {
                    Some(class) => match class_shocks.get(class) {
                        Some(m) => rebase(values, *m),
                        None => values.clone(),
                    },
                    None => {
                        unclassified.push(asset.clone());
                        values.clone()
                    }
                },
            };
            if floor_returns(&mut shocked) > 0 {
                floored.push(asset.clone());
            }
            (asset.clone(), shocked)
        })
        .collect();
    Ok(ShockedMatrix {
        matrix: ReturnMatrix {
            series,
            dates: matrix.dates.clone(),
        },
        unclassified,
        floored,
    })
}

/// Warning for held assets whose shocked returns hit the floor.
pub(crate) fn floored_warning(
    scenario: &str,
    floored: Vec<String>,
    weights: &crate::types::WeightMap,
) -> Option<EngineWarning> {
    let held: Vec<String> = floored
        .into_iter()
        .filter(|a| weights.get(a).is_some_and(|w| *w > 0.0))
        .collect();
    if held.is_empty() {
        return None;
    }
    tracing::warn!(scenario, assets = ?held, "shocked returns clamped at the loss floor");
    Some(EngineWarning::ShockedReturnsFloored {
        scenario: scenario.to_string(),
        assets: held,
        floor: SHOCKED_RETURN_FLOOR,
    })
}

// ---------------------------------------------------------------------------
// Scenario mode
// ---------------------------------------------------------------------------

/// Run each scenario against the portfolio; one result per scenario name.
pub fn run_scenarios(
    input: &StressInput,
    scenarios: &[StressScenario],
    settings: &MetricsSettings,
) -> RiskEngineResult<ComputationOutput<BTreeMap<String, StressTestResult>>> {
    let start = Instant::now();
    input.validate()?;
    if scenarios.is_empty() {
        return Err(RiskEngineError::invalid(
            "scenarios",
            "At least one stress scenario is required",
        ));
    }

    let mut warnings = Vec::new();
    let mut results = BTreeMap::new();
    for scenario in scenarios {
        let ShockedMatrix {
            matrix: shocked,
            unclassified,
            floored,
        } = apply_shock(&input.return_matrix, &scenario.shock, &input.asset_classes)?;
        let held_unclassified: Vec<String> = unclassified
            .into_iter()
            .filter(|a| input.weights.get(a).is_some_and(|w| *w > 0.0))
            .collect();
        if !held_unclassified.is_empty() {
            tracing::warn!(
                scenario = %scenario.name,
                assets = ?held_unclassified,
                "class shock met unclassified assets"
            );
            warnings.push(EngineWarning::UnclassifiedAssets {
                scenario: scenario.name.clone(),
                assets: held_unclassified,
            });
        }
        warnings.extend(floored_warning(&scenario.name, floored, &input.weights));

        let portfolio = shocked.portfolio_returns(&input.weights)?;
        let result = evaluate_shocked_portfolio(
            &scenario.name,
            &portfolio,
            settings,
            serde_json::json!({
                "mode": "scenario",
                "description": scenario.description,
                "shock": scenario.shock,
            }),
        )?;
        results.insert(scenario.name.clone(), result);
    }
    tracing::info!(scenarios = results.len(), "scenario stress tests complete");

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Scenario Stress Test (per-asset shocks, empirical risk metrics)",
        &serde_json::json!({
            "scenarios": scenarios.iter().map(|s| &s.name).collect::<Vec<_>>(),
            "n_assets": input.return_matrix.num_assets(),
            "observations": input.return_matrix.num_periods(),
        }),
        warnings,
        elapsed,
        results,
    ))
}
