use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::RiskEngineError;
use crate::RiskEngineResult;

/// Fractional returns and rates (0.05 = 5%). Never percentages.
pub type Rate = f64;

/// Asset identifier → fractional weight.
pub type WeightMap = BTreeMap<String, f64>;

/// Asset identifier → sector name.
pub type SectorMap = BTreeMap<String, String>;

/// Tolerance on the sum of a full weight map.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Frequency of return observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl ReturnFrequency {
    /// Number of periods in a year for annualisation
    pub fn periods_per_year(&self) -> f64 {
        match self {
            ReturnFrequency::Daily => 252.0,
            ReturnFrequency::Weekly => 52.0,
            ReturnFrequency::Monthly => 12.0,
            ReturnFrequency::Quarterly => 4.0,
            ReturnFrequency::Annual => 1.0,
        }
    }
}

/// Periodic returns for a single asset, optionally carrying its date index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<NaiveDate>>,
}

impl ReturnSeries {
    pub fn from_values(values: Vec<f64>) -> Self {
        ReturnSeries { values, dates: None }
    }

    pub fn with_dates(values: Vec<f64>, dates: Vec<NaiveDate>) -> RiskEngineResult<Self> {
        let series = ReturnSeries {
            values,
            dates: Some(dates),
        };
        series.validate()?;
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn date_at(&self, index: usize) -> Option<NaiveDate> {
        self.dates.as_ref().and_then(|d| d.get(index).copied())
    }

    pub fn validate(&self) -> RiskEngineResult<()> {
        validate_returns("returns", &self.values)?;
        if let Some(ref dates) = self.dates {
            validate_dates(dates, self.values.len())?;
        }
        Ok(())
    }
}

/// Aligned return series for several assets.
///
/// Assets are kept in key order so every computation over the matrix
/// visits them deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnMatrix {
    pub series: BTreeMap<String, Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<NaiveDate>>,
}

impl ReturnMatrix {
    pub fn new(series: BTreeMap<String, Vec<f64>>) -> RiskEngineResult<Self> {
        let matrix = ReturnMatrix {
            series,
            dates: None,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn with_dates(mut self, dates: Vec<NaiveDate>) -> RiskEngineResult<Self> {
        validate_dates(&dates, self.num_periods())?;
        self.dates = Some(dates);
        Ok(self)
    }

    pub fn num_assets(&self) -> usize {
        self.series.len()
    }

    /// Length of the common time index (0 for an empty matrix).
    pub fn num_periods(&self) -> usize {
        self.series.values().next().map(|s| s.len()).unwrap_or(0)
    }

    pub fn asset_names(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }

    pub fn get(&self, asset: &str) -> Option<&[f64]> {
        self.series.get(asset).map(|s| s.as_slice())
    }

    pub fn validate(&self) -> RiskEngineResult<()> {
        if self.series.is_empty() {
            return Err(RiskEngineError::invalid(
                "return_matrix",
                "At least one asset series is required",
            ));
        }
        let n = self.num_periods();
        for (asset, values) in &self.series {
            if values.len() != n {
                return Err(RiskEngineError::invalid(
                    format!("return_matrix.{asset}"),
                    format!("Series has {} observations, expected {}", values.len(), n),
                ));
            }
            validate_returns(&format!("return_matrix.{asset}"), values)?;
        }
        if let Some(ref dates) = self.dates {
            validate_dates(dates, n)?;
        }
        Ok(())
    }

    /// Weighted portfolio return per period.
    ///
    /// Weights must reference assets in the matrix; assets held at zero
    /// weight or missing from the map contribute nothing.
    pub fn portfolio_returns(&self, weights: &WeightMap) -> RiskEngineResult<Vec<f64>> {
        for asset in weights.keys() {
            if !self.series.contains_key(asset) {
                return Err(RiskEngineError::InvalidWeightMap(format!(
                    "Asset '{asset}' has a weight but no return series"
                )));
            }
        }
        let mut portfolio = vec![0.0; self.num_periods()];
        for (asset, w) in weights {
            if let Some(values) = self.series.get(asset) {
                for (p, r) in portfolio.iter_mut().zip(values.iter()) {
                    *p += w * r;
                }
            }
        }
        Ok(portfolio)
    }
}

/// Validate a weight map and return its sum.
///
/// Weights must be finite and within [0, 1]. A full map must sum to 1
/// within [`WEIGHT_TOLERANCE`]; a partial map (cash residual) may sum to
/// anything up to 1.
pub fn validate_weight_map(weights: &WeightMap, allow_partial: bool) -> RiskEngineResult<f64> {
    if weights.is_empty() {
        return Err(RiskEngineError::InvalidWeightMap(
            "Weight map is empty".into(),
        ));
    }
    for (asset, w) in weights {
        if !w.is_finite() {
            return Err(RiskEngineError::InvalidWeightMap(format!(
                "Weight for '{asset}' is not finite"
            )));
        }
        if *w < 0.0 {
            return Err(RiskEngineError::InvalidWeightMap(format!(
                "Weight for '{asset}' is negative ({w})"
            )));
        }
        if *w > 1.0 + WEIGHT_TOLERANCE {
            return Err(RiskEngineError::InvalidWeightMap(format!(
                "Weight for '{asset}' exceeds 1 ({w})"
            )));
        }
    }
    let total: f64 = weights.values().sum();
    if allow_partial {
        if total > 1.0 + WEIGHT_TOLERANCE {
            return Err(RiskEngineError::InvalidWeightMap(format!(
                "Partial weights sum to {total:.8}, above 1"
            )));
        }
    } else if (total - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(RiskEngineError::InvalidWeightMap(format!(
            "Weights sum to {total:.8}, expected 1"
        )));
    }
    Ok(total)
}

pub(crate) fn validate_returns(field: &str, values: &[f64]) -> RiskEngineResult<()> {
    for (i, r) in values.iter().enumerate() {
        if !r.is_finite() {
            return Err(RiskEngineError::invalid(
                field,
                format!("Observation {i} is not finite"),
            ));
        }
        if *r <= -1.0 {
            return Err(RiskEngineError::invalid(
                field,
                format!("Observation {i} is a loss of 100% or more ({r})"),
            ));
        }
    }
    Ok(())
}

fn validate_dates(dates: &[NaiveDate], n: usize) -> RiskEngineResult<()> {
    if dates.len() != n {
        return Err(RiskEngineError::invalid(
            "dates",
            format!("Expected {} dates but got {}", n, dates.len()),
        ));
    }
    if dates.windows(2).any(|w| w[1] <= w[0]) {
        return Err(RiskEngineError::invalid(
            "dates",
            "Dates must be strictly increasing",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Non-fatal conditions surfaced alongside a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineWarning {
    /// Solver hit its iteration cap; weights fell back to equal weighting.
    OptimizationDidNotConverge { iterations: u32, last_step: f64 },
    /// Benchmark-relative metrics were requested without a benchmark.
    MissingBenchmark { defaulted: Vec<String> },
    /// A class shock met assets with no class mapping; they were left unshocked.
    UnclassifiedAssets { scenario: String, assets: Vec<String> },
    /// A shock pushed some returns to a total loss; they were clamped to `floor`.
    ShockedReturnsFloored {
        scenario: String,
        assets: Vec<String>,
        floor: f64,
    },
}

impl fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineWarning::OptimizationDidNotConverge {
                iterations,
                last_step,
            } => write!(
                f,
                "Optimisation did not converge after {iterations} iterations \
                 (last step {last_step:.3e}); using equal weights"
            ),
            EngineWarning::MissingBenchmark { defaulted } => write!(
                f,
                "No benchmark supplied; defaulted {}",
                defaulted.join(", ")
            ),
            EngineWarning::UnclassifiedAssets { scenario, assets } => write!(
                f,
                "Scenario '{scenario}': no asset class for {}; left unshocked",
                assets.join(", ")
            ),
            EngineWarning::ShockedReturnsFloored {
                scenario,
                assets,
                floor,
            } => write!(
                f,
                "Scenario '{scenario}': shocked returns of {} clamped at {floor}",
                assets.join(", ")
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Output envelope
// ---------------------------------------------------------------------------

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<EngineWarning>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<EngineWarning>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}
