use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::RiskEngineError;
use crate::stats::{self, EPSILON};
use crate::types::{validate_returns, with_metadata, ComputationOutput, EngineWarning, Rate, ReturnFrequency};
use crate::{RiskEngineResult, MIN_OBSERVATIONS};

/// Annualisation and risk-free settings shared by every metrics call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub frequency: ReturnFrequency,
    /// Annual risk-free rate
    pub risk_free_rate: Rate,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        MetricsSettings {
            frequency: ReturnFrequency::Daily,
            risk_free_rate: 0.02,
        }
    }
}

/// Input for portfolio risk metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetricsInput {
    /// Periodic returns (as decimals)
    pub returns: Vec<f64>,
    /// Benchmark returns aligned with `returns`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<Vec<f64>>,
    #[serde(default)]
    pub settings: MetricsSettings,
    /// Record a warning when benchmark metrics fall back to defaults
    #[serde(default)]
    pub require_benchmark_metrics: bool,
}

/// Risk and performance measures for one return series.
///
/// VaR and CVaR are loss magnitudes: positive numbers are losses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub var95: f64,
    pub var99: f64,
    pub cvar95: f64,
    /// Annualised volatility
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown: f64,
    pub beta: f64,
    pub correlation: f64,
    /// Arithmetic annualised return
    pub annualized_return: f64,
    pub tracking_error: f64,
    pub information_ratio: f64,
    /// Jensen's alpha (annualised)
    pub alpha: f64,
    pub skewness: f64,
    pub excess_kurtosis: f64,
    pub observations: usize,
}

/// Calculate risk metrics for a return series, wrapped in the output envelope.
///
/// Benchmark-relative fields default to beta 1.0 and 0.0 for the rest when
/// no benchmark is given. If the caller asked for them explicitly, the
/// downgrade is reported as a `MissingBenchmark` warning.
pub fn calculate_risk_metrics(
    input: &RiskMetricsInput,
) -> RiskEngineResult<ComputationOutput<RiskMetrics>> {
    let start = Instant::now();
    let mut warnings: Vec<EngineWarning> = Vec::new();

    let metrics = compute_risk_metrics(&input.returns, input.benchmark.as_deref(), &input.settings)?;

    if input.benchmark.is_none() && input.require_benchmark_metrics {
        tracing::warn!("benchmark metrics requested without a benchmark; using defaults");
        warnings.push(EngineWarning::MissingBenchmark {
            defaulted: vec![
                "beta=1.0".into(),
                "correlation=0.0".into(),
                "information_ratio=0.0".into(),
                "alpha=0.0".into(),
            ],
        });
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Empirical Risk Metrics (VaR, CVaR, Volatility, Sharpe, Sortino, Calmar, Drawdown, Beta)",
        &serde_json::json!({
            "observations": input.returns.len(),
            "frequency": input.settings.frequency,
            "risk_free_rate": input.settings.risk_free_rate,
            "benchmark": input.benchmark.is_some(),
            "var_method": "empirical percentile, linear interpolation",
        }),
        warnings,
        elapsed,
        metrics,
    ))
}

/// Compute risk metrics without the envelope.
///
/// Pure function of its inputs; repeated calls give bit-identical results.
pub fn compute_risk_metrics(
    returns: &[f64],
    benchmark: Option<&[f64]>,
    settings: &MetricsSettings,
) -> RiskEngineResult<RiskMetrics> {
    let n = returns.len();
    if n < MIN_OBSERVATIONS {
        return Err(RiskEngineError::InsufficientData {
            context: "risk metrics".into(),
            required: MIN_OBSERVATIONS,
            actual: n,
        });
    }
    validate_returns("returns", returns)?;
    if let Some(bench) = benchmark {
        if bench.len() != n {
            return Err(RiskEngineError::invalid(
                "benchmark",
                format!("Benchmark has {} observations, expected {}", bench.len(), n),
            ));
        }
        validate_returns("benchmark", bench)?;
    }

    let periods = settings.frequency.periods_per_year();
    let sqrt_periods = periods.sqrt();
    let rf_per_period = settings.risk_free_rate / periods;

    let mean = stats::mean(returns);
    let std_dev = stats::sample_std(returns);
    let volatility = std_dev * sqrt_periods;
    let annualized_return = mean * periods;

    // Empirical tail
    let sorted = stats::sorted(returns);
    let q95 = stats::percentile_sorted(&sorted, 5.0);
    let q99 = stats::percentile_sorted(&sorted, 1.0);
    let var95 = -q95;
    let var99 = -q99;
    let cvar95 = -stats::tail_mean(&sorted, q95);

    let excess_mean = mean - rf_per_period;
    let sharpe_ratio = if std_dev < EPSILON {
        0.0
    } else {
        excess_mean / std_dev * sqrt_periods
    };

    let negatives: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let downside_dev = stats::sample_std(&negatives);
    let sortino_ratio = if downside_dev < EPSILON {
        0.0
    } else {
        excess_mean / downside_dev * sqrt_periods
    };

    let max_drawdown = stats::max_drawdown(returns);
    let calmar_ratio = if max_drawdown < EPSILON {
        0.0
    } else {
        annualized_return / max_drawdown
    };

    let (beta, correlation, tracking_error, information_ratio, alpha) = match benchmark {
        Some(bench) => benchmark_relative(returns, bench, settings, annualized_return),
        None => (1.0, 0.0, 0.0, 0.0, 0.0),
    };

    tracing::debug!(n, volatility, var95, max_drawdown, "risk metrics computed");

    Ok(RiskMetrics {
        var95,
        var99,
        cvar95,
        volatility,
        sharpe_ratio,
        sortino_ratio,
        calmar_ratio,
        max_drawdown,
        beta,
        correlation,
        annualized_return,
        tracking_error,
        information_ratio,
        alpha,
        skewness: stats::skewness(returns),
        excess_kurtosis: stats::excess_kurtosis(returns),
        observations: n,
    })
}

/// (beta, correlation, tracking error, information ratio, alpha)
fn benchmark_relative(
    returns: &[f64],
    bench: &[f64],
    settings: &MetricsSettings,
    annualized_return: f64,
) -> (f64, f64, f64, f64, f64) {
    let periods = settings.frequency.periods_per_year();
    let rf = settings.risk_free_rate;

    let bench_var = stats::sample_variance(bench);
    let beta = if bench_var < EPSILON {
        1.0
    } else {
        stats::covariance(returns, bench) / bench_var
    };
    let correlation = stats::correlation(returns, bench);

    let active: Vec<f64> = returns.iter().zip(bench.iter()).map(|(r, b)| r - b).collect();
    let tracking_error = stats::sample_std(&active) * periods.sqrt();
    let bench_annual = stats::mean(bench) * periods;
    let information_ratio = if tracking_error < EPSILON {
        0.0
    } else {
        (annualized_return - bench_annual) / tracking_error
    };

    let alpha = annualized_return - (rf + beta * (bench_annual - rf));

    (beta, correlation, tracking_error, information_ratio, alpha)
}
