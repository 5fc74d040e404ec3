use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::solver::{minimize_with_equality, projected_gradient, BoxBounds, Objective};
use crate::config::EngineConfig;
use crate::error::RiskEngineError;
use crate::stats::{self, mat_vec_multiply, quadratic_form, vec_dot, EPSILON};
use crate::types::{
    with_metadata, ComputationOutput, EngineWarning, Rate, ReturnFrequency, ReturnMatrix,
    WeightMap, WEIGHT_TOLERANCE,
};
use crate::{RiskEngineResult, MIN_OBSERVATIONS};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Solver settings for the optimiser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Iteration cap across all solver rounds.
    pub max_iterations: u32,
    /// Convergence tolerance on the weight step.
    pub tolerance: f64,
    /// Number of efficient frontier points.
    pub frontier_points: usize,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        OptimizerSettings {
            max_iterations: 1000,
            tolerance: 1e-8,
            frontier_points: 20,
        }
    }
}

impl OptimizerSettings {
    pub fn validate(&self) -> RiskEngineResult<()> {
        if self.max_iterations == 0 {
            return Err(RiskEngineError::ConfigError(
                "optimizer.max_iterations must be at least 1".into(),
            ));
        }
        if !(self.tolerance > 0.0 && self.tolerance < 1e-2) {
            return Err(RiskEngineError::ConfigError(format!(
                "optimizer.tolerance must be in (0, 0.01), got {}",
                self.tolerance
            )));
        }
        if self.frontier_points < 2 {
            return Err(RiskEngineError::ConfigError(
                "optimizer.frontier_points must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

/// Uniform per-asset weight bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    pub min: f64,
    pub max: f64,
}

/// Optimisation request over a return matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub return_matrix: ReturnMatrix,
    /// Annualised target return; without one the Sharpe ratio is maximised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_return: Option<Rate>,
    #[serde(default = "default_risk_aversion")]
    pub risk_aversion: f64,
    /// Defaults to `[0, limits.max_position_size]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<WeightBounds>,
}

fn default_risk_aversion() -> f64 {
    1.0
}

/// Annualised expected returns and covariance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMoments {
    pub asset_names: Vec<String>,
    pub expected_returns: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
}

impl MarketMoments {
    /// Estimate annualised moments from a return matrix.
    pub fn from_matrix(matrix: &ReturnMatrix, frequency: ReturnFrequency) -> RiskEngineResult<Self> {
        matrix.validate()?;
        let periods = matrix.num_periods();
        if periods < MIN_OBSERVATIONS {
            return Err(RiskEngineError::InsufficientData {
                context: "portfolio optimisation".into(),
                required: MIN_OBSERVATIONS,
                actual: periods,
            });
        }
        let ppy = frequency.periods_per_year();
        let columns: Vec<&Vec<f64>> = matrix.series.values().collect();
        let expected_returns = columns.iter().map(|c| stats::mean(c) * ppy).collect();
        let covariance = columns
            .iter()
            .map(|x| columns.iter().map(|y| stats::covariance(x, y) * ppy).collect())
            .collect();
        Ok(MarketMoments {
            asset_names: matrix.asset_names(),
            expected_returns,
            covariance,
        })
    }

    fn len(&self) -> usize {
        self.asset_names.len()
    }
}

/// Optimised portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub weights: WeightMap,
    /// Annualised expected return of `weights`
    pub expected_return: f64,
    /// Annualised volatility of `weights`
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub converged: bool,
    pub iterations: u32,
    /// Set when the solver failed and `weights` are the equal-weight fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<EngineWarning>,
}

/// A single point on the efficient frontier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierPoint {
    pub target_return: f64,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub weights: WeightMap,
    pub converged: bool,
}

// ---------------------------------------------------------------------------
// Objectives
// ---------------------------------------------------------------------------

/// w'Σw, rescaled by the largest variance.
struct MinVariance<'a> {
    sigma: &'a [Vec<f64>],
    scale: f64,
}

impl<'a> MinVariance<'a> {
    fn new(sigma: &'a [Vec<f64>]) -> Self {
        let max_var = (0..sigma.len()).map(|i| sigma[i][i]).fold(0.0, f64::max);
        MinVariance {
            sigma,
            scale: if max_var > EPSILON { max_var } else { 1.0 },
        }
    }
}

impl Objective for MinVariance<'_> {
    fn value(&self, w: &[f64]) -> f64 {
        quadratic_form(w, self.sigma) / self.scale
    }

    fn gradient(&self, w: &[f64]) -> Vec<f64> {
        mat_vec_multiply(self.sigma, w)
            .into_iter()
            .map(|v| 2.0 * v / self.scale)
            .collect()
    }
}

/// -(w'μ - rf) / sqrt(w'Σw)
struct NegativeSharpe<'a> {
    mu: &'a [f64],
    sigma: &'a [Vec<f64>],
    rf: f64,
}

impl Objective for NegativeSharpe<'_> {
    fn value(&self, w: &[f64]) -> f64 {
        let risk = quadratic_form(w, self.sigma).max(0.0).sqrt();
        if risk < EPSILON {
            return 0.0;
        }
        -(vec_dot(w, self.mu) - self.rf) / risk
    }

    fn gradient(&self, w: &[f64]) -> Vec<f64> {
        let sigma_w = mat_vec_multiply(self.sigma, w);
        let variance = vec_dot(w, &sigma_w);
        let risk = variance.max(0.0).sqrt();
        if risk < EPSILON {
            return vec![0.0; w.len()];
        }
        let excess = vec_dot(w, self.mu) - self.rf;
        let risk_cubed = risk * variance;
        self.mu
            .iter()
            .zip(sigma_w.iter())
            .map(|(m, sw)| -m / risk + excess * sw / risk_cubed)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Optimise portfolio weights for a return matrix.
///
/// With a target return the portfolio volatility is minimised subject to
/// hitting the target; otherwise the Sharpe ratio is maximised.
pub fn optimize(
    request: &OptimizationRequest,
    config: &EngineConfig,
) -> RiskEngineResult<ComputationOutput<OptimizationResult>> {
    let start = Instant::now();
    let moments = MarketMoments::from_matrix(&request.return_matrix, config.frequency)?;
    let bounds = request.bounds.unwrap_or(WeightBounds {
        min: 0.0,
        max: config.limits.max_position_size,
    });

    let result = optimize_moments(
        &moments,
        request.target_return,
        request.risk_aversion,
        bounds,
        config.risk_free_rate,
        &config.optimizer,
    )?;
    let warnings: Vec<EngineWarning> = result.warning.iter().cloned().collect();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        if request.target_return.is_some() {
            "Mean-Variance Optimisation (minimum volatility at target return)"
        } else {
            "Mean-Variance Optimisation (maximum Sharpe ratio)"
        },
        &serde_json::json!({
            "n_assets": moments.len(),
            "target_return": request.target_return,
            "risk_aversion": request.risk_aversion,
            "bounds": bounds,
            "risk_free_rate": config.risk_free_rate,
            "solver": "projected gradient, Armijo backtracking, augmented Lagrangian",
            "max_iterations": config.optimizer.max_iterations,
        }),
        warnings,
        elapsed,
        result,
    ))
}

/// Optimise directly on annualised moments.
pub fn optimize_moments(
    moments: &MarketMoments,
    target_return: Option<Rate>,
    risk_aversion: f64,
    bounds: WeightBounds,
    risk_free_rate: Rate,
    settings: &OptimizerSettings,
) -> RiskEngineResult<OptimizationResult> {
    validate_moments(moments)?;
    if !(risk_aversion.is_finite() && risk_aversion > 0.0) {
        return Err(RiskEngineError::invalid(
            "risk_aversion",
            format!("Risk aversion must be positive, got {risk_aversion}"),
        ));
    }
    let n = moments.len();
    let box_bounds = feasible_box(n, bounds)?;
    let mu = &moments.expected_returns;
    let sigma = &moments.covariance;

    if let Some(target) = target_return {
        check_target(mu, &box_bounds, target)?;
    }

    let x0 = vec![1.0 / n as f64; n];
    let outcome = match target_return {
        Some(target) => {
            // riskAversion scales the objective only; it does not move the minimiser.
            let objective = MinVariance::new(sigma);
            match centred_constraint(mu, target) {
                Some((a, b)) => minimize_with_equality(
                    &objective,
                    &a,
                    b,
                    &x0,
                    &box_bounds,
                    settings.max_iterations,
                    settings.tolerance,
                ),
                None => projected_gradient(
                    &objective,
                    &x0,
                    &box_bounds,
                    settings.max_iterations,
                    settings.tolerance,
                ),
            }
        }
        None => projected_gradient(
            &NegativeSharpe {
                mu,
                sigma,
                rf: risk_free_rate,
            },
            &x0,
            &box_bounds,
            settings.max_iterations,
            settings.tolerance,
        ),
    };

    let (weights, warning) = if outcome.converged {
        tracing::info!(iterations = outcome.iterations, "optimiser converged");
        (outcome.x, None)
    } else {
        tracing::warn!(
            iterations = outcome.iterations,
            last_step = outcome.last_step,
            "optimiser did not converge; falling back to equal weights"
        );
        (
            x0,
            Some(EngineWarning::OptimizationDidNotConverge {
                iterations: outcome.iterations,
                last_step: outcome.last_step,
            }),
        )
    };

    let (expected_return, volatility, sharpe_ratio) =
        portfolio_stats(&weights, mu, sigma, risk_free_rate);
    Ok(OptimizationResult {
        weights: to_weight_map(&moments.asset_names, &weights),
        expected_return,
        volatility,
        sharpe_ratio,
        converged: outcome.converged,
        iterations: outcome.iterations,
        warning,
    })
}

/// Efficient frontier from the minimum-variance return to the highest
/// achievable return.
pub fn efficient_frontier(
    request: &OptimizationRequest,
    config: &EngineConfig,
) -> RiskEngineResult<ComputationOutput<Vec<FrontierPoint>>> {
    let start = Instant::now();
    let moments = MarketMoments::from_matrix(&request.return_matrix, config.frequency)?;
    let bounds = request.bounds.unwrap_or(WeightBounds {
        min: 0.0,
        max: config.limits.max_position_size,
    });
    let points = frontier_from_moments(&moments, bounds, config.risk_free_rate, &config.optimizer)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Efficient Frontier (minimum volatility per target return)",
        &serde_json::json!({
            "n_assets": moments.len(),
            "frontier_points": config.optimizer.frontier_points,
            "bounds": bounds,
        }),
        Vec::new(),
        elapsed,
        points,
    ))
}

pub fn frontier_from_moments(
    moments: &MarketMoments,
    bounds: WeightBounds,
    risk_free_rate: Rate,
    settings: &OptimizerSettings,
) -> RiskEngineResult<Vec<FrontierPoint>> {
    validate_moments(moments)?;
    let n = moments.len();
    let box_bounds = feasible_box(n, bounds)?;
    let mu = &moments.expected_returns;
    let sigma = &moments.covariance;
    let objective = MinVariance::new(sigma);
    let x0 = vec![1.0 / n as f64; n];

    let min_var = projected_gradient(
        &objective,
        &x0,
        &box_bounds,
        settings.max_iterations,
        settings.tolerance,
    );
    let min_ret = vec_dot(&min_var.x, mu);
    let (_, max_ret) = achievable_return_range(mu, &box_bounds);

    let point = |target: f64, w: &[f64], converged: bool| {
        let (expected_return, volatility, sharpe_ratio) =
            portfolio_stats(w, mu, sigma, risk_free_rate);
        FrontierPoint {
            target_return: target,
            expected_return,
            volatility,
            sharpe_ratio,
            weights: to_weight_map(&moments.asset_names, w),
            converged,
        }
    };

    let mut frontier = vec![point(min_ret, &min_var.x, min_var.converged)];
    if max_ret - min_ret < EPSILON {
        return Ok(frontier);
    }

    let count = settings.frontier_points;
    let step = (max_ret - min_ret) / (count - 1) as f64;
    let mut warm = min_var.x.clone();
    for k in 1..count {
        let target = min_ret + step * k as f64;
        let outcome = match centred_constraint(mu, target) {
            Some((a, b)) => minimize_with_equality(
                &objective,
                &a,
                b,
                &warm,
                &box_bounds,
                settings.max_iterations,
                settings.tolerance,
            ),
            None => break,
        };
        frontier.push(point(target, &outcome.x, outcome.converged));
        warm = outcome.x;
    }
    tracing::debug!(points = frontier.len(), min_ret, max_ret, "efficient frontier built");
    Ok(frontier)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_moments(moments: &MarketMoments) -> RiskEngineResult<()> {
    let n = moments.len();
    if n == 0 {
        return Err(RiskEngineError::invalid(
            "asset_names",
            "At least one asset is required",
        ));
    }
    if moments.expected_returns.len() != n {
        return Err(RiskEngineError::invalid(
            "expected_returns",
            format!("Expected {} returns, got {}", n, moments.expected_returns.len()),
        ));
    }
    if moments.covariance.len() != n || moments.covariance.iter().any(|row| row.len() != n) {
        return Err(RiskEngineError::invalid(
            "covariance",
            format!("Covariance matrix must be {n}x{n}"),
        ));
    }
    Ok(())
}

/// Box bounds or an infeasibility error when no weight vector fits them.
fn feasible_box(n: usize, bounds: WeightBounds) -> RiskEngineResult<BoxBounds> {
    if !(bounds.min.is_finite() && bounds.max.is_finite()) || bounds.min < 0.0 {
        return Err(RiskEngineError::InfeasibleConstraint(format!(
            "Weight bounds [{}, {}] must be finite and non-negative",
            bounds.min, bounds.max
        )));
    }
    if bounds.min > bounds.max {
        return Err(RiskEngineError::InfeasibleConstraint(format!(
            "Lower weight bound {} exceeds upper bound {}",
            bounds.min, bounds.max
        )));
    }
    let nf = n as f64;
    if bounds.min * nf > 1.0 + WEIGHT_TOLERANCE || bounds.max * nf < 1.0 - WEIGHT_TOLERANCE {
        return Err(RiskEngineError::InfeasibleConstraint(format!(
            "{n} assets with weights in [{}, {}] cannot sum to 1",
            bounds.min, bounds.max
        )));
    }
    Ok(BoxBounds::uniform(n, bounds.min, bounds.max))
}

/// Lowest and highest portfolio return reachable within the bounds.
pub(crate) fn achievable_return_range(mu: &[f64], bounds: &BoxBounds) -> (f64, f64) {
    let fill = |ascending: bool| -> f64 {
        let mut order: Vec<usize> = (0..mu.len()).collect();
        order.sort_by(|&i, &j| {
            let ord = mu[i].partial_cmp(&mu[j]).unwrap_or(std::cmp::Ordering::Equal);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        });
        let mut w = bounds.lower.clone();
        let mut remaining = 1.0 - w.iter().sum::<f64>();
        for i in order {
            let add = (bounds.upper[i] - bounds.lower[i]).min(remaining).max(0.0);
            w[i] += add;
            remaining -= add;
        }
        vec_dot(&w, mu)
    };
    (fill(true), fill(false))
}

fn check_target(mu: &[f64], bounds: &BoxBounds, target: f64) -> RiskEngineResult<()> {
    if !target.is_finite() {
        return Err(RiskEngineError::invalid(
            "target_return",
            "Target return must be finite",
        ));
    }
    let (lo, hi) = achievable_return_range(mu, bounds);
    if target < lo - 1e-9 {
        return Err(RiskEngineError::InfeasibleConstraint(format!(
            "Target return {target:.6} is below the minimum achievable return {lo:.6}"
        )));
    }
    if target > hi + 1e-9 {
        return Err(RiskEngineError::InfeasibleConstraint(format!(
            "Target return {target:.6} is above the maximum achievable return {hi:.6}"
        )));
    }
    Ok(())
}

/// `w·μ = target` rewritten on the simplex as a unit-norm constraint
/// `a·w = b` with `a ∝ μ - mean(μ)`. `None` when every asset has the same
/// expected return.
fn centred_constraint(mu: &[f64], target: f64) -> Option<(Vec<f64>, f64)> {
    let centre = stats::mean(mu);
    let deviations: Vec<f64> = mu.iter().map(|m| m - centre).collect();
    let norm = vec_dot(&deviations, &deviations).sqrt();
    if norm < EPSILON {
        return None;
    }
    let a = deviations.iter().map(|d| d / norm).collect();
    Some((a, (target - centre) / norm))
}

fn portfolio_stats(w: &[f64], mu: &[f64], sigma: &[Vec<f64>], rf: f64) -> (f64, f64, f64) {
    let ret = vec_dot(w, mu);
    let vol = quadratic_form(w, sigma).max(0.0).sqrt();
    let sharpe = if vol < EPSILON { 0.0 } else { (ret - rf) / vol };
    (ret, vol, sharpe)
}

fn to_weight_map(names: &[String], w: &[f64]) -> WeightMap {
    names.iter().cloned().zip(w.iter().copied()).collect()
}
