//! Projected-gradient solver on the capped simplex.
//!
//! Feasible set: `{ w : Σw = 1, lo_i ≤ w_i ≤ hi_i }`. Steps are chosen by
//! Armijo backtracking along the projection arc; a single linear equality
//! `a·w = b` on top of the simplex is handled by an augmented-Lagrangian
//! outer loop (method of multipliers) around the same inner solver.

use crate::stats::vec_dot;

const ARMIJO_C: f64 = 1e-4;
const MIN_STEP: f64 = 1e-16;
const MAX_STEP: f64 = 1e6;
const BISECTION_ROUNDS: usize = 200;
const MAX_OUTER_ROUNDS: usize = 60;
const MAX_PENALTY: f64 = 1e4;

/// A smooth objective over portfolio weights.
pub trait Objective {
    fn value(&self, w: &[f64]) -> f64;
    fn gradient(&self, w: &[f64]) -> Vec<f64>;
}

/// Per-coordinate box bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl BoxBounds {
    pub fn uniform(n: usize, lower: f64, upper: f64) -> Self {
        BoxBounds {
            lower: vec![lower; n],
            upper: vec![upper; n],
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }
}

/// Outcome of a solver run.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub x: Vec<f64>,
    pub iterations: u32,
    pub converged: bool,
    /// Infinity norm of the final accepted move.
    pub last_step: f64,
}

/// Euclidean projection of `v` onto the capped simplex.
///
/// The projection has the form `clamp(v_i - τ, lo_i, hi_i)`; `τ` is found
/// by bisection since the clamped sum is non-increasing in `τ`. The caller
/// guarantees `Σlo ≤ 1 ≤ Σhi`.
pub fn project_capped_simplex(v: &[f64], bounds: &BoxBounds) -> Vec<f64> {
    let clamped_sum = |tau: f64| -> f64 {
        v.iter()
            .zip(bounds.lower.iter().zip(bounds.upper.iter()))
            .map(|(vi, (lo, hi))| (vi - tau).clamp(*lo, *hi))
            .sum()
    };

    let mut tau_lo = v
        .iter()
        .zip(bounds.upper.iter())
        .map(|(vi, hi)| vi - hi)
        .fold(f64::INFINITY, f64::min)
        - 1.0;
    let mut tau_hi = v
        .iter()
        .zip(bounds.lower.iter())
        .map(|(vi, lo)| vi - lo)
        .fold(f64::NEG_INFINITY, f64::max)
        + 1.0;

    for _ in 0..BISECTION_ROUNDS {
        let mid = 0.5 * (tau_lo + tau_hi);
        if clamped_sum(mid) > 1.0 {
            tau_lo = mid;
        } else {
            tau_hi = mid;
        }
        if tau_hi - tau_lo < 1e-15 {
            break;
        }
    }
    let tau = 0.5 * (tau_lo + tau_hi);
    v.iter()
        .zip(bounds.lower.iter().zip(bounds.upper.iter()))
        .map(|(vi, (lo, hi))| (vi - tau).clamp(*lo, *hi))
        .collect()
}

/// Infinity norm of the projected-gradient move `P(x - s g) - x`, with the
/// step `s` normalised by the gradient size. Zero exactly at a stationary point.
fn stationarity(x: &[f64], grad: &[f64], bounds: &BoxBounds) -> f64 {
    let g_max = grad.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
    let s = 1.0 / (1.0 + g_max);
    let trial: Vec<f64> = x.iter().zip(grad.iter()).map(|(xi, gi)| xi - s * gi).collect();
    project_capped_simplex(&trial, bounds)
        .iter()
        .zip(x.iter())
        .map(|(p, xi)| (p - xi).abs())
        .fold(0.0, f64::max)
}

/// Minimise `objective` over the capped simplex starting from `x0`.
pub fn projected_gradient(
    objective: &dyn Objective,
    x0: &[f64],
    bounds: &BoxBounds,
    max_iterations: u32,
    tolerance: f64,
) -> SolveOutcome {
    let mut x = project_capped_simplex(x0, bounds);
    let mut fx = objective.value(&x);
    let mut step = 1.0;
    let mut last_step = f64::INFINITY;

    for iteration in 1..=max_iterations {
        let grad = objective.gradient(&x);

        let mut accepted = None;
        let mut t = step;
        while t >= MIN_STEP {
            let trial: Vec<f64> = x.iter().zip(grad.iter()).map(|(xi, gi)| xi - t * gi).collect();
            let candidate = project_capped_simplex(&trial, bounds);
            let direction: Vec<f64> = candidate.iter().zip(x.iter()).map(|(c, xi)| c - xi).collect();
            let f_candidate = objective.value(&candidate);
            if f_candidate <= fx + ARMIJO_C * vec_dot(&grad, &direction) {
                accepted = Some((candidate, f_candidate));
                break;
            }
            t *= 0.5;
        }

        let Some((candidate, f_candidate)) = accepted else {
            // line search stalled; only a stationary point counts as converged
            let residual = stationarity(&x, &grad, bounds);
            let converged = residual.is_finite() && residual <= tolerance.sqrt().max(1e-6);
            if !converged {
                tracing::debug!(iteration, residual, "line search stalled away from a stationary point");
            }
            return SolveOutcome {
                x,
                iterations: iteration,
                converged,
                last_step: 0.0,
            };
        };

        last_step = candidate
            .iter()
            .zip(x.iter())
            .map(|(c, xi)| (c - xi).abs())
            .fold(0.0, f64::max);
        let decrease = fx - f_candidate;
        x = candidate;
        fx = f_candidate;
        step = (t * 2.0).min(MAX_STEP);

        if last_step <= tolerance || decrease <= tolerance * 1e-2 * (1.0 + fx.abs()) {
            return SolveOutcome {
                x,
                iterations: iteration,
                converged: true,
                last_step,
            };
        }
    }

    SolveOutcome {
        x,
        iterations: max_iterations,
        converged: false,
        last_step,
    }
}

/// `base(w) + λ h(w) + ρ/2 h(w)²` with `h(w) = a·w - b`.
struct AugmentedLagrangian<'a> {
    base: &'a dyn Objective,
    a: &'a [f64],
    b: f64,
    lambda: f64,
    rho: f64,
}

impl Objective for AugmentedLagrangian<'_> {
    fn value(&self, w: &[f64]) -> f64 {
        let h = vec_dot(self.a, w) - self.b;
        self.base.value(w) + self.lambda * h + 0.5 * self.rho * h * h
    }

    fn gradient(&self, w: &[f64]) -> Vec<f64> {
        let h = vec_dot(self.a, w) - self.b;
        let scale = self.lambda + self.rho * h;
        self.base
            .gradient(w)
            .iter()
            .zip(self.a.iter())
            .map(|(g, ai)| g + scale * ai)
            .collect()
    }
}

/// Minimise `objective` over the capped simplex subject to `a·w = b`.
///
/// `max_iterations` caps the inner iterations summed over all outer rounds.
/// `a` should be scaled to unit norm so the penalty is well conditioned.
pub fn minimize_with_equality(
    objective: &dyn Objective,
    a: &[f64],
    b: f64,
    x0: &[f64],
    bounds: &BoxBounds,
    max_iterations: u32,
    tolerance: f64,
) -> SolveOutcome {
    let equality_tolerance = tolerance.sqrt().min(1e-6);
    let mut lambda = 0.0;
    let mut rho = 10.0;
    let mut x = x0.to_vec();
    let mut used: u32 = 0;
    let mut last_step = f64::INFINITY;
    let mut previous_violation = f64::INFINITY;

    for round in 0..MAX_OUTER_ROUNDS {
        let remaining = max_iterations.saturating_sub(used);
        if remaining == 0 {
            break;
        }
        let lagrangian = AugmentedLagrangian {
            base: objective,
            a,
            b,
            lambda,
            rho,
        };
        let inner = projected_gradient(&lagrangian, &x, bounds, remaining, tolerance);
        used += inner.iterations;
        x = inner.x;
        last_step = inner.last_step;

        let violation = vec_dot(a, &x) - b;
        tracing::debug!(round, violation, rho, used, "augmented lagrangian round");
        if !inner.converged {
            break;
        }
        if violation.abs() <= equality_tolerance {
            return SolveOutcome {
                x,
                iterations: used,
                converged: true,
                last_step,
            };
        }
        lambda += rho * violation;
        if violation.abs() > 0.25 * previous_violation {
            rho = (rho * 10.0).min(MAX_PENALTY);
        }
        previous_violation = violation.abs();
    }

    SolveOutcome {
        x,
        iterations: used.min(max_iterations),
        converged: false,
        last_step,
    }
}
