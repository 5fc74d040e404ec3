mod common;

use common::{matrix, normal_returns, three_asset_matrix};
use risk_engine_core::optimization::{
    efficient_frontier, optimize, OptimizationRequest, WeightBounds,
};
use risk_engine_core::{EngineConfig, EngineWarning, RiskEngineError};

fn request(target_return: Option<f64>) -> OptimizationRequest {
    OptimizationRequest {
        return_matrix: three_asset_matrix(),
        target_return,
        risk_aversion: 1.0,
        bounds: Some(WeightBounds { min: 0.0, max: 1.0 }),
    }
}

fn weight_sum(w: &risk_engine_core::WeightMap) -> f64 {
    w.values().sum()
}

#[test]
fn test_max_sharpe_weights_are_fully_invested() {
    let out = optimize(&request(None), &EngineConfig::default()).unwrap();
    let r = &out.result;
    assert!((weight_sum(&r.weights) - 1.0).abs() < 1e-6);
    assert!(r.weights.values().all(|w| *w >= -1e-9 && *w <= 1.0 + 1e-9));
    assert_eq!(out.warnings.is_empty(), r.converged);
}

#[test]
fn test_max_sharpe_beats_equal_weight() {
    let config = EngineConfig::default();
    let best = optimize(&request(None), &config).unwrap().result;
    let equal = {
        let mut cfg = config.clone();
        cfg.optimizer.max_iterations = 1;
        optimize(&request(None), &cfg).unwrap().result
    };
    assert!(best.sharpe_ratio >= equal.sharpe_ratio - 1e-9);
}

#[test]
fn test_target_return_is_met() {
    // annualised means: BOND 5.04%, EQTY 17.64%, GOLD 7.56%
    let target = 0.10;
    let out = optimize(&request(Some(target)), &EngineConfig::default()).unwrap();
    let r = &out.result;
    assert!(r.converged, "solver did not converge in {} iterations", r.iterations);
    assert!(
        (r.expected_return - target).abs() < 1e-4,
        "expected return {} missed target {target}",
        r.expected_return
    );
    assert!((weight_sum(&r.weights) - 1.0).abs() < 1e-6);
}

#[test]
fn test_target_below_minimum_return_is_infeasible() {
    let req = OptimizationRequest {
        return_matrix: matrix(&[
            ("A", normal_returns(252, 0.0004, 0.012, 1)),
            ("B", normal_returns(252, 0.0002, 0.006, 2)),
        ]),
        target_return: Some(-0.50),
        risk_aversion: 1.0,
        bounds: Some(WeightBounds { min: 0.0, max: 1.0 }),
    };
    let err = optimize(&req, &EngineConfig::default());
    assert!(matches!(err, Err(RiskEngineError::InfeasibleConstraint(_))));
}

#[test]
fn test_target_above_maximum_return_is_infeasible() {
    let err = optimize(&request(Some(0.90)), &EngineConfig::default());
    assert!(matches!(err, Err(RiskEngineError::InfeasibleConstraint(_))));
}

#[test]
fn test_default_bounds_follow_position_limit() {
    // three assets capped at the default 10% cannot sum to one
    let mut req = request(None);
    req.bounds = None;
    let err = optimize(&req, &EngineConfig::default());
    assert!(matches!(err, Err(RiskEngineError::InfeasibleConstraint(_))));

    let mut config = EngineConfig::default();
    config.limits.max_position_size = 0.4;
    let r = optimize(&req, &config).unwrap().result;
    assert!(r.weights.values().all(|w| *w <= 0.4 + 1e-9));
}

#[test]
fn test_non_convergence_falls_back_to_equal_weights() {
    let mut config = EngineConfig::default();
    config.optimizer.max_iterations = 1;
    let out = optimize(&request(None), &config).unwrap();
    assert!(!out.result.converged);
    for w in out.result.weights.values() {
        assert!((w - 1.0 / 3.0).abs() < 1e-12);
    }
    assert!(matches!(
        out.warnings.as_slice(),
        [EngineWarning::OptimizationDidNotConverge { .. }]
    ));
}

#[test]
fn test_short_history_rejected() {
    let req = OptimizationRequest {
        return_matrix: matrix(&[
            ("A", normal_returns(20, 0.0004, 0.012, 1)),
            ("B", normal_returns(20, 0.0002, 0.006, 2)),
        ]),
        target_return: None,
        risk_aversion: 1.0,
        bounds: None,
    };
    let err = optimize(&req, &EngineConfig::default());
    assert!(matches!(err, Err(RiskEngineError::InsufficientData { .. })));
}

#[test]
fn test_frontier_trades_return_for_volatility() {
    let out = efficient_frontier(&request(None), &EngineConfig::default()).unwrap();
    let points = &out.result;
    assert_eq!(points.len(), 20);
    for pair in points.windows(2) {
        assert!(pair[1].expected_return > pair[0].expected_return - 1e-6);
        assert!(pair[1].volatility > pair[0].volatility - 1e-6);
    }
    for p in points {
        assert!((weight_sum(&p.weights) - 1.0).abs() < 1e-6);
    }
}
