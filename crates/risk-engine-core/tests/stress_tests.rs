mod common;

use common::{matrix, normal_returns, weights, zigzag};
use risk_engine_core::metrics::MetricsSettings;
use risk_engine_core::stress::{
    default_crises, default_scenarios, estimate_recovery_time, post_stress_series,
    run_historical, run_monte_carlo, run_scenarios, AssetClass, HistoricalCrisis,
    MonteCarloSettings, ShockSpec, StressInput, StressScenario,
};
use risk_engine_core::{EngineWarning, ReturnFrequency, RiskEngineError};
use std::collections::BTreeMap;

fn settings() -> MetricsSettings {
    MetricsSettings {
        frequency: ReturnFrequency::Daily,
        risk_free_rate: 0.0,
    }
}

fn single_asset_input(returns: Vec<f64>) -> StressInput {
    StressInput {
        return_matrix: matrix(&[("ONLY", returns)]),
        weights: weights(&[("ONLY", 1.0)]),
        asset_classes: BTreeMap::new(),
        allow_partial: false,
    }
}

fn balanced_input() -> StressInput {
    StressInput {
        return_matrix: matrix(&[
            ("SPY", normal_returns(252, 0.0006, 0.012, 1)),
            ("AGG", normal_returns(252, 0.0002, 0.004, 2)),
            ("VNQ", normal_returns(252, 0.0003, 0.014, 3)),
        ]),
        weights: weights(&[("SPY", 0.5), ("AGG", 0.3), ("VNQ", 0.2)]),
        asset_classes: BTreeMap::from([
            ("SPY".to_string(), AssetClass::Equity),
            ("AGG".to_string(), AssetClass::FixedIncome),
            ("VNQ".to_string(), AssetClass::RealEstate),
        ]),
        allow_partial: false,
    }
}

// ===========================================================================
// Historical replay
// ===========================================================================

#[test]
fn test_uniform_crisis_on_zero_mean_asset() {
    let crisis = HistoricalCrisis {
        name: "drop".into(),
        description: String::new(),
        shock_multiplier: -0.30,
    };
    let out = run_historical(&single_asset_input(zigzag(252, 0.01)), &[crisis], &settings())
        .unwrap();
    let r = &out.result["drop"];
    assert!((r.portfolio_return + 0.30).abs() < 1e-9, "{}", r.portfolio_return);
    assert_eq!(r.scenario_name, "drop");
}

#[test]
fn test_default_crises_ranked_by_severity() {
    let out = run_historical(&balanced_input(), &default_crises(), &settings()).unwrap();
    assert_eq!(out.result.len(), 5);
    let dot_com = out.result["Dot-Com 2000"].portfolio_return;
    let taper = out.result["Taper Tantrum 2013"].portfolio_return;
    assert!(dot_com < taper);
}

#[test]
fn test_empty_crisis_list_rejected() {
    let err = run_historical(&balanced_input(), &[], &settings());
    assert!(matches!(err, Err(RiskEngineError::InvalidInput { .. })));
}

// ===========================================================================
// Scenario shocks
// ===========================================================================

#[test]
fn test_default_scenarios_produce_one_result_each() {
    let out = run_scenarios(&balanced_input(), &default_scenarios(), &settings()).unwrap();
    let names: Vec<&str> = out.result.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec![
            "equity_bond_rotation",
            "market_crash",
            "rate_shock",
            "volatility_spike"
        ]
    );
    assert!(out.warnings.is_empty());
}

#[test]
fn test_volatility_spike_keeps_return_and_doubles_risk() {
    let input = single_asset_input(normal_returns(252, 0.0004, 0.01, 4));
    let scenarios = vec![StressScenario {
        name: "spike".into(),
        description: String::new(),
        shock: ShockSpec::VolatilityShock { multiplier: 2.0 },
    }];
    let out = run_scenarios(&input, &scenarios, &settings()).unwrap();
    let r = &out.result["spike"];
    assert!((r.portfolio_return - 0.0004).abs() < 1e-12);
    assert!((r.portfolio_volatility - 0.02 * 252f64.sqrt()).abs() < 1e-9);
}

#[test]
fn test_class_shock_hits_only_its_class() {
    let input = balanced_input();
    let bonds_only = vec![StressScenario {
        name: "bonds".into(),
        description: String::new(),
        shock: ShockSpec::ClassShock {
            class_shocks: BTreeMap::from([(AssetClass::FixedIncome, -0.10)]),
        },
    }];
    let out = run_scenarios(&input, &bonds_only, &settings()).unwrap();
    let baseline = 0.5 * 0.0006 + 0.3 * 0.0002 + 0.2 * 0.0003;
    let expected = baseline + 0.3 * ((1.0 + 0.0002) * 0.9 - 1.0 - 0.0002);
    assert!((out.result["bonds"].portfolio_return - expected).abs() < 1e-9);
}

#[test]
fn test_missing_class_reported_not_guessed() {
    let mut input = balanced_input();
    input.asset_classes.remove("VNQ");
    let out = run_scenarios(&input, &default_scenarios(), &settings()).unwrap();
    // both class-based defaults see the unclassified holding
    let flagged: Vec<&str> = out
        .warnings
        .iter()
        .filter_map(|w| match w {
            EngineWarning::UnclassifiedAssets { scenario, assets } => {
                assert_eq!(assets, &vec!["VNQ".to_string()]);
                Some(scenario.as_str())
            }
            _ => None,
        })
        .collect();
    assert_eq!(flagged, vec!["rate_shock", "equity_bond_rotation"]);
}

#[test]
fn test_invalid_shock_rejected() {
    let scenarios = vec![StressScenario {
        name: "wipeout".into(),
        description: String::new(),
        shock: ShockSpec::UniformShock { multiplier: -1.5 },
    }];
    assert!(run_scenarios(&balanced_input(), &scenarios, &settings()).is_err());
}

// ===========================================================================
// Recovery estimate
// ===========================================================================

#[test]
fn test_recovery_counts_positive_periods_after_trough() {
    let mut returns = vec![0.01; 10];
    returns.extend([-0.05, -0.05]);
    returns.extend([0.02, 0.02, -0.01, 0.02, 0.02]);
    let post = post_stress_series(&returns);
    assert_eq!(post.len(), 5);
    assert_eq!(estimate_recovery_time(&post), Some(4));
}

#[test]
fn test_choppy_rebound_is_not_a_recovery() {
    let post = post_stress_series(&zigzag(40, 0.01));
    assert_eq!(estimate_recovery_time(&post), None);
}

// ===========================================================================
// Monte Carlo
// ===========================================================================

#[test]
fn test_monte_carlo_seed_reproducible_and_orderly() {
    let settings = MonteCarloSettings {
        num_simulations: 5_000,
        stress_intensity: 0.5,
        seed: Some(99),
        correlated: true,
    };
    let a = run_monte_carlo(&balanced_input(), &settings).unwrap().result;
    let b = run_monte_carlo(&balanced_input(), &settings).unwrap().result;
    assert_eq!(a, b);
    assert!(a.correlated);
    assert!(a.cvar95 >= a.var95);
    assert!(a.worst <= a.best);
}

#[test]
fn test_monte_carlo_result_as_stress_result() {
    let settings = MonteCarloSettings {
        num_simulations: 2_000,
        seed: Some(5),
        ..MonteCarloSettings::default()
    };
    let mc = run_monte_carlo(&balanced_input(), &settings).unwrap().result;
    let summary = mc.to_stress_result(ReturnFrequency::Daily);
    assert_eq!(summary.scenario_name, "monte_carlo");
    assert_eq!(summary.var95, mc.var95);
    assert_eq!(summary.recovery_time, None);
    assert!((summary.portfolio_volatility - mc.std_dev * 252f64.sqrt()).abs() < 1e-12);
}
