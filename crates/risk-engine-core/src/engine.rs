//! Consolidated risk assessment.
//!
//! `RiskEngine` owns the configuration behind an `Arc` and never mutates
//! it: a new configuration means a new engine. Every method only reads its
//! inputs, so one engine can serve many threads at once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::limits::{check_limits_against, RiskAlert};
use crate::metrics::{calculate_risk_metrics, RiskMetrics, RiskMetricsInput};
use crate::optimization::{self, OptimizationRequest, OptimizationResult, WeightBounds};
use crate::regimes::{analyze_recovery, detect_regime_changes, RecoveryAnalysis, RegimeDetection};
use crate::session::RiskSession;
use crate::stress::{
    run_historical, run_monte_carlo, run_scenarios, AssetClass, MonteCarloStressResult,
    StressInput, StressTestResult,
};
use crate::types::{validate_weight_map, EngineWarning, ReturnMatrix, SectorMap, WeightMap};
use crate::RiskEngineResult;

/// Everything the engine needs for one full assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub return_matrix: ReturnMatrix,
    pub weights: WeightMap,
    #[serde(default)]
    pub sectors: SectorMap,
    #[serde(default)]
    pub asset_classes: BTreeMap<String, AssetClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<Vec<f64>>,
    #[serde(default)]
    pub require_benchmark_metrics: bool,
    #[serde(default)]
    pub allow_partial: bool,
    /// Propose optimised weights as part of the report.
    #[serde(default)]
    pub optimize: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_return: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<WeightBounds>,
    #[serde(default)]
    pub skip_monte_carlo: bool,
}

/// The consolidated risk report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub metrics: RiskMetrics,
    pub alerts: Vec<RiskAlert>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization: Option<OptimizationResult>,
    pub scenario_results: BTreeMap<String, StressTestResult>,
    pub historical_results: BTreeMap<String, StressTestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monte_carlo: Option<MonteCarloStressResult>,
    pub regimes: RegimeDetection,
    pub recovery: RecoveryAnalysis,
    pub warnings: Vec<EngineWarning>,
    pub generated_at: DateTime<Utc>,
    pub computation_time_us: u64,
}

#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: Arc<EngineConfig>,
}

impl RiskEngine {
    /// Validate `config` and build an engine around it.
    pub fn new(config: EngineConfig) -> RiskEngineResult<Self> {
        config.validate()?;
        Ok(RiskEngine {
            config: Arc::new(config),
        })
    }

    /// Share an already-validated configuration.
    pub fn from_shared(config: Arc<EngineConfig>) -> RiskEngineResult<Self> {
        config.validate()?;
        Ok(RiskEngine { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn shared_config(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.config)
    }

    /// Run the full control flow and append alerts and stress results to
    /// `session`.
    pub fn assess(
        &self,
        session: &mut RiskSession,
        request: &AssessmentRequest,
    ) -> RiskEngineResult<RiskReport> {
        let start = Instant::now();
        let config = &*self.config;
        let metrics_settings = config.metrics_settings();

        request.return_matrix.validate()?;
        validate_weight_map(&request.weights, request.allow_partial)?;
        let portfolio = request.return_matrix.portfolio_returns(&request.weights)?;
        let mut warnings = Vec::new();

        // first pass: metrics and limits
        let metrics_out = calculate_risk_metrics(&RiskMetricsInput {
            returns: portfolio.clone(),
            benchmark: request.benchmark.clone(),
            settings: metrics_settings,
            require_benchmark_metrics: request.require_benchmark_metrics,
        })?;
        warnings.extend(metrics_out.warnings);
        let metrics = metrics_out.result;

        let alerts = check_limits_against(
            &request.weights,
            &request.return_matrix,
            &request.sectors,
            &metrics,
            &config.limits,
        )?;
        session.record_alerts(alerts.iter().cloned());

        let optimization = if request.optimize {
            let out = optimization::optimize(
                &OptimizationRequest {
                    return_matrix: request.return_matrix.clone(),
                    target_return: request.target_return,
                    risk_aversion: 1.0,
                    bounds: request.bounds,
                },
                config,
            )?;
            warnings.extend(out.warnings);
            Some(out.result)
        } else {
            None
        };

        // stress testing
        let stress_input = StressInput {
            return_matrix: request.return_matrix.clone(),
            weights: request.weights.clone(),
            asset_classes: request.asset_classes.clone(),
            allow_partial: request.allow_partial,
        };
        let scenario_out = run_scenarios(
            &stress_input,
            &config.stress.stress_scenarios,
            &metrics_settings,
        )?;
        warnings.extend(scenario_out.warnings);
        let historical_out = run_historical(
            &stress_input,
            &config.stress.historical_crises,
            &metrics_settings,
        )?;
        warnings.extend(historical_out.warnings);
        let monte_carlo = if request.skip_monte_carlo {
            None
        } else {
            let out = run_monte_carlo(&stress_input, &config.stress.monte_carlo)?;
            warnings.extend(out.warnings);
            Some(out.result)
        };

        session.record_stress_results(scenario_out.result.values().cloned());
        session.record_stress_results(historical_out.result.values().cloned());
        if let Some(ref mc) = monte_carlo {
            session.record_stress_results([mc.to_stress_result(config.frequency)]);
        }

        // regimes on the portfolio series
        let regimes = detect_regime_changes(
            &portfolio,
            request.return_matrix.dates.as_deref(),
            &config.regimes,
        )?;
        let recovery = analyze_recovery(&portfolio, &regimes.regimes)?;

        session.record_warnings(warnings.iter().cloned());
        tracing::info!(
            alerts = alerts.len(),
            regimes = regimes.regimes.len(),
            warnings = warnings.len(),
            "risk assessment complete"
        );

        Ok(RiskReport {
            metrics,
            alerts,
            optimization,
            scenario_results: scenario_out.result,
            historical_results: historical_out.result,
            monte_carlo,
            regimes,
            recovery,
            warnings,
            generated_at: Utc::now(),
            computation_time_us: start.elapsed().as_micros() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::AlertType;
    use crate::stress::MonteCarloSettings;
    use crate::test_support::{matrix, normal_returns, weights};
    use std::thread;

    fn engine() -> RiskEngine {
        let mut config = EngineConfig::default();
        config.stress.monte_carlo = MonteCarloSettings {
            num_simulations: 1_000,
            seed: Some(7),
            ..MonteCarloSettings::default()
        };
        RiskEngine::new(config).unwrap()
    }

    fn request() -> AssessmentRequest {
        AssessmentRequest {
            return_matrix: matrix(&[
                ("AAA", normal_returns(252, 0.0006, 0.015, 1)),
                ("BBB", normal_returns(252, 0.0003, 0.008, 2)),
                ("CCC", normal_returns(252, 0.0004, 0.012, 3)),
            ]),
            weights: weights(&[("AAA", 0.5), ("BBB", 0.3), ("CCC", 0.2)]),
            sectors: SectorMap::new(),
            asset_classes: BTreeMap::new(),
            benchmark: None,
            require_benchmark_metrics: false,
            allow_partial: false,
            optimize: true,
            target_return: None,
            bounds: Some(WeightBounds { min: 0.0, max: 0.6 }),
            skip_monte_carlo: false,
        }
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_engine_types_are_send_and_sync() {
        assert_send_sync::<RiskEngine>();
        assert_send_sync::<EngineConfig>();
        assert_send_sync::<RiskReport>();
        assert_send_sync::<RiskSession>();
    }

    #[test]
    fn test_assess_builds_full_report() {
        let engine = engine();
        let mut session = RiskSession::new();
        let report = engine.assess(&mut session, &request()).unwrap();

        // default 10% position cap is breached by every holding
        let positions = report
            .alerts
            .iter()
            .filter(|a| a.alert_type == AlertType::PositionLimit)
            .count();
        assert_eq!(positions, 3);
        assert_eq!(session.alerts().len(), report.alerts.len());

        assert_eq!(report.scenario_results.len(), 4);
        assert_eq!(report.historical_results.len(), 5);
        assert!(report.monte_carlo.is_some());
        assert_eq!(session.stress_results().len(), 10);
        assert!(report.optimization.is_some());
        assert_eq!(report.regimes.rolling_volatility.len(), 252);
        assert_eq!(report.metrics.observations, 252);
    }

    #[test]
    fn test_session_accumulates_over_assessments() {
        let engine = engine();
        let mut session = RiskSession::new();
        let first = engine.assess(&mut session, &request()).unwrap();
        engine.assess(&mut session, &request()).unwrap();
        assert_eq!(session.alerts().len(), 2 * first.alerts.len());
        assert_eq!(session.stress_results().len(), 20);
        assert_eq!(session.stress_results_for("market_crash").count(), 2);
        assert_eq!(session.stress_results_for("monte_carlo").count(), 2);
    }

    #[test]
    fn test_invalid_weights_rejected_first() {
        let mut req = request();
        req.weights = weights(&[("AAA", 0.5), ("BBB", 0.3)]);
        let mut session = RiskSession::new();
        assert!(engine().assess(&mut session, &req).is_err());
        assert!(session.alerts().is_empty());
    }

    #[test]
    fn test_parallel_assessments_share_one_engine() {
        let engine = Arc::new(engine());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let mut session = RiskSession::new();
                    let mut req = request();
                    req.skip_monte_carlo = true;
                    engine.assess(&mut session, &req).map(|r| r.metrics)
                })
            })
            .collect();
        let metrics: Vec<RiskMetrics> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert!(metrics.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.limits.max_position_size = 0.0;
        assert!(RiskEngine::new(config).is_err());
    }
}
