//! Limit enforcement.
//!
//! Every check runs on every call, so one request can raise alerts from
//! several checks at once. Alerts come out in check order, then in asset
//! or sector key order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::alerts::{AlertType, RiskAlert, Severity};
use crate::config::RiskLimits;
use crate::error::RiskEngineError;
use crate::metrics::{compute_risk_metrics, MetricsSettings, RiskMetrics};
use crate::stats::{self, EPSILON};
use crate::types::{validate_weight_map, ReturnMatrix, SectorMap, WeightMap};
use crate::RiskEngineResult;

/// Sector assigned to assets missing from the sector map.
pub const UNCLASSIFIED_SECTOR: &str = "unclassified";

/// Portfolio composition handed to the limit checker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitCheckInput {
    pub weights: WeightMap,
    pub return_matrix: ReturnMatrix,
    /// Portfolio return series; derived from `weights` and the matrix when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_returns: Option<Vec<f64>>,
    #[serde(default)]
    pub sectors: SectorMap,
    /// Permit weights summing below 1 (cash residual).
    #[serde(default)]
    pub allow_partial: bool,
}

/// Validate the composition, compute portfolio metrics and check them
/// against `limits`.
pub fn check_limits(
    input: &LimitCheckInput,
    limits: &RiskLimits,
    settings: &MetricsSettings,
) -> RiskEngineResult<Vec<RiskAlert>> {
    validate_weight_map(&input.weights, input.allow_partial)?;
    input.return_matrix.validate()?;
    let derived;
    let portfolio_returns = match input.portfolio_returns {
        Some(ref series) => series.as_slice(),
        None => {
            derived = input.return_matrix.portfolio_returns(&input.weights)?;
            derived.as_slice()
        }
    };
    let metrics = compute_risk_metrics(portfolio_returns, None, settings)?;
    check_limits_against(
        &input.weights,
        &input.return_matrix,
        &input.sectors,
        &metrics,
        limits,
    )
}

/// Check already-computed portfolio metrics and composition against `limits`.
pub fn check_limits_against(
    weights: &WeightMap,
    matrix: &ReturnMatrix,
    sectors: &SectorMap,
    metrics: &RiskMetrics,
    limits: &RiskLimits,
) -> RiskEngineResult<Vec<RiskAlert>> {
    for asset in weights.keys() {
        if matrix.get(asset).is_none() {
            return Err(RiskEngineError::InvalidWeightMap(format!(
                "Asset '{asset}' has a weight but no return series"
            )));
        }
    }

    let mut alerts = Vec::new();
    position_alerts(weights, limits, &mut alerts);
    sector_alerts(weights, sectors, limits, &mut alerts);
    metric_alerts(metrics, limits, &mut alerts);
    correlation_alerts(weights, matrix, limits, &mut alerts);
    risk_reward_alert(metrics, limits, &mut alerts);

    if alerts.is_empty() {
        tracing::debug!("all limits satisfied");
    } else {
        tracing::info!(count = alerts.len(), "limit breaches detected");
    }
    Ok(alerts)
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

fn position_alerts(weights: &WeightMap, limits: &RiskLimits, alerts: &mut Vec<RiskAlert>) {
    for (asset, w) in weights {
        if *w > limits.max_position_size {
            alerts.push(
                RiskAlert::new(
                    AlertType::PositionLimit,
                    Severity::High,
                    format!(
                        "Position {asset} at {:.2}% exceeds limit of {:.2}%",
                        w * 100.0,
                        limits.max_position_size * 100.0
                    ),
                    *w,
                    limits.max_position_size,
                )
                .for_asset(asset),
            );
        }
    }
}

/// Aggregate weight per sector.
pub fn sector_exposures(weights: &WeightMap, sectors: &SectorMap) -> BTreeMap<String, f64> {
    let mut exposure: BTreeMap<String, f64> = BTreeMap::new();
    for (asset, w) in weights {
        let sector = sectors
            .get(asset)
            .map(String::as_str)
            .unwrap_or(UNCLASSIFIED_SECTOR);
        *exposure.entry(sector.to_string()).or_insert(0.0) += w;
    }
    exposure
}

fn sector_alerts(
    weights: &WeightMap,
    sectors: &SectorMap,
    limits: &RiskLimits,
    alerts: &mut Vec<RiskAlert>,
) {
    for (sector, total) in sector_exposures(weights, sectors) {
        if total > limits.max_sector_exposure {
            alerts.push(
                RiskAlert::new(
                    AlertType::SectorLimit,
                    Severity::Medium,
                    format!(
                        "Sector {sector} exposure {:.2}% exceeds limit of {:.2}%",
                        total * 100.0,
                        limits.max_sector_exposure * 100.0
                    ),
                    total,
                    limits.max_sector_exposure,
                )
                .for_sector(&sector),
            );
        }
    }
}

fn metric_alerts(metrics: &RiskMetrics, limits: &RiskLimits, alerts: &mut Vec<RiskAlert>) {
    let checks = [
        (
            AlertType::Var95Limit,
            Severity::Critical,
            "95% VaR",
            metrics.var95,
            limits.var95_limit,
        ),
        (
            AlertType::Var99Limit,
            Severity::Critical,
            "99% VaR",
            metrics.var99,
            limits.var99_limit,
        ),
        (
            AlertType::VolatilityLimit,
            Severity::High,
            "Volatility",
            metrics.volatility,
            limits.max_volatility,
        ),
        (
            AlertType::DrawdownLimit,
            Severity::High,
            "Max drawdown",
            metrics.max_drawdown,
            limits.max_drawdown,
        ),
    ];
    for (alert_type, severity, label, value, threshold) in checks {
        if value > threshold {
            alerts.push(RiskAlert::new(
                alert_type,
                severity,
                format!(
                    "{label} {:.2}% exceeds limit of {:.2}%",
                    value * 100.0,
                    threshold * 100.0
                ),
                value,
                threshold,
            ));
        }
    }
}

fn correlation_alerts(
    weights: &WeightMap,
    matrix: &ReturnMatrix,
    limits: &RiskLimits,
    alerts: &mut Vec<RiskAlert>,
) {
    let held: Vec<(&String, &[f64])> = weights
        .iter()
        .filter(|(_, w)| **w > 0.0)
        .filter_map(|(asset, _)| matrix.get(asset).map(|s| (asset, s)))
        .collect();

    for (i, (first, x)) in held.iter().enumerate() {
        for (second, y) in held.iter().skip(i + 1) {
            let rho = stats::correlation(x, y);
            if rho > limits.max_correlation {
                alerts.push(
                    RiskAlert::new(
                        AlertType::CorrelationLimit,
                        Severity::Medium,
                        format!(
                            "Correlation between {first} and {second} is {rho:.2}, above {:.2}",
                            limits.max_correlation
                        ),
                        rho,
                        limits.max_correlation,
                    )
                    .for_pair(first, second),
                );
            }
        }
    }
}

fn risk_reward_alert(metrics: &RiskMetrics, limits: &RiskLimits, alerts: &mut Vec<RiskAlert>) {
    if metrics.volatility < EPSILON {
        return;
    }
    let ratio = metrics.annualized_return / metrics.volatility;
    if ratio < limits.min_risk_reward_ratio {
        alerts.push(RiskAlert::new(
            AlertType::RiskReward,
            Severity::Low,
            format!(
                "Risk/reward ratio {ratio:.2} below minimum {:.2}",
                limits.min_risk_reward_ratio
            ),
            ratio,
            limits.min_risk_reward_ratio,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{matrix, normal_returns, weights};
    use crate::types::ReturnFrequency;

    fn loose_limits() -> RiskLimits {
        RiskLimits {
            max_position_size: 1.0,
            max_sector_exposure: 1.0,
            max_correlation: 1.0,
            var95_limit: 10.0,
            var99_limit: 10.0,
            max_volatility: 10.0,
            max_drawdown: 1.0,
            min_risk_reward_ratio: 0.0,
        }
    }

    fn settings() -> MetricsSettings {
        MetricsSettings {
            frequency: ReturnFrequency::Daily,
            risk_free_rate: 0.0,
        }
    }

    fn two_asset_input(wa: f64, wb: f64) -> LimitCheckInput {
        LimitCheckInput {
            weights: weights(&[("A", wa), ("B", wb)]),
            return_matrix: matrix(&[
                ("A", normal_returns(120, 0.0005, 0.01, 1)),
                ("B", normal_returns(120, 0.0003, 0.008, 2)),
            ]),
            portfolio_returns: None,
            sectors: SectorMap::new(),
            allow_partial: false,
        }
    }

    #[test]
    fn test_single_oversized_position_raises_one_alert() {
        let limits = RiskLimits {
            max_position_size: 0.5,
            ..loose_limits()
        };
        let alerts = check_limits(&two_asset_input(0.6, 0.4), &limits, &settings()).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::PositionLimit);
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[0].asset.as_deref(), Some("A"));
        assert_eq!(alerts[0].current_value, 0.6);
        assert_eq!(alerts[0].threshold, 0.5);
    }

    #[test]
    fn test_invalid_weights_rejected_before_checks() {
        let err = check_limits(&two_asset_input(0.6, 0.3), &loose_limits(), &settings());
        assert!(matches!(err, Err(RiskEngineError::InvalidWeightMap(_))));
    }

    #[test]
    fn test_unmapped_assets_grouped_unclassified() {
        let mut input = two_asset_input(0.6, 0.4);
        input.sectors.insert("A".into(), "tech".into());
        let limits = RiskLimits {
            max_sector_exposure: 0.5,
            ..loose_limits()
        };
        let alerts = check_limits(&input, &limits, &settings()).unwrap();
        let sectors: Vec<_> = alerts.iter().filter_map(|a| a.sector.clone()).collect();
        assert_eq!(sectors, vec!["tech".to_string()]);

        let exposure = sector_exposures(&input.weights, &input.sectors);
        assert!((exposure[UNCLASSIFIED_SECTOR] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_checks_do_not_short_circuit() {
        let limits = RiskLimits {
            max_position_size: 0.5,
            max_sector_exposure: 0.5,
            var95_limit: 1e-6,
            var99_limit: 1e-6,
            max_volatility: 1e-6,
            ..loose_limits()
        };
        let alerts = check_limits(&two_asset_input(0.6, 0.4), &limits, &settings()).unwrap();
        let types: Vec<AlertType> = alerts.iter().map(|a| a.alert_type).collect();
        assert_eq!(
            types,
            vec![
                AlertType::PositionLimit,
                AlertType::SectorLimit,
                AlertType::Var95Limit,
                AlertType::Var99Limit,
                AlertType::VolatilityLimit,
            ]
        );
        assert!(alerts
            .iter()
            .filter(|a| a.alert_type == AlertType::Var95Limit)
            .all(|a| a.severity == Severity::Critical));
    }

    #[test]
    fn test_correlated_pair_reported_once() {
        let base = normal_returns(120, 0.0004, 0.01, 5);
        let twin: Vec<f64> = base.iter().map(|r| r * 0.9 + 0.0001).collect();
        let input = LimitCheckInput {
            weights: weights(&[("A", 0.5), ("B", 0.5)]),
            return_matrix: matrix(&[("A", base), ("B", twin)]),
            portfolio_returns: None,
            sectors: SectorMap::new(),
            allow_partial: false,
        };
        let limits = RiskLimits {
            max_correlation: 0.7,
            ..loose_limits()
        };
        let alerts = check_limits(&input, &limits, &settings()).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::CorrelationLimit);
        assert_eq!(alerts[0].asset.as_deref(), Some("A"));
        assert_eq!(alerts[0].related_asset.as_deref(), Some("B"));
    }

    #[test]
    fn test_low_risk_reward_is_low_severity() {
        let limits = RiskLimits {
            min_risk_reward_ratio: 100.0,
            ..loose_limits()
        };
        let alerts = check_limits(&two_asset_input(0.5, 0.5), &limits, &settings()).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::RiskReward);
        assert_eq!(alerts[0].severity, Severity::Low);
    }

    #[test]
    fn test_supplied_portfolio_series_is_used() {
        let mut input = two_asset_input(0.5, 0.5);
        // a series with a deep drawdown that the derived one lacks
        let mut series = vec![0.001; 60];
        series[10] = -0.5;
        input.portfolio_returns = Some(series);
        let limits = RiskLimits {
            max_drawdown: 0.2,
            ..loose_limits()
        };
        let alerts = check_limits(&input, &limits, &settings()).unwrap();
        assert!(alerts
            .iter()
            .any(|a| a.alert_type == AlertType::DrawdownLimit));
    }

    #[test]
    fn test_weight_for_unknown_asset_rejected() {
        let mut input = two_asset_input(0.5, 0.5);
        input.weights = weights(&[("A", 0.5), ("Z", 0.5)]);
        let err = check_limits(&input, &loose_limits(), &settings());
        assert!(matches!(err, Err(RiskEngineError::InvalidWeightMap(_))));
    }
}
