use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::detector::{RegimeChange, RegimeType};
use crate::error::RiskEngineError;
use crate::stats;
use crate::types::validate_returns;
use crate::RiskEngineResult;

/// Loss and recovery for one regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeRecovery {
    pub regime_type: RegimeType,
    pub start_index: usize,
    pub end_index: usize,
    /// Wealth just before the regime (1.0 at the start of the series).
    pub pre_regime_value: f64,
    /// Wealth at the regime's end period.
    pub post_regime_value: f64,
    /// (pre - post) / pre; negative when the regime was a gain.
    pub loss_pct: f64,
    /// Highest wealth reached before the regime.
    pub pre_regime_peak: f64,
    /// Periods after `end_index` until wealth regains `pre_regime_peak`;
    /// `None` if the series ends first.
    pub recovery_time: Option<usize>,
}

/// Summary over all regimes of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryMetrics {
    pub regime_type: RegimeType,
    pub count: usize,
    pub mean_loss_pct: f64,
    pub max_loss_pct: f64,
    /// Mean over resolved regimes only
    pub mean_recovery_time: Option<f64>,
    pub unresolved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAnalysis {
    pub regimes: Vec<RegimeRecovery>,
    pub by_type: BTreeMap<RegimeType, RecoveryMetrics>,
}

/// Measure loss depth and recovery time of each regime on the original series.
pub fn analyze_recovery(
    returns: &[f64],
    regimes: &[RegimeChange],
) -> RiskEngineResult<RecoveryAnalysis> {
    validate_returns("returns", returns)?;
    let n = returns.len();
    let wealth = stats::wealth_curve(returns);

    let mut records = Vec::with_capacity(regimes.len());
    for regime in regimes {
        if regime.end_index >= n || regime.start_index > regime.end_index {
            return Err(RiskEngineError::invalid(
                "regimes",
                format!(
                    "Regime [{}, {}] does not fit a series of {} observations",
                    regime.start_index, regime.end_index, n
                ),
            ));
        }
        let start = regime.start_index;
        let end = regime.end_index;

        let pre = if start == 0 { 1.0 } else { wealth[start - 1] };
        let post = wealth[end];
        let peak = wealth[..start].iter().copied().fold(1.0, f64::max);
        let recovery_time = (end..n).find(|&t| wealth[t] >= peak).map(|t| t - end);

        records.push(RegimeRecovery {
            regime_type: regime.regime_type,
            start_index: start,
            end_index: end,
            pre_regime_value: pre,
            post_regime_value: post,
            loss_pct: (pre - post) / pre,
            pre_regime_peak: peak,
            recovery_time,
        });
    }

    let by_type = summarise(&records);
    tracing::debug!(regimes = records.len(), "recovery analysis complete");
    Ok(RecoveryAnalysis {
        regimes: records,
        by_type,
    })
}

fn summarise(records: &[RegimeRecovery]) -> BTreeMap<RegimeType, RecoveryMetrics> {
    let mut grouped: BTreeMap<RegimeType, Vec<&RegimeRecovery>> = BTreeMap::new();
    for r in records {
        grouped.entry(r.regime_type).or_default().push(r);
    }
    grouped
        .into_iter()
        .map(|(regime_type, group)| {
            let losses: Vec<f64> = group.iter().map(|r| r.loss_pct).collect();
            let resolved: Vec<f64> = group
                .iter()
                .filter_map(|r| r.recovery_time.map(|t| t as f64))
                .collect();
            let metrics = RecoveryMetrics {
                regime_type,
                count: group.len(),
                mean_loss_pct: stats::mean(&losses),
                max_loss_pct: losses.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                mean_recovery_time: if resolved.is_empty() {
                    None
                } else {
                    Some(stats::mean(&resolved))
                },
                unresolved: group.len() - resolved.len(),
            };
            (regime_type, metrics)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regime(start: usize, end: usize) -> RegimeChange {
        RegimeChange {
            start_index: start,
            end_index: end,
            start_date: None,
            end_date: None,
            regime_type: RegimeType::HighVolatility,
            severity: 0.05,
            description: String::new(),
        }
    }

    /// ten 1% gains, two 10% losses, then 5% gains
    fn crash_and_rebound() -> Vec<f64> {
        let mut r = vec![0.01; 10];
        r.extend([-0.10, -0.10]);
        r.extend(vec![0.05; 28]);
        r
    }

    #[test]
    fn test_loss_and_recovery_time() {
        let analysis = analyze_recovery(&crash_and_rebound(), &[regime(10, 12)]).unwrap();
        let rec = &analysis.regimes[0];
        assert!((rec.loss_pct - (1.0 - 0.81 * 1.05)).abs() < 1e-12);
        // 0.81 * 1.05^k >= 1 first at k = 5, i.e. index 16
        assert_eq!(rec.recovery_time, Some(4));
        assert!((rec.pre_regime_peak - 1.01f64.powi(10)).abs() < 1e-12);
    }

    #[test]
    fn test_unrecovered_regime() {
        let mut returns = vec![0.01; 10];
        returns.extend(vec![-0.02; 30]);
        let analysis = analyze_recovery(&returns, &[regime(10, 11)]).unwrap();
        assert_eq!(analysis.regimes[0].recovery_time, None);
        let summary = &analysis.by_type[&RegimeType::HighVolatility];
        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.mean_recovery_time, None);
    }

    #[test]
    fn test_regime_at_series_start_uses_unit_wealth() {
        let analysis = analyze_recovery(&crash_and_rebound(), &[regime(0, 1)]).unwrap();
        let rec = &analysis.regimes[0];
        assert_eq!(rec.pre_regime_value, 1.0);
        assert_eq!(rec.pre_regime_peak, 1.0);
        assert_eq!(rec.recovery_time, Some(0));
        assert!(rec.loss_pct < 0.0);
    }

    #[test]
    fn test_summary_over_multiple_regimes() {
        let analysis =
            analyze_recovery(&crash_and_rebound(), &[regime(0, 1), regime(10, 12)]).unwrap();
        let summary = &analysis.by_type[&RegimeType::HighVolatility];
        assert_eq!(summary.count, 2);
        assert_eq!(summary.unresolved, 0);
        assert_eq!(summary.mean_recovery_time, Some(2.0));
        assert!((summary.max_loss_pct - (1.0 - 0.81 * 1.05)).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_regime_rejected() {
        let err = analyze_recovery(&crash_and_rebound(), &[regime(35, 40)]);
        assert!(matches!(err, Err(RiskEngineError::InvalidInput { .. })));
    }

    #[test]
    fn test_no_regimes_gives_empty_summary() {
        let analysis = analyze_recovery(&crash_and_rebound(), &[]).unwrap();
        assert!(analysis.regimes.is_empty());
        assert!(analysis.by_type.is_empty());
    }
}
