use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::error::RiskEngineError;
use crate::stats::{self, EPSILON};
use crate::types::{validate_returns, with_metadata, ComputationOutput, ReturnSeries};
use crate::{RiskEngineResult, MIN_OBSERVATIONS};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeSettings {
    /// Trailing window for the rolling standard deviation.
    pub window_size: usize,
    /// Period-over-period relative rise in rolling volatility that flags a
    /// period (2.0 = +200%).
    pub volatility_change_threshold: f64,
}

impl Default for RegimeSettings {
    fn default() -> Self {
        RegimeSettings {
            window_size: 63,
            volatility_change_threshold: 2.0,
        }
    }
}

impl RegimeSettings {
    pub fn validate(&self) -> RiskEngineResult<()> {
        if self.window_size < 2 {
            return Err(RiskEngineError::invalid(
                "window_size",
                format!("Window must be at least 2, got {}", self.window_size),
            ));
        }
        if !self.volatility_change_threshold.is_finite() || self.volatility_change_threshold < 0.0 {
            return Err(RiskEngineError::invalid(
                "volatility_change_threshold",
                format!(
                    "Threshold must be non-negative, got {}",
                    self.volatility_change_threshold
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeType {
    HighVolatility,
}

impl fmt::Display for RegimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegimeType::HighVolatility => write!(f, "high_volatility"),
        }
    }
}

/// A half-open interval `[start, end)` of elevated volatility.
///
/// `end_index` is the first period whose flag cleared; an interval still
/// open when the series ends closes at the last period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeChange {
    pub start_index: usize,
    pub end_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub regime_type: RegimeType,
    /// Peak per-period rolling volatility inside the interval.
    pub severity: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeDetection {
    pub regimes: Vec<RegimeChange>,
    pub window_size: usize,
    /// Per-period rolling volatility; `None` until the window has filled.
    pub rolling_volatility: Vec<Option<f64>>,
}

/// Detect high-volatility regimes in a return series.
pub fn detect_regimes(
    series: &ReturnSeries,
    settings: &RegimeSettings,
) -> RiskEngineResult<ComputationOutput<RegimeDetection>> {
    let start = Instant::now();
    series.validate()?;
    let detection = detect_regime_changes(&series.values, series.dates.as_deref(), settings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rolling-Volatility Regime Detection",
        &serde_json::json!({
            "observations": series.len(),
            "window_size": settings.window_size,
            "volatility_change_threshold": settings.volatility_change_threshold,
            "regime_end": "first unflagged period",
        }),
        Vec::new(),
        elapsed,
        detection,
    ))
}

/// Detection over raw values with an optional aligned date index.
pub fn detect_regime_changes(
    returns: &[f64],
    dates: Option<&[NaiveDate]>,
    settings: &RegimeSettings,
) -> RiskEngineResult<RegimeDetection> {
    settings.validate()?;
    let n = returns.len();
    let required = MIN_OBSERVATIONS.max(settings.window_size + 1);
    if n < required {
        return Err(RiskEngineError::InsufficientData {
            context: "regime detection".into(),
            required,
            actual: n,
        });
    }
    validate_returns("returns", returns)?;
    if let Some(d) = dates {
        if d.len() != n {
            return Err(RiskEngineError::invalid(
                "dates",
                format!("Expected {} dates but got {}", n, d.len()),
            ));
        }
    }

    let window = settings.window_size;
    let rolling = rolling_volatility(returns, window);

    // period-over-period change of the rolling volatility
    let mut flagged = vec![false; n];
    let mut changes = vec![0.0; n];
    for t in window..n {
        if let (Some(prev), Some(cur)) = (rolling[t - 1], rolling[t]) {
            let change = if prev < EPSILON { 0.0 } else { (cur - prev) / prev };
            changes[t] = change;
            flagged[t] = change > settings.volatility_change_threshold;
        }
    }

    let mut regimes = Vec::new();
    let mut t = 0;
    while t < n {
        if !flagged[t] {
            t += 1;
            continue;
        }
        let start = t;
        while t < n && flagged[t] {
            t += 1;
        }
        let end = if t < n { t } else { n - 1 };
        // over the flagged run itself, so a run open at series end keeps its last period
        let severity = (start..t)
            .filter_map(|i| rolling[i])
            .fold(0.0, f64::max);
        regimes.push(RegimeChange {
            start_index: start,
            end_index: end,
            start_date: dates.map(|d| d[start]),
            end_date: dates.map(|d| d[end]),
            regime_type: RegimeType::HighVolatility,
            severity,
            description: format!(
                "Rolling volatility rose {:.0}% in one period, peaking at {:.4}",
                changes[start] * 100.0,
                severity
            ),
        });
    }

    tracing::info!(regimes = regimes.len(), observations = n, "regime detection complete");
    Ok(RegimeDetection {
        regimes,
        window_size: window,
        rolling_volatility: rolling,
    })
}

/// Sample standard deviation over each trailing window.
pub fn rolling_volatility(returns: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..returns.len())
        .map(|t| {
            if t + 1 < window {
                None
            } else {
                Some(stats::sample_std(&returns[t + 1 - window..=t]))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| if i % 2 == 0 { 0.001 } else { -0.001 })
            .collect()
    }

    fn short_window() -> RegimeSettings {
        RegimeSettings {
            window_size: 5,
            volatility_change_threshold: 2.0,
        }
    }

    #[test]
    fn test_flat_series_has_no_regimes() {
        let d = detect_regime_changes(&[0.0005; 100], None, &short_window()).unwrap();
        assert!(d.regimes.is_empty());
    }

    #[test]
    fn test_spike_opens_and_closes_regime() {
        let mut returns = quiet(80);
        returns[40] = -0.08;
        let d = detect_regime_changes(&returns, None, &short_window()).unwrap();
        assert_eq!(d.regimes.len(), 1);
        let r = &d.regimes[0];
        assert_eq!(r.start_index, 40);
        assert_eq!(r.end_index, 41);
        assert_eq!(r.regime_type, RegimeType::HighVolatility);
        assert_eq!(Some(r.severity), d.rolling_volatility[40]);
    }

    #[test]
    fn test_regime_open_at_end_closes_at_last_period() {
        let mut returns = quiet(60);
        returns[59] = 0.09;
        let d = detect_regime_changes(&returns, None, &short_window()).unwrap();
        assert_eq!(d.regimes.len(), 1);
        assert_eq!(d.regimes[0].start_index, 59);
        assert_eq!(d.regimes[0].end_index, 59);
    }

    #[test]
    fn test_open_regime_severity_includes_last_period() {
        let mut returns = quiet(60);
        returns[58] = 0.01;
        returns[59] = 0.2;
        let d = detect_regime_changes(&returns, None, &short_window()).unwrap();
        assert_eq!(d.regimes.len(), 1);
        let r = &d.regimes[0];
        assert_eq!(r.start_index, 58);
        assert_eq!(r.end_index, 59);
        assert_eq!(Some(r.severity), d.rolling_volatility[59]);
        assert!(r.severity > d.rolling_volatility[58].unwrap());
    }

    #[test]
    fn test_dates_carried_onto_regimes() {
        let mut returns = quiet(60);
        returns[30] = -0.07;
        let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..60)
            .map(|i| first + chrono::Duration::days(i))
            .collect();
        let series = ReturnSeries::with_dates(returns, dates.clone()).unwrap();
        let out = detect_regimes(&series, &short_window()).unwrap();
        let r = &out.result.regimes[0];
        assert_eq!(r.start_date, Some(dates[30]));
        assert_eq!(r.end_date, Some(dates[31]));
    }

    #[test]
    fn test_rolling_path_is_aligned() {
        let d = detect_regime_changes(&quiet(40), None, &short_window()).unwrap();
        assert_eq!(d.rolling_volatility.len(), 40);
        assert!(d.rolling_volatility[3].is_none());
        assert!(d.rolling_volatility[4].is_some());
    }

    #[test]
    fn test_history_must_exceed_window() {
        let err = detect_regime_changes(&quiet(63), None, &RegimeSettings::default());
        assert!(matches!(
            err,
            Err(RiskEngineError::InsufficientData {
                required: 64,
                actual: 63,
                ..
            })
        ));
        let err = detect_regime_changes(&quiet(29), None, &short_window());
        assert!(matches!(
            err,
            Err(RiskEngineError::InsufficientData { required: 30, .. })
        ));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let negative = RegimeSettings {
            window_size: 5,
            volatility_change_threshold: -1.0,
        };
        assert!(detect_regime_changes(&quiet(60), None, &negative).is_err());
        let tiny = RegimeSettings {
            window_size: 1,
            volatility_change_threshold: 2.0,
        };
        assert!(detect_regime_changes(&quiet(60), None, &tiny).is_err());
    }
}
