//! Engine configuration.
//!
//! Loaded once at startup (JSON here, YAML through the CLI loader) and
//! read-only afterwards. Every section defaults, so a config file only
//! needs the values it overrides.

use serde::{Deserialize, Serialize};

use crate::error::RiskEngineError;
use crate::metrics::MetricsSettings;
use crate::types::{Rate, ReturnFrequency};
use crate::RiskEngineResult;

#[cfg(feature = "optimization")]
use crate::optimization::OptimizerSettings;
#[cfg(feature = "regimes")]
use crate::regimes::RegimeSettings;
#[cfg(feature = "stress")]
use crate::stress::StressSettings;

/// Portfolio risk limits checked by the limit checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Largest weight any single asset may carry.
    pub max_position_size: f64,
    /// Largest aggregate weight of one sector.
    pub max_sector_exposure: f64,
    /// Largest pairwise correlation between two held assets.
    pub max_correlation: f64,
    /// Per-period 95% VaR limit (loss magnitude).
    pub var95_limit: f64,
    /// Per-period 99% VaR limit (loss magnitude).
    pub var99_limit: f64,
    /// Annualised volatility limit.
    pub max_volatility: f64,
    /// Maximum drawdown limit.
    pub max_drawdown: f64,
    /// Minimum annualised return per unit of annualised volatility.
    pub min_risk_reward_ratio: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskLimits {
            max_position_size: 0.10,
            max_sector_exposure: 0.30,
            max_correlation: 0.70,
            var95_limit: 0.02,
            var99_limit: 0.03,
            max_volatility: 0.25,
            max_drawdown: 0.15,
            min_risk_reward_ratio: 2.0,
        }
    }
}

impl RiskLimits {
    pub fn validate(&self) -> RiskEngineResult<()> {
        let fractions = [
            ("max_position_size", self.max_position_size),
            ("max_sector_exposure", self.max_sector_exposure),
            ("max_correlation", self.max_correlation),
            ("max_drawdown", self.max_drawdown),
        ];
        for (name, value) in fractions {
            if !(value > 0.0 && value <= 1.0) {
                return Err(RiskEngineError::ConfigError(format!(
                    "limits.{name} must be in (0, 1], got {value}"
                )));
            }
        }
        let positives = [
            ("var95_limit", self.var95_limit),
            ("var99_limit", self.var99_limit),
            ("max_volatility", self.max_volatility),
        ];
        for (name, value) in positives {
            if !(value.is_finite() && value > 0.0) {
                return Err(RiskEngineError::ConfigError(format!(
                    "limits.{name} must be positive, got {value}"
                )));
            }
        }
        if !(self.min_risk_reward_ratio.is_finite() && self.min_risk_reward_ratio >= 0.0) {
            return Err(RiskEngineError::ConfigError(format!(
                "limits.min_risk_reward_ratio must be non-negative, got {}",
                self.min_risk_reward_ratio
            )));
        }
        Ok(())
    }
}

/// Process-wide engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: RiskLimits,
    /// Observation frequency of every series handed to the engine.
    pub frequency: ReturnFrequency,
    /// Annual risk-free rate.
    pub risk_free_rate: Rate,
    #[cfg(feature = "optimization")]
    pub optimizer: OptimizerSettings,
    #[cfg(feature = "stress")]
    pub stress: StressSettings,
    #[cfg(feature = "regimes")]
    pub regimes: RegimeSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            limits: RiskLimits::default(),
            frequency: ReturnFrequency::Daily,
            risk_free_rate: 0.02,
            #[cfg(feature = "optimization")]
            optimizer: OptimizerSettings::default(),
            #[cfg(feature = "stress")]
            stress: StressSettings::default(),
            #[cfg(feature = "regimes")]
            regimes: RegimeSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(json: &str) -> RiskEngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| RiskEngineError::ConfigError(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RiskEngineResult<()> {
        self.limits.validate()?;
        if !self.risk_free_rate.is_finite() || self.risk_free_rate <= -1.0 {
            return Err(RiskEngineError::ConfigError(format!(
                "risk_free_rate must be finite and above -1, got {}",
                self.risk_free_rate
            )));
        }
        #[cfg(feature = "optimization")]
        self.optimizer.validate()?;
        #[cfg(feature = "stress")]
        self.stress.validate()?;
        #[cfg(feature = "regimes")]
        self.regimes
            .validate()
            .map_err(|e| RiskEngineError::ConfigError(format!("regimes: {e}")))?;
        Ok(())
    }

    pub fn metrics_settings(&self) -> MetricsSettings {
        MetricsSettings {
            frequency: self.frequency,
            risk_free_rate: self.risk_free_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_overrides_only_given_fields() {
        let config =
            EngineConfig::from_json_str(r#"{"limits": {"max_position_size": 0.5}}"#).unwrap();
        assert_eq!(config.limits.max_position_size, 0.5);
        assert_eq!(
            config.limits.max_sector_exposure,
            RiskLimits::default().max_sector_exposure
        );
        assert_eq!(config.frequency, ReturnFrequency::Daily);
    }

    #[test]
    fn test_out_of_range_limit_rejected() {
        let err = EngineConfig::from_json_str(r#"{"limits": {"max_position_size": 1.5}}"#);
        assert!(matches!(err, Err(RiskEngineError::ConfigError(_))));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = EngineConfig::from_json_str("{ not json");
        assert!(matches!(err, Err(RiskEngineError::ConfigError(_))));
    }

    #[test]
    fn test_frequency_parses_snake_case() {
        let config = EngineConfig::from_json_str(r#"{"frequency": "monthly"}"#).unwrap();
        assert_eq!(config.frequency, ReturnFrequency::Monthly);
    }
}
