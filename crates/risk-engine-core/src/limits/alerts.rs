use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which limit a [`RiskAlert`] was raised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    PositionLimit,
    SectorLimit,
    Var95Limit,
    Var99Limit,
    VolatilityLimit,
    DrawdownLimit,
    CorrelationLimit,
    RiskReward,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertType::PositionLimit => "position_limit",
            AlertType::SectorLimit => "sector_limit",
            AlertType::Var95Limit => "var95_limit",
            AlertType::Var99Limit => "var99_limit",
            AlertType::VolatilityLimit => "volatility_limit",
            AlertType::DrawdownLimit => "drawdown_limit",
            AlertType::CorrelationLimit => "correlation_limit",
            AlertType::RiskReward => "risk_reward",
        };
        f.write_str(label)
    }
}

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A single limit breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    /// Second asset of a correlated pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_asset: Option<String>,
    pub current_value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
}

impl RiskAlert {
    pub(crate) fn new(
        alert_type: AlertType,
        severity: Severity,
        message: String,
        current_value: f64,
        threshold: f64,
    ) -> Self {
        RiskAlert {
            alert_type,
            severity,
            message,
            asset: None,
            sector: None,
            related_asset: None,
            current_value,
            threshold,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn for_asset(mut self, asset: &str) -> Self {
        self.asset = Some(asset.to_string());
        self
    }

    pub(crate) fn for_sector(mut self, sector: &str) -> Self {
        self.sector = Some(sector.to_string());
        self
    }

    pub(crate) fn for_pair(mut self, first: &str, second: &str) -> Self {
        self.asset = Some(first.to_string());
        self.related_asset = Some(second.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
        assert_eq!(
            [Severity::Medium, Severity::Critical, Severity::Low]
                .into_iter()
                .max(),
            Some(Severity::Critical)
        );
    }

    #[test]
    fn test_alert_serialises_snake_case() {
        let alert = RiskAlert::new(
            AlertType::PositionLimit,
            Severity::High,
            "too big".into(),
            0.6,
            0.5,
        )
        .for_asset("A");
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["alert_type"], "position_limit");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["asset"], "A");
        assert!(json.get("sector").is_none());
    }
}
