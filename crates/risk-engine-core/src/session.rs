//! Caller-owned accumulation of alerts and stress results.
//!
//! The engine keeps no state between calls. A session is owned by one
//! caller and handed in by `&mut`; nothing is ever removed from it except
//! by an explicit call.

use serde::{Deserialize, Serialize};

use crate::limits::{RiskAlert, Severity};
use crate::types::EngineWarning;

#[cfg(feature = "stress")]
use crate::stress::StressTestResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskSession {
    alerts: Vec<RiskAlert>,
    warnings: Vec<EngineWarning>,
    #[cfg(feature = "stress")]
    stress_results: Vec<StressTestResult>,
}

impl RiskSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_alerts(&mut self, alerts: impl IntoIterator<Item = RiskAlert>) {
        self.alerts.extend(alerts);
    }

    pub fn alerts(&self) -> &[RiskAlert] {
        &self.alerts
    }

    pub fn alerts_at_or_above(&self, severity: Severity) -> impl Iterator<Item = &RiskAlert> {
        self.alerts.iter().filter(move |a| a.severity >= severity)
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.alerts.iter().map(|a| a.severity).max()
    }

    /// Remove and return every recorded alert.
    pub fn drain_alerts(&mut self) -> Vec<RiskAlert> {
        std::mem::take(&mut self.alerts)
    }

    pub fn record_warnings(&mut self, warnings: impl IntoIterator<Item = EngineWarning>) {
        self.warnings.extend(warnings);
    }

    pub fn warnings(&self) -> &[EngineWarning] {
        &self.warnings
    }

    /// Append stress results; reruns of a scenario are kept alongside earlier ones.
    #[cfg(feature = "stress")]
    pub fn record_stress_results(&mut self, results: impl IntoIterator<Item = StressTestResult>) {
        self.stress_results.extend(results);
    }

    /// Every recorded stress result, oldest first.
    #[cfg(feature = "stress")]
    pub fn stress_results(&self) -> &[StressTestResult] {
        &self.stress_results
    }

    /// Recorded results for one scenario name, oldest first.
    #[cfg(feature = "stress")]
    pub fn stress_results_for<'a>(
        &'a self,
        scenario: &'a str,
    ) -> impl Iterator<Item = &'a StressTestResult> + 'a {
        self.stress_results
            .iter()
            .filter(move |r| r.scenario_name == scenario)
    }
}
