pub mod calculator;

pub use calculator::{
    calculate_risk_metrics, compute_risk_metrics, MetricsSettings, RiskMetrics, RiskMetricsInput,
};
