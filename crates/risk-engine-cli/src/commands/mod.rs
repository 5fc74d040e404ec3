pub mod config;
pub mod metrics;
pub mod optimization;
pub mod regimes;
pub mod report;
pub mod stress;
