pub mod config;
pub mod error;
pub mod limits;
pub mod metrics;
pub mod session;
pub mod stats;
pub mod types;

#[cfg(feature = "optimization")]
pub mod optimization;

#[cfg(feature = "stress")]
pub mod stress;

#[cfg(feature = "regimes")]
pub mod regimes;

#[cfg(feature = "full")]
pub mod engine;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{EngineConfig, RiskLimits};
pub use error::RiskEngineError;
pub use types::*;

/// Standard result type for all risk-engine operations
pub type RiskEngineResult<T> = Result<T, RiskEngineError>;

/// Minimum number of observations for any statistical estimate.
pub const MIN_OBSERVATIONS: usize = 30;
