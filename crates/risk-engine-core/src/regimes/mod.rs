pub mod detector;
pub mod recovery;

pub use detector::{
    detect_regime_changes, detect_regimes, rolling_volatility, RegimeChange, RegimeDetection,
    RegimeSettings, RegimeType,
};
pub use recovery::{analyze_recovery, RecoveryAnalysis, RecoveryMetrics, RegimeRecovery};
