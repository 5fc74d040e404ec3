pub mod alerts;
pub mod checker;

pub use alerts::{AlertType, RiskAlert, Severity};
pub use checker::{check_limits, check_limits_against, sector_exposures, LimitCheckInput};
