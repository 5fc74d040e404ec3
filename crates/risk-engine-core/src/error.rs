use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskEngineError {
    #[error("Insufficient data: {context} requires at least {required} observations, got {actual}")]
    InsufficientData {
        context: String,
        required: usize,
        actual: usize,
    },

    #[error("Invalid weight map: {0}")]
    InvalidWeightMap(String),

    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Infeasible constraint: {0}")]
    InfeasibleConstraint(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl RiskEngineError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RiskEngineError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for RiskEngineError {
    fn from(e: serde_json::Error) -> Self {
        RiskEngineError::SerializationError(e.to_string())
    }
}
