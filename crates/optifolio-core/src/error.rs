use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Insufficient data for {asset}: {reason}")]
    InsufficientData { asset: String, reason: String },

    #[error("Non-positive price for {asset} at observation {index}: {price}")]
    NonPositivePrice {
        asset: String,
        index: usize,
        price: f64,
    },

    #[error("Invalid budget: {budget} (must be between 0 and {num_assets})")]
    InvalidBudget { budget: i64, num_assets: usize },

    #[error("Optimization failed in {solver} solver: {reason}")]
    OptimizationFailed { solver: String, reason: String },

    #[error("Covariance of [{}] is not positive definite (pivot {pivot})", .assets.join(", "))]
    NonPositiveDefiniteCovariance { assets: Vec<String>, pivot: f64 },

    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl EngineError {
    /// Stable name of the failure kind, reported alongside the message at the
    /// request boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InsufficientData { .. } => "InsufficientDataError",
            EngineError::NonPositivePrice { .. } => "NonPositivePriceError",
            EngineError::InvalidBudget { .. } => "InvalidBudgetError",
            EngineError::OptimizationFailed { .. } => "OptimizationFailedError",
            EngineError::NonPositiveDefiniteCovariance { .. } => {
                "NonPositiveDefiniteCovarianceError"
            }
            EngineError::InvalidInput { .. } => "InvalidInputError",
            EngineError::SerializationError(_) => "SerializationError",
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::SerializationError(e.to_string())
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(e: serde_yaml::Error) -> Self {
        EngineError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_taxonomy() {
        let err = EngineError::InvalidBudget {
            budget: 5,
            num_assets: 3,
        };
        assert_eq!(err.kind(), "InvalidBudgetError");

        let err = EngineError::NonPositiveDefiniteCovariance {
            assets: vec!["a".into(), "b".into()],
            pivot: -1e-12,
        };
        assert_eq!(err.kind(), "NonPositiveDefiniteCovarianceError");
    }

    #[test]
    fn test_message_carries_context() {
        let err = EngineError::NonPositivePrice {
            asset: "bitcoin".into(),
            index: 7,
            price: 0.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("bitcoin"), "msg={msg}");
        assert!(msg.contains('7'), "msg={msg}");

        let err = EngineError::NonPositiveDefiniteCovariance {
            assets: vec!["a".into(), "b".into()],
            pivot: 0.0,
        };
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: EngineError = parse.unwrap_err().into();
        assert_eq!(err.kind(), "SerializationError");
    }
}
