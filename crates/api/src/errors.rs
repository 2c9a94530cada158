use serde::Serialize;

use finsight_core::EngineError;

/// Wire-level rendering of an engine failure.
///
/// `retryable` tells the caller whether replaying the same request later
/// can succeed without changing it.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

pub fn error_code(err: &EngineError) -> &'static str {
    match err {
        EngineError::Validation(_) => "validation_error",
        EngineError::NotFound(_) => "not_found",
        EngineError::Conflict(_) => "conflict",
        EngineError::AmountMismatch { .. } => "amount_mismatch",
        EngineError::ExternalAdapter(_) => "external_adapter_error",
    }
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        Self {
            code: error_code(err),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

impl From<EngineError> for ErrorResponse {
    fn from(err: EngineError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_and_adapter_failures_are_retryable() {
        let conflict = ErrorResponse::from(EngineError::conflict("transaction already matched"));
        assert_eq!(conflict.code, "conflict");
        assert!(conflict.retryable);

        let adapter = ErrorResponse::from(EngineError::external_adapter("bank timed out"));
        assert_eq!(adapter.code, "external_adapter_error");
        assert!(adapter.retryable);
    }

    #[test]
    fn caller_mistakes_are_not_retryable() {
        let validation = ErrorResponse::from(EngineError::validation("months must be positive"));
        assert_eq!(validation.code, "validation_error");
        assert!(!validation.retryable);

        let missing = ErrorResponse::from(EngineError::not_found("invoice"));
        assert_eq!(missing.code, "not_found");
        assert_eq!(missing.message, "invoice not found");
        assert!(!missing.retryable);

        let mismatch = ErrorResponse::from(EngineError::AmountMismatch {
            transaction_amount: 1500,
            outstanding: 1000,
            tolerance: 0,
        });
        assert_eq!(mismatch.code, "amount_mismatch");
        assert!(!mismatch.retryable);
    }
}
