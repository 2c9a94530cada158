//! Engine error model.

use thiserror::Error;

/// Result type used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error.
///
/// Keep this focused on deterministic business failures (validation, scope,
/// conflicts). Thin or absent history is **not** an error: predictors and
/// forecasters report it as a low-confidence result instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A parameter failed validation (malformed or missing input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist or belongs to another tenant.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A state conflict (already-matched transaction, lost concurrent race).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Manual match amount incompatible with the invoice balance.
    #[error(
        "transaction amount {transaction_amount} incompatible with outstanding {outstanding} (tolerance {tolerance})"
    )]
    AmountMismatch {
        transaction_amount: i64,
        outstanding: i64,
        tolerance: i64,
    },

    /// The external bank adapter failed; already-ingested rows are kept.
    #[error("external adapter failed: {0}")]
    ExternalAdapter(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str) -> Self {
        Self::NotFound(kind)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn external_adapter(msg: impl Into<String>) -> Self {
        Self::ExternalAdapter(msg.into())
    }

    /// Whether the caller should retry later rather than fix its input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::ExternalAdapter(_))
    }
}
