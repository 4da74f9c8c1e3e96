//! Error types module
//!
//! All failures in the mutation pipeline are classified here. `StoreError`
//! carries the store-level classification that drives the retry policy:
//! only `SerializationConflict` is ever retried, everything else aborts the
//! attempt immediately.
//!
//! The `From<sqlx::Error>` classifier is gated behind the `sqlx` feature.
//! With `default-features = false` the store implementation must map its
//! backend errors onto `StoreError` itself.

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Classified store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store aborted the transaction to preserve SERIALIZABLE ordering.
    /// Recoverable by retrying the whole attempt with a fresh transaction.
    #[error("serialization conflict")]
    SerializationConflict,

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The store could not be reached or could not start a transaction.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_serialization_conflict(&self) -> bool {
        matches!(self, StoreError::SerializationConflict)
    }
}

/// Postgres SQLSTATE classification.
///
/// 40001 (serialization_failure) and 40P01 (deadlock_detected) are the two
/// conditions Postgres raises when a SERIALIZABLE transaction loses; both
/// are safe to retry. Class 23 is constraint violations.
#[cfg(feature = "sqlx")]
impl From<SqlxError> for StoreError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::Database(db) => match db.code().as_deref() {
                Some("40001") | Some("40P01") => StoreError::SerializationConflict,
                Some(code) if code.starts_with("23") => {
                    StoreError::ConstraintViolation(db.message().to_string())
                }
                _ => StoreError::Backend(err.to_string()),
            },
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    /// A required (transaction-coupled) peer broadcast failed. The attempt
    /// must roll back: structural changes reach all peers or do not happen
    /// locally either.
    #[error("required federation broadcast failed: {0}")]
    FederationRequired(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The bounded conflict-retry loop gave up.
    #[error("{label}: gave up after {attempts} serialization conflicts")]
    RetriesExhausted { label: String, attempts: u32 },
}

impl AppError {
    /// True when the error should re-enter the conflict-retry loop.
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, AppError::Store(e) if e.is_serialization_conflict())
    }

    /// Error type name for logging and response categorisation.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Store(StoreError::SerializationConflict) => "SerializationConflict",
            AppError::Store(StoreError::ConstraintViolation(_)) => "ConstraintViolation",
            AppError::Store(StoreError::Unavailable(_)) => "StoreUnavailable",
            AppError::Store(StoreError::Backend(_)) => "StoreError",
            AppError::Filesystem(_) => "FilesystemError",
            AppError::FederationRequired(_) => "PeerBroadcastRequiredFailure",
            AppError::NotFound(_) => "NotFound",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::RetriesExhausted { .. } => "RetriesExhausted",
        }
    }
}
