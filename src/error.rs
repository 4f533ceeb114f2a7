use crate::cache::CacheError;
use crate::database::DatabaseError;
use rust_decimal::Decimal;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Projection cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors (empty/over-limit selections, bad stakes, unknown selections)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Round missing or already past its close time
    #[error("Betting closed: {0}")]
    BettingClosed(String),

    /// Wallet cannot cover the order total
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Decimal, required: Decimal },

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Business logic errors
    #[error("Business logic error: {0}")]
    BusinessLogic(String),

    /// External service errors
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Storage failures roll back completely and are safe to retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Sqlx(_) | AppError::Cache(_)
        )
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Validation(_) => 400,
            AppError::BettingClosed(_) | AppError::BusinessLogic(_) => 409,
            AppError::InsufficientFunds { .. } => 402,
            AppError::Config(_) => 500,
            AppError::Database(_) | AppError::Sqlx(_) | AppError::Cache(_) => 500,
            AppError::ExternalService(_) => 502,
            _ => 500,
        }
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Wallet row could not cover a debit
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Decimal, required: Decimal },

    /// Row is not in a state that permits the requested transition
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::BusinessLogic(format!("Duplicate: {}", msg)),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::InvalidInput(msg) => AppError::Validation(msg),
            RepositoryError::InsufficientFunds { available, required } => {
                AppError::InsufficientFunds { available, required }
            }
            RepositoryError::InvalidState(msg) => AppError::BusinessLogic(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                // Check for common PostgreSQL error codes
                let code = db_err.code().map(|c| c.to_string());
                if code.as_deref() == Some("23505") {
                    // Unique violation
                    RepositoryError::Duplicate(db_err.message().to_string())
                } else if code.as_deref() == Some("23503") {
                    // Foreign key violation
                    RepositoryError::ConstraintViolation(db_err.message().to_string())
                } else if code.as_deref() == Some("23514") {
                    // Check constraint violation
                    RepositoryError::ConstraintViolation(db_err.message().to_string())
                } else {
                    RepositoryError::Query(err)
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_errors_map_to_taxonomy() {
        let err: AppError = RepositoryError::InsufficientFunds {
            available: Decimal::new(1000, 2),
            required: Decimal::new(1600, 2),
        }
        .into();
        assert!(matches!(err, AppError::InsufficientFunds { .. }));
        assert_eq!(err.status_code(), 402);

        let err: AppError = RepositoryError::InvalidState("order is paid".into()).into();
        assert!(matches!(err, AppError::BusinessLogic(_)));

        let err: AppError = RepositoryError::NotFound("order 7".into()).into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_storage_errors_are_retryable() {
        let err = AppError::Sqlx(SqlxError::PoolTimedOut);
        assert!(err.is_retryable());
        assert!(!AppError::Validation("empty".into()).is_retryable());
        assert_eq!(AppError::BettingClosed("round 1".into()).status_code(), 409);
    }
}
