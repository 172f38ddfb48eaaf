// Error taxonomy for the categorization pipeline
//
// Only CategorizationError ever reaches a caller. ClassifierError and
// CacheError are absorbed inside their components and turned into a
// fallback result or a cache miss.

use thiserror::Error;

/// Errors surfaced by the categorizer to its callers
#[derive(Error, Debug)]
pub enum CategorizationError {
    /// Malformed amount, currency, date or merchant in a single request/row
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced transaction does not exist
    #[error("Transaction not found: {0}")]
    NotFound(i64),

    /// Acting user does not own the referenced transaction
    #[error("User {user_id} is not allowed to modify transaction {transaction_id}")]
    Unauthorized { transaction_id: i64, user_id: i64 },

    /// Persistence failure on the transaction write path
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CategorizationError {
    pub fn validation(message: impl Into<String>) -> Self {
        CategorizationError::Validation(message.into())
    }
}

/// Relational store failures
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row in {table}: {detail}")]
    CorruptRow { table: &'static str, detail: String },

    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

/// Classifier oracle failures (never leave the classifier client)
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier timed out after {0}ms")]
    Timeout(u64),

    #[error("Classifier transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Classifier returned HTTP {0}")]
    Status(u16),

    #[error("Malformed classifier response: {0}")]
    Malformed(String),
}

/// Key-value store failures (never leave the cache)
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt cache value for {key}: {detail}")]
    Corrupt { key: String, detail: String },
}

/// Upstream failures while reading a batch input stream
///
/// These are structural problems with the whole stream, never per-row
/// failures; row failures are collected in the batch summary instead.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV input has no header row")]
    MissingHeader,

    #[error("CSV header is missing required column '{0}'")]
    MissingColumn(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_converts_into_categorization_error() {
        let err: CategorizationError = StorageError::LockPoisoned.into();
        assert!(matches!(err, CategorizationError::Storage(_)));
        assert_eq!(err.to_string(), "Database connection lock poisoned");
    }

    #[test]
    fn test_unauthorized_message_names_both_ids() {
        let err = CategorizationError::Unauthorized {
            transaction_id: 42,
            user_id: 7,
        };
        assert_eq!(
            err.to_string(),
            "User 7 is not allowed to modify transaction 42"
        );
    }
}
