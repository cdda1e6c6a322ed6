// Error taxonomy for session store adapters.
//
// "Not found" and "zero rows affected" are ordinary outcomes and never appear
// here. Everything that does appear originates in the underlying store and
// carries the store's own error as its source.

use std::error::Error as StdError;

/// Boxed underlying cause, as produced by a database driver.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure of a single adapter operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store rejected a write because of a uniqueness or foreign-key rule.
    #[error("constraint violation: {source}")]
    ConstraintViolation {
        #[source]
        source: BoxError,
    },

    /// Any other store failure: connectivity, timeout, malformed statement,
    /// or a row the adapter could not decode.
    #[error("storage failure: {source}")]
    StorageFailure {
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    pub fn constraint(source: impl Into<BoxError>) -> Self {
        Self::ConstraintViolation {
            source: source.into(),
        }
    }

    pub fn storage(source: impl Into<BoxError>) -> Self {
        Self::StorageFailure {
            source: source.into(),
        }
    }

    /// Whether this is a uniqueness / referential-integrity rejection.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}

/// Result type for adapter operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Construction-time configuration error (bad table descriptors, bad
/// environment values). Never produced by an adapter operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("table name must not be empty")]
    EmptyTableName,

    #[error("column name for `{field}` in table `{table}` must not be empty")]
    EmptyColumn { table: String, field: &'static str },

    #[error("column `{column}` is declared more than once in table `{table}`")]
    DuplicateColumn { table: String, column: String },

    #[error("session table and user table must be distinct, both are `{0}`")]
    SameTable(String),

    #[error("Configuration error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("UNIQUE constraint failed: session.id")]
    struct FakeDriverError;

    #[test]
    fn constraint_keeps_source() {
        let err = StoreError::constraint(FakeDriverError);
        assert!(err.is_constraint_violation());
        assert_eq!(
            err.to_string(),
            "constraint violation: UNIQUE constraint failed: session.id"
        );
        let source = err.source().expect("source attached");
        assert!(source.downcast_ref::<FakeDriverError>().is_some());
    }

    #[test]
    fn storage_from_message() {
        let err = StoreError::storage("connection reset");
        assert!(!err.is_constraint_violation());
        assert_eq!(err.to_string(), "storage failure: connection reset");
    }

    #[test]
    fn config_error_messages() {
        let err = ConfigError::DuplicateColumn {
            table: "session".into(),
            column: "id".into(),
        };
        assert_eq!(
            err.to_string(),
            "column `id` is declared more than once in table `session`"
        );
    }
}
