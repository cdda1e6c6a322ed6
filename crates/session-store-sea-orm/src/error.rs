// DbErr -> StoreError translation, and the error of `SeaOrmAdapter::connect`.

use sea_orm::{DbErr, SqlErr};

use session_store_core::{ConfigError, StoreError};

/// Failure to build a connected adapter.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("invalid table configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("database connection failed: {0}")]
    Database(#[from] DbErr),
}

/// Classify a Sea-ORM error. Uniqueness and foreign-key rejections become
/// constraint violations, everything else is a storage failure. The driver
/// error is kept as the source either way.
pub fn map_db_err(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_))
        | Some(SqlErr::ForeignKeyConstraintViolation(_)) => StoreError::constraint(err),
        _ => StoreError::storage(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_sql_errors_are_storage_failures() {
        let err = map_db_err(DbErr::Custom("connection reset".into()));
        assert!(!err.is_constraint_violation());
        assert!(err.to_string().contains("connection reset"));

        let err = map_db_err(DbErr::RecordNotUpdated);
        assert!(matches!(err, StoreError::StorageFailure { .. }));
    }

    #[test]
    fn connect_error_wraps_both_causes() {
        let err = ConnectError::from(ConfigError::SameTable("auth".into()));
        assert!(matches!(err, ConnectError::Config(ConfigError::SameTable(_))));
        assert!(err.to_string().starts_with("invalid table configuration"));

        let err = ConnectError::from(DbErr::Conn(sea_orm::RuntimeErr::Internal("refused".into())));
        assert!(matches!(err, ConnectError::Database(_)));
        assert!(err.to_string().contains("refused"));
    }
}
