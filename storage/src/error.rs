use newsloom_core::error::{Classify, ErrorClass};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("row already exists: {0}")]
    UniqueViolation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("claim lease expired before commit")]
    LeaseExpired,
    #[error("database connection error: {0}")]
    Connection(sqlx::Error),
    #[error("database query error: {0}")]
    Query(sqlx::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match &err {
            sqlx::Error::Database(db_err) if db_err.kind() == ErrorKind::UniqueViolation => {
                StorageError::UniqueViolation(db_err.message().to_string())
            }
            sqlx::Error::RowNotFound => StorageError::NotFound("row not found".to_string()),
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StorageError::Connection(err)
            }
            _ => StorageError::Query(err),
        }
    }
}

impl Classify for StorageError {
    fn class(&self) -> ErrorClass {
        match self {
            StorageError::UniqueViolation(_) => ErrorClass::UniqueViolation,
            StorageError::NotFound(_) => ErrorClass::PermanentIo,
            StorageError::DimensionMismatch { .. } => ErrorClass::DimensionMismatch,
            StorageError::LeaseExpired => ErrorClass::LeaseExpired,
            StorageError::Connection(_) => ErrorClass::TransientIo,
            StorageError::Query(_) => ErrorClass::PermanentIo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_classifies_as_dimension_mismatch() {
        let err = StorageError::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(err.class(), ErrorClass::DimensionMismatch);
    }

    #[test]
    fn unique_violation_is_not_fatal() {
        let err = StorageError::UniqueViolation("raw.url_hash".to_string());
        assert!(!err.class().is_fatal());
    }
}
