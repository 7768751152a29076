//! Error taxonomy for the data-access and authentication layers.
//!
//! Every failure raised by a repository or by the authentication service is
//! one of these kinds. Storage errors are logged once, when they are
//! converted, and their driver text never reaches `Display`.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A uniqueness invariant (active email, active category name) was violated.
    #[error("{0}")]
    DuplicateKey(String),

    /// The entity does not exist or is inactive.
    #[error("{0}")]
    NotFound(String),

    /// An update carried none of the entity's updatable fields.
    #[error("No valid fields to update")]
    NoValidFields,

    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Account temporarily locked after too many failed login attempts")]
    Locked { until: Option<DateTime<Utc>> },

    /// A referenced category or author is missing or inactive.
    #[error("{0}")]
    ForeignKeyInvalid(String),

    #[error("A database error occurred")]
    Storage(#[source] sqlx::Error),

    /// A hashing or token collaborator failed.
    #[error("{0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{} not found", what))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if msg.contains("UNIQUE constraint failed") {
                    tracing::debug!("Unique constraint violation: {}", msg);
                    Error::DuplicateKey("A resource with this identifier already exists".to_string())
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    tracing::debug!("Foreign key violation: {}", msg);
                    Error::ForeignKeyInvalid("Referenced resource does not exist".to_string())
                } else {
                    tracing::error!("Database error: {}", err);
                    Error::Storage(err)
                }
            }
            _ => {
                tracing::error!("Database error: {}", err);
                Error::Storage(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = Error::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_storage_error_hides_driver_text() {
        let err = Error::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(err.to_string(), "A database error occurred");
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("Recipe");
        assert_eq!(err.to_string(), "Recipe not found");
    }
}
