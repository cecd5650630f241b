//! Record store errors

use thiserror::Error;

/// Errors raised by record and finding stores
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Conditional update matched no row in the expected state
    #[error("{entity} {id} is not in the expected state: {reason}")]
    Conflict {
        entity: &'static str,
        id: String,
        reason: String,
    },

    /// Stored value could not be decoded into a domain type
    #[error("Corrupt {entity} record {id}: {message}")]
    Corrupt {
        entity: &'static str,
        id: String,
        message: String,
    },

    /// Database operation failed
    #[error("Database error: {message}")]
    Database { message: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl ToString, reason: impl Into<String>) -> Self {
        StoreError::Conflict {
            entity,
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn database(message: impl ToString) -> Self {
        StoreError::Database {
            message: message.to_string(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Check if this error is a failed conditional update
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
