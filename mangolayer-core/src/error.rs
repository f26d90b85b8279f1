//! Error types and result types for service and store operations.
//!
//! Every fallible operation in this crate returns [`ServiceResult<T>`]. The variants
//! map onto the failure classes a resource service reports to its callers: a bad
//! configuration at construction time, a query that resolved nothing, a write that
//! lost an optimistic-concurrency race, and a write the store rejected outright.

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when serving resource operations
/// against a document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service could not be constructed (for example, no store handle was provided).
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The id or query did not resolve to any document.
    #[error("Not found: {0}")]
    NotFound(String),
    /// A write in update, patch or remove was rejected by the store,
    /// typically because the document's revision changed underneath it.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// A write in create was rejected by the store, or the request itself is malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// Serialization/deserialization error when converting to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl ServiceError {
    /// Returns `true` if this error is [`ServiceError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }

    /// Returns `true` if this error is [`ServiceError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }
}

/// A specialized `Result` type for service and store operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<SerdeJsonError> for ServiceError {
    fn from(err: SerdeJsonError) -> Self {
        ServiceError::Serialization(err.to_string())
    }
}
