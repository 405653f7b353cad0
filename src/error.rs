#![forbid(unsafe_code)]

//! Error taxonomy shared by the schema and query engines.
//!
//! Every fallible operation in this crate is a pure computation, so errors
//! are always synchronous and local. Callers distinguish their own mistakes
//! (`BadRequest`) from storage-layer lookup misses (`NotFound`) and
//! unexpected internal failures (`Generic`).

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DossierError>;

/// Errors surfaced by the query generators and the schema engines.
///
/// `BadRequest` messages for illegal schema changes and invalid migrations
/// are part of the public contract; consumers substring-match on them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DossierError {
    /// Caller error: bad query, illegal schema change, invalid migration,
    /// malformed cursor.
    #[error("{0}")]
    BadRequest(String),
    /// Entity or version lookup miss, surfaced by the storage layer.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Generic(String),
}

impl DossierError {
    /// Builds a [`DossierError::BadRequest`] from any message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        DossierError::BadRequest(message.into())
    }

    /// Returns true when the error is a caller error.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, DossierError::BadRequest(_))
    }
}
