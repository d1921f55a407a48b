//! Domain errors
//!
//! Every core operation reports one of these, the API layer turns them into responses

use std::collections::BTreeMap;

use thiserror::Error;

use crate::storage;

/// Field-level validation messages, keyed by the (camelCase) field name
pub type FieldErrors = BTreeMap<&'static str, String>;

/// Errors of the core operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input
    #[error("Validation error")]
    Validation(FieldErrors),

    /// Input is well-formed but can not be applied
    #[error("{0}")]
    BadRequest(&'static str),

    /// Missing, invalid or expired credentials
    ///
    /// The message is always generic, it never tells which check failed
    #[error("{0}")]
    Unauthenticated(&'static str),

    /// The role of the actor is insufficient
    #[error("{0}")]
    Forbidden(&'static str),

    /// Not found, or not visible to the actor
    #[error("{0}")]
    NotFound(&'static str),

    /// Duplicate unique key or concurrent modification
    #[error("{0}")]
    Conflict(&'static str),

    /// Storage failure
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// Anything unexpected
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Validation error for a single field
    pub fn field(field: &'static str, message: impl ToString) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field, message.to_string());

        Self::Validation(errors)
    }

    /// Wrap any unexpected error
    pub fn internal(err: impl ToString) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type for all core operations
pub type Result<T> = core::result::Result<T, Error>;
