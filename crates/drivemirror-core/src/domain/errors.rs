//! Domain error types
//!
//! Validation failures raised when constructing domain newtypes and entities.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid UUID-backed identifier
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Invalid provider-issued node identifier
    #[error("Invalid external ID: {0}")]
    InvalidExternalId(String),

    /// Invalid change-feed page token
    #[error("Invalid page token: {0}")]
    InvalidPageToken(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
