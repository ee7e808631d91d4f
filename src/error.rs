//! Error types for the arbiter service.
//!
//! This module provides a unified error type [`ArbiterError`] for all arbiter
//! operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Selection**: no eligible model variant, or an ambiguous match that the
//!   caller must disambiguate by version
//! - **Arbitration**: unknown test ids, zero-traffic variants that cannot be
//!   scored, aborted multi-row transactions
//! - **Configuration**: invalid settings or missing configuration
//! - **Ambient**: storage, serialization, and I/O failures
//!
//! # Example
//!
//! ```rust
//! use arbiter::error::{ArbiterError, Result};
//!
//! fn lookup(endpoint: &str) -> Result<()> {
//!     if endpoint.is_empty() {
//!         return Err(ArbiterError::InvalidArgument("endpoint name is empty".into()));
//!     }
//!     Ok(())
//! }
//!
//! fn classify(err: &ArbiterError) {
//!     if err.is_client_error() {
//!         println!("caller mistake: {}", err);
//!     } else {
//!         println!("internal failure: {}", err);
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Main error type for arbiter operations.
#[derive(Error, Debug)]
pub enum ArbiterError {
    // Variant selection errors
    #[error("model variant is not available: {0}")]
    NotAvailable(String),

    #[error("model variant selection is ambiguous: {0}")]
    AmbiguousSelection(String),

    // Arbitration errors
    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient data to score variant: {0}")]
    InsufficientData(String),

    #[error("transaction aborted: {0}")]
    TransactionFailure(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    // Request validation errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Ambient errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ArbiterError {
    /// Check whether the error was caused by the caller's request rather than
    /// by an internal failure. Client errors map to 4xx at the gateway.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ArbiterError::NotAvailable(_)
                | ArbiterError::AmbiguousSelection(_)
                | ArbiterError::NotFound(_)
                | ArbiterError::InsufficientData(_)
                | ArbiterError::AlreadyExists(_)
                | ArbiterError::InvalidArgument(_)
        )
    }
}

impl From<serde_json::Error> for ArbiterError {
    fn from(e: serde_json::Error) -> Self {
        ArbiterError::Serialization(e.to_string())
    }
}

/// Result type alias for arbiter operations.
pub type Result<T> = std::result::Result<T, ArbiterError>;
