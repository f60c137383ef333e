//! Runtime error types.

use switchyard_core::{MappingError, RegistrationError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while setting up or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A handler, filter or association was rejected.
    #[error("Registration failed: {0}")]
    Registration(#[from] RegistrationError),

    /// A mapping was rejected.
    #[error("Invalid mapping: {0}")]
    Mapping(#[from] MappingError),

    /// Filter mappings name filters that were never registered.
    #[error("Filter mappings reference unregistered filters: {}", .0.join(", "))]
    UnknownFilters(Vec<String>),

    /// Installing a shutdown signal handler failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
