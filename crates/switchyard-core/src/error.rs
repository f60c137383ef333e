//! Unified error types for the Switchyard dispatch engine.
//!
//! Setup-time failures ([`MappingError`], [`RegistrationError`]) are returned
//! to the caller immediately. Request-time failures are [`DispatchError`]s;
//! an unmatched path is not an error at all but a not-found chain.

use std::fmt;

use thiserror::Error;

/// The two kinds of lazily constructed components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// A request filter (interceptor).
    Filter,
    /// A request handler (servlet).
    Handler,
}

impl ComponentKind {
    /// Returns the lowercase name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Handler => "handler",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Mapping Errors
// =============================================================================

/// Errors raised while declaring a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// The pattern is not one of exact, prefix, extension or default.
    #[error("invalid url-pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The mapping does not name a handler.
    #[error("mapping for '{pattern}' has no handler name")]
    MissingHandlerName {
        /// The pattern of the incomplete mapping.
        pattern: String,
    },

    /// The mapping names a handler that was never registered.
    #[error("mapping '{pattern}' names unknown handler '{handler}'; register the handler first")]
    UnknownHandler {
        /// The pattern of the mapping.
        pattern: String,
        /// The unknown handler name.
        handler: String,
    },
}

impl MappingError {
    /// Creates an invalid pattern error.
    pub fn invalid(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Registration Errors
// =============================================================================

/// Errors raised while registering filters, handlers or associations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The component has no name to register it under.
    #[error("{kind} registration is missing a name")]
    MissingName {
        /// What was being registered.
        kind: ComponentKind,
    },

    /// A pattern attached to the registration is malformed.
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors raised while building a chain for a request.
///
/// All variants are cloneable so a construction failure recorded once can be
/// handed to every request that observes it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A filter association names a filter that was never registered.
    #[error("'{name}' is not a known filter; filters must be registered before they are used")]
    UnknownFilter {
        /// The filter name.
        name: String,
    },

    /// A route resolved to a handler name with no registration.
    #[error("'{name}' is not a known handler")]
    UnknownHandler {
        /// The handler name.
        name: String,
    },

    /// The component factory failed.
    #[error("failed to construct {kind} '{name}': {reason}")]
    Construction {
        /// Filter or handler.
        kind: ComponentKind,
        /// The component name.
        name: String,
        /// The factory's error message.
        reason: String,
    },
}

impl DispatchError {
    /// Creates a construction error.
    pub fn construction(
        kind: ComponentKind,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Construction {
            kind,
            name: name.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for mapping declarations.
pub type MappingResult<T> = Result<T, MappingError>;

/// Result type for registrations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Result type for request dispatch.
pub type DispatchResult<T> = Result<T, DispatchError>;
