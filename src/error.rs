//! Error types for Converge.
//!
//! This module defines the error types used throughout Converge. Configuration
//! errors are raised eagerly while a property table or override set is being
//! built; they indicate a programming mistake and must not be retried.
//! Convergence errors wrap failures of the external system reported by a
//! [`ResourceDriver`](crate::convergence::ResourceDriver).

use thiserror::Error;

/// Result type alias for Converge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Converge.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors (fatal at setup, never at comparison time)
    // ========================================================================
    /// A comparison strategy was combined with a value shape that cannot
    /// support it (e.g. `allow_more_present` on a scalar).
    #[error("Property '{property}' has shape '{shape}' which does not support comparison '{strategy}'")]
    InvalidComparison {
        /// Property name
        property: String,
        /// Requested comparison strategy
        strategy: String,
        /// Shape of the property's value
        shape: String,
    },

    /// The wildcard override only accepts `strict` and `ignore`.
    #[error("The wildcard '*' can only be used with comparison modes 'strict' and 'ignore', not '{0}'")]
    InvalidWildcard(String),

    /// An override referenced a property the table does not declare.
    #[error("Unknown property '{0}' in comparison overrides")]
    UnknownProperty(String),

    /// The same property was overridden through two different names.
    #[error("Both '{first}' and '{second}' (aliases of '{property}') are present in comparison overrides")]
    AmbiguousOverride {
        /// Canonical property name
        property: String,
        /// First alias used
        first: String,
        /// Second alias used
        second: String,
    },

    /// A property declared a dependency on a property the table does not hold.
    #[error("Property '{property}' requires unknown property '{requires}'")]
    UnknownRequirement {
        /// Dependent property
        property: String,
        /// Missing anchor property
        requires: String,
    },

    /// Two specs in one table share a name or alias.
    #[error("Duplicate property name or alias '{0}' in property table")]
    DuplicateProperty(String),

    /// A spec was declared with an empty name.
    #[error("Property specs must have a non-empty name")]
    EmptyPropertyName,

    /// A comparison strategy string did not parse.
    #[error("Unknown comparison mode '{0}'")]
    UnknownStrategy(String),

    /// A value shape string did not parse.
    #[error("Unknown value shape '{0}'")]
    UnknownShape(String),

    /// An API version string did not parse.
    #[error("Invalid API version '{0}': expected '<major>.<minor>'")]
    InvalidVersion(String),

    // ========================================================================
    // Observation Errors
    // ========================================================================
    /// The observed document is missing a section or field the normalizer
    /// needs, or holds a value of an unexpected type.
    #[error("Error parsing observed state: {0}")]
    InvalidObservation(String),

    // ========================================================================
    // Convergence Errors
    // ========================================================================
    /// A driver call against the external system failed.
    #[error("Error during '{operation}': {message}")]
    Driver {
        /// The operation that was attempted (create, update, remove, ...)
        operation: String,
        /// Error message
        message: String,
    },

    /// The external system refused an operation because the resource is
    /// paused. The convergence engine unpauses and retries on this error.
    #[error("Cannot {operation} resource '{id}' while it is paused")]
    ResourcePaused {
        /// The refused operation
        operation: String,
        /// Resource identifier
        id: String,
    },

    /// The resource stayed paused through the whole unpause retry budget.
    #[error("Error during '{operation}' of resource '{id}' (tried to unpause {attempts} times)")]
    StuckPaused {
        /// The refused operation
        operation: String,
        /// Resource identifier
        id: String,
        /// Number of unpause attempts made
        attempts: u32,
    },

    /// The driver does not implement an operation the target state needs.
    #[error("Unsupported driver operation: {0}")]
    Unsupported(String),

    /// A remedial call needs a desired property that was not specified.
    #[error("Cannot proceed when '{0}' is not specified")]
    MissingProperty(String),

    // ========================================================================
    // IO / Serialization Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new invalid-comparison error.
    pub fn invalid_comparison(
        property: impl Into<String>,
        strategy: impl std::fmt::Display,
        shape: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidComparison {
            property: property.into(),
            strategy: strategy.to_string(),
            shape: shape.to_string(),
        }
    }

    /// Creates a new driver error.
    pub fn driver(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Driver {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a new paused-resource error.
    pub fn paused(operation: impl Into<String>, id: impl Into<String>) -> Self {
        Self::ResourcePaused {
            operation: operation.into(),
            id: id.into(),
        }
    }

    /// Returns true if this error indicates a setup-time configuration
    /// mistake rather than a runtime condition.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidComparison { .. }
                | Error::InvalidWildcard(_)
                | Error::UnknownProperty(_)
                | Error::AmbiguousOverride { .. }
                | Error::UnknownRequirement { .. }
                | Error::DuplicateProperty(_)
                | Error::EmptyPropertyName
                | Error::UnknownStrategy(_)
                | Error::UnknownShape(_)
                | Error::InvalidVersion(_)
        )
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Adds context with a closure that is only evaluated on error.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Other {
            message: f().into(),
            source: Some(Box::new(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_flagged() {
        assert!(
            Error::invalid_comparison("memory", "allow_more_present", "value").is_configuration()
        );
        assert!(Error::UnknownProperty("bogus".to_string()).is_configuration());
        assert!(!Error::driver("create", "boom").is_configuration());
    }

    #[test]
    fn test_error_display() {
        let err = Error::invalid_comparison("memory", "allow_more_present", "value");
        assert_eq!(
            err.to_string(),
            "Property 'memory' has shape 'value' which does not support comparison 'allow_more_present'"
        );

        let err = Error::StuckPaused {
            operation: "remove".to_string(),
            id: "web-1".to_string(),
            attempts: 3,
        };
        assert!(err.to_string().contains("tried to unpause 3 times"));
    }

    #[test]
    fn test_error_context() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "nope"));
        let err = result.context("loading desired state").unwrap_err();
        assert_eq!(err.to_string(), "loading desired state");
        assert!(std::error::Error::source(&err).is_some());
    }
}
