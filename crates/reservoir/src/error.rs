//! Error types for connection pooling
use thiserror::Error;

/// Result type for pool and connection operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error carried as the source of wrapped failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for pool operations and connection implementations
#[derive(Error, Debug)]
pub enum Error {
    /// Pool or factory configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// The factory failed to create a connection
    #[error("Failed to create connection for '{resource_id}'")]
    Creation {
        /// The factory identifier
        resource_id: String,
        /// The factory's error
        #[source]
        source: BoxError,
    },

    /// The pool has been shut down
    #[error("Connection pool '{resource_id}' has been shut down")]
    PoolShutdown {
        /// The factory identifier
        resource_id: String,
    },

    /// A connection did not pass validation
    #[error("Validation failed for connection of '{resource_id}': {reason}")]
    Validation {
        /// The factory identifier
        resource_id: String,
        /// Why the connection was rejected
        reason: String,
    },

    /// Operation timeout
    #[error("Operation timed out after {timeout_ms}ms for '{resource_id}': {operation}")]
    Timeout {
        /// The factory identifier
        resource_id: String,
        /// The timeout duration in milliseconds
        timeout_ms: u64,
        /// The operation that timed out
        operation: String,
    },

    /// A waiting borrow was cancelled by the caller
    #[error("Borrow from '{resource_id}' was cancelled")]
    Cancelled {
        /// The factory identifier
        resource_id: String,
    },

    /// Error reported by a connection or factory implementation
    #[error("Backend error: {message}")]
    Backend {
        /// The error message
        message: String,
        /// The underlying driver error
        #[source]
        source: Option<BoxError>,
    },

    /// One or more connections failed to close during shutdown
    #[error("Errors occurred while shutting down '{resource_id}': {} connection(s) failed to close", .failures.len())]
    Shutdown {
        /// The factory identifier
        resource_id: String,
        /// Every close failure, in the order they happened
        failures: Vec<Error>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a backend error without a source
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Create a backend error wrapping a driver error
    pub fn backend_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn creation(resource_id: &str, source: Self) -> Self {
        Self::Creation {
            resource_id: resource_id.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn pool_shutdown(resource_id: &str) -> Self {
        Self::PoolShutdown {
            resource_id: resource_id.to_string(),
        }
    }

    pub(crate) fn validation<S: Into<String>>(resource_id: &str, reason: S) -> Self {
        Self::Validation {
            resource_id: resource_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Close failures collected by a shutdown, empty for any other variant.
    #[must_use]
    pub fn failures(&self) -> &[Error] {
        match self {
            Self::Shutdown { failures, .. } => failures,
            _ => &[],
        }
    }

    /// Get the factory ID associated with this error (if any)
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            Self::Configuration { .. } | Self::Backend { .. } => None,
            Self::Creation { resource_id, .. }
            | Self::PoolShutdown { resource_id }
            | Self::Validation { resource_id, .. }
            | Self::Timeout { resource_id, .. }
            | Self::Cancelled { resource_id }
            | Self::Shutdown { resource_id, .. } => Some(resource_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_error_reports_every_failure() {
        let err = Error::Shutdown {
            resource_id: "db".to_string(),
            failures: vec![Error::backend("socket reset"), Error::backend("broken pipe")],
        };
        assert_eq!(err.failures().len(), 2);
        assert_eq!(
            err.to_string(),
            "Errors occurred while shutting down 'db': 2 connection(s) failed to close"
        );
    }

    #[test]
    fn failures_is_empty_for_other_variants() {
        assert!(Error::pool_shutdown("db").failures().is_empty());
    }

    #[test]
    fn creation_keeps_factory_error_as_source() {
        let err = Error::creation("db", Error::backend("auth rejected"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("Backend error: auth rejected"));
        assert_eq!(err.resource_id(), Some("db"));
    }

    #[test]
    fn backend_with_source_chains() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::backend_with_source("connect failed", io);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.resource_id(), None);
    }
}
