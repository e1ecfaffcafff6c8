//! Error types for the reconciliation core

use thiserror::Error;

/// Classification code the networking service reports when a route delete
/// targets a route that no longer exists
pub const ROUTE_NOT_FOUND: &str = "InvalidRoute.NotFound";

/// Main error type for reconciliation operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Networking service call failed
    #[error("service error: {message}")]
    Service {
        /// Classification code reported by the service, when present
        code: Option<String>,
        /// Description of the failure
        message: String,
    },

    /// Invocation property bag was missing or malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Terminal status could not be delivered to the invoking environment
    #[error("report error: {0}")]
    Report(String),
}

impl Error {
    /// Create a service error with no classification code
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service {
            code: None,
            message: msg.into(),
        }
    }

    /// Create a service error carrying the service's classification code
    pub fn service_with_code(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Service {
            code: Some(code.into()),
            message: msg.into(),
        }
    }

    /// Create an invalid-request error with the given message
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a report error with the given message
    pub fn report(msg: impl Into<String>) -> Self {
        Self::Report(msg.into())
    }

    /// Whether this is the service telling us a route is already absent.
    ///
    /// Deletes treat this as success: removing a route that is gone leaves
    /// the table in the desired state.
    pub fn is_route_not_found(&self) -> bool {
        matches!(self, Self::Service { code: Some(code), .. } if code == ROUTE_NOT_FOUND)
    }
}
