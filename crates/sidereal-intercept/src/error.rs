//! Error types for sidereal-intercept.
//!
//! None of these errors reach the caller of an intercepted operation. Boundary
//! entry points turn them into "not handled" or "log dropped" and record them
//! through `tracing`. Failures raised by a wrapped client use that client's own
//! error type and are propagated unchanged.

/// Result type alias using [`InterceptError`].
pub type InterceptResult<T> = Result<T, InterceptError>;

/// Errors raised inside the interception layer.
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    /// Outbound HTTP call failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint override could not be parsed as a URL.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// The rejected value.
        endpoint: String,
        /// Parser message.
        reason: String,
    },

    /// Outbound HTTP client could not be built.
    #[error("HTTP client unavailable")]
    ClientUnavailable,

    /// Invoke request carried no function name.
    #[error("invoke request has no function name")]
    MissingFunctionName,

    /// JSON encoding or decoding failed.
    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),
}

impl From<figment::Error> for InterceptError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl InterceptError {
    /// Create an invalid endpoint error.
    #[must_use]
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable name, used as a structured log field.
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::InvalidEndpoint { .. } => "invalid_endpoint",
            Self::ClientUnavailable => "client_unavailable",
            Self::MissingFunctionName => "missing_function_name",
            Self::Serialisation(_) => "serialisation",
            Self::Config(_) => "config",
        }
    }
}
