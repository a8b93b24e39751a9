//! Error types for the Lagoon client.

use thiserror::Error;

/// Errors surfaced by the client, its transports and its configuration layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure: connection refused, DNS, TLS, body read.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The server answered with a failing HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Unexpected status code or malformed payload/envelope.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Streaming channel failed before its terminator arrived.
    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Malformed input line; callers drop these rather than surface them.
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Wraps an error with the operation and entrypoint path it concerns.
    #[error("{operation} failed for '{path}': {source}")]
    Operation {
        operation: &'static str,
        path: String,
        #[source]
        source: Box<ApiError>,
    },
}

/// Violations of the data source's own rules, raised without any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Data source {datasource} is read-only")]
    ReadOnly { datasource: String },

    #[error("Entrypoint not found: {path}")]
    NodeNotFound { path: String },
}

impl ApiError {
    /// Attach operation context. Already-contextualized errors are kept as is.
    pub fn in_operation(self, operation: &'static str, path: impl Into<String>) -> Self {
        match self {
            ApiError::Operation { .. } => self,
            other => ApiError::Operation {
                operation,
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, skipping operation context.
    pub fn root(&self) -> &ApiError {
        match self {
            ApiError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(
            self.root(),
            ApiError::Domain(DomainError::ReadOnly { .. })
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::NetworkError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ApiError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ApiError::ChannelError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::ProtocolError(format!("Malformed JSON payload: {}", err))
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::ConfigError(format!("Invalid URL: {}", err))
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
