//! Error types for Signpost

use hyper::StatusCode;

/// Main error type for registry, gateway and agent operations
#[derive(Debug, thiserror::Error)]
pub enum SignpostError {
    #[error("Service '{0}' is not registered")]
    UnknownService(String),

    #[error("Instance {host}:{port} is not registered under service '{service}'")]
    UnknownInstance {
        service: String,
        host: String,
        port: u16,
    },

    #[error("Service '{0}' has no alive instances")]
    NoAliveInstances(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SignpostError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownService(_) | Self::UnknownInstance { .. } | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::NoAliveInstances(_) | Self::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code used in JSON error bodies
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownService(_) => "unknown_service",
            Self::UnknownInstance { .. } => "unknown_instance",
            Self::NoAliveInstances(_) => "no_alive_instances",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::BadGateway(_) => "bad_gateway",
            Self::BadRequest(_) => "bad_request",
            Self::MethodNotAllowed(_) => "method_not_allowed",
            Self::NotFound(_) => "not_found",
            Self::Config(_) | Self::Internal(_) => "internal",
        }
    }

    /// True for the registry-side "cannot serve this name" family that the
    /// gateway collapses into a single unavailable response
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::UnknownService(_) | Self::NoAliveInstances(_) | Self::ServiceUnavailable(_)
        )
    }
}

impl From<std::io::Error> for SignpostError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for SignpostError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<serde_urlencoded::de::Error> for SignpostError {
    fn from(err: serde_urlencoded::de::Error) -> Self {
        Self::BadRequest(format!("Query error: {}", err))
    }
}

impl From<hyper::Error> for SignpostError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

/// Result type alias for Signpost operations
pub type Result<T> = std::result::Result<T, SignpostError>;
