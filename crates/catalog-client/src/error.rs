//! Error types for the catalog client.

/// Errors that can occur when talking to the catalog or session service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error raised by the middleware stack (retries exhausted, etc.)
    #[error("HTTP request error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// Database, table or statement does not exist (`EntityNotFoundException`)
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Entity already exists (`AlreadyExistsException`)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Caller lacks permission (`AccessDeniedException`)
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Service throttled the call (`ThrottlingException`)
    #[error("Throttled: {0}")]
    Throttled(String),

    /// Request was rejected as malformed (`InvalidInputException`, `ValidationException`)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Any other service-side failure
    #[error("Service error ({status}) {kind}: {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Exception type reported by the service
        kind: String,
        /// Error message from the service
        message: String,
        /// Request ID for tracking
        request_id: Option<String>,
    },

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Throttled(_) => true,
            ClientError::ServerError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the service reported a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::EntityNotFound(_))
    }

    /// Returns the request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ClientError::ServerError { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    /// Build an error from the exception type the service put in `__type`.
    ///
    /// The type may be namespaced (`com.amazonaws.glue#EntityNotFoundException`);
    /// only the part after `#` is matched.
    pub fn from_exception(
        status: u16,
        kind: &str,
        message: String,
        request_id: Option<String>,
    ) -> Self {
        let short = kind.rsplit('#').next().unwrap_or(kind);
        match short {
            "EntityNotFoundException" => ClientError::EntityNotFound(message),
            "AlreadyExistsException" => ClientError::AlreadyExists(message),
            "AccessDeniedException" => ClientError::AccessDenied(message),
            "ThrottlingException" => ClientError::Throttled(message),
            "InvalidInputException" | "ValidationException" => ClientError::InvalidInput(message),
            _ => ClientError::ServerError {
                status,
                kind: short.to_string(),
                message,
                request_id,
            },
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
