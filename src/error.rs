use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Provider error {code}: {message}")]
    Provider { code: String, message: String },
    #[error("Image decode failed: {0}")]
    Decode(String),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Too many requests in flight (limit {0})")]
    Overloaded(usize),
    #[error("Materialization failed: {0}")]
    Materialize(String),
}

impl GenerationError {
    /// Stable label for log output and UI dispatch.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::InvalidRequest(_) => "invalid_request",
            GenerationError::Network(_) => "network",
            GenerationError::Timeout => "timeout",
            GenerationError::HttpStatus(_) => "http_status",
            GenerationError::MalformedResponse(_) => "malformed_response",
            GenerationError::Provider { .. } => "provider",
            GenerationError::Decode(_) => "decode",
            GenerationError::Cancelled => "cancelled",
            GenerationError::Overloaded(_) => "overloaded",
            GenerationError::Materialize(_) => "materialize",
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
