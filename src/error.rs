use thiserror::Error;

/// Errors surfaced across the library boundary.
#[derive(Debug, Error)]
pub enum ProberError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid target URLs: {}", .0.join(", "))]
    InvalidUrls(Vec<String>),

    #[error("too many target URLs: {count} (max {max})")]
    TooManyUrls { count: usize, max: usize },

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProberError>;

/// Network-level failure of a single request. Never aborts a larger operation;
/// callers downgrade it into a status sentinel.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}
