// src/error.rs

/// Result type alias for everything around the line-item core.
pub type Result<T> = std::result::Result<T, DocParseError>;

#[derive(Debug, thiserror::Error)]
pub enum DocParseError {
    #[error("Google project/processor ID not set in config")]
    MissingProcessor,

    #[error("Only PDF files are allowed! ({0})")]
    NotPdf(String),

    #[error("No PDF file uploaded.")]
    NoFile,

    #[error("Document {0} not found")]
    NotFound(i64),

    #[error("Failed to obtain access token: {0}")]
    Auth(String),

    /// Non-success response from the `:process` endpoint.
    #[error("Google Document AI error: {details}")]
    Service { status: u16, details: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl DocParseError {
    /// Transport failures, throttling and server-side errors are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            DocParseError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            DocParseError::Service { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<toml::de::Error> for DocParseError {
    fn from(e: toml::de::Error) -> Self {
        DocParseError::Config(e.to_string())
    }
}

impl From<toml_edit::TomlError> for DocParseError {
    fn from(e: toml_edit::TomlError) -> Self {
        DocParseError::Config(e.to_string())
    }
}
