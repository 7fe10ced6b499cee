use thiserror::Error;

/// Startup configuration failures. Fatal: the service never starts serving.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("GROQ_API_KEY is not set in the secrets file or the environment")]
    MissingApiKey,
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
    #[error("failed to load secrets file: {0}")]
    Secrets(String),
}

/// Any failure of an outbound inference call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("inference request timed out")]
    Timeout,
    #[error("inference request failed: {0}")]
    Http(String),
    #[error("inference API error ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("malformed inference response: {0}")]
    Malformed(String),
    #[error("inference response contained no text")]
    Empty,
    #[error("streamed response exceeded {0} bytes")]
    StreamTooLarge(usize),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Http(err.to_string())
        }
    }
}

/// Outcome of a failed detection. `Empty` means the provider answered but
/// named no food; it is never produced for a failed call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectionError {
    #[error("no food items detected in the image")]
    Empty,
    #[error("image could not be decoded: {0}")]
    InvalidImage(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("no draft item at index {0}")]
    NoSuchItem(usize),
    #[error("food name must not be empty")]
    EmptyName,
}

/// A table-shaped resolver answer that does not split into the expected
/// columns. Soft failure: callers show `raw` instead.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("expected {expected} fields, found {found}")]
pub struct MalformedRow {
    pub expected: usize,
    pub found: usize,
    pub raw: String,
}
