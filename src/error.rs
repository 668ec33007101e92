use thiserror::Error;

/// Input problems the user has to fix before resubmitting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("at most {max} subject images are accepted, got {supplied}")]
    TooManyImages { max: usize, supplied: usize },
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u32,
        max: u32,
        value: u32,
    },
}

#[derive(Debug, Error)]
pub enum RecontextError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("HTTP error: {status} {reason}")]
    Http {
        status: u16,
        reason: String,
        body: String,
    },
    #[error("Request error: {0}")]
    Request(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RecontextError {
    /// Raw provider body for HTTP failures; the API embeds its error detail there.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            RecontextError::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, RecontextError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, RecontextError>;
