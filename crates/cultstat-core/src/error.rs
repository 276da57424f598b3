use thiserror::Error;

/// Input validation errors exposed by `cultstat-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("username cannot be empty")]
    EmptyUsername,
    #[error("api key cannot be blank when set")]
    BlankApiKey,

    #[error("creation identifier cannot be empty")]
    EmptyIdentifier,
    #[error("creation identifier '{value}' does not contain a usable slug")]
    InvalidIdentifier { value: String },
    #[error("slug contains invalid character '{ch}' at index {index}")]
    SlugInvalidChar { ch: char, index: usize },

    #[error("update interval must be at least {min} minutes, got {value}")]
    IntervalTooShort { value: u64, min: u64 },

    #[error("endpoint must be an http(s) URL: '{value}'")]
    InvalidEndpoint { value: String },

    #[error("timestamp must be RFC3339 or YYYY-MM-DD: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
}
