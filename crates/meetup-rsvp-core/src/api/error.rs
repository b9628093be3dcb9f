use std::time::Duration;

use thiserror::Error;

use crate::auth::AuthError;
use crate::utils::{RetryError, Retryable};

/// Phrases in GraphQL error messages that indicate a transient server problem.
const SERVER_ERROR_KEYWORDS: [&str; 4] = ["server error", "internal error", "timeout", "unavailable"];

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Rate limited - please wait before retrying")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Network error: {0}")]
    Network(String),

    /// 5xx responses and GraphQL errors that read like server trouble.
    #[error("Server error: {0}")]
    ServerRetryable(String),

    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Authentication failed - invalid credentials")]
    Unauthorized,

    #[error("Client error {status}: {body}")]
    Client { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("GraphQL errors: {0}")]
    GraphQl(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("All {attempts} retry attempts failed. Last error: {last}")]
    RetryExhausted { attempts: u32, last: Box<ApiError> },
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Map a non-success HTTP status to an error kind.
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let truncated = Self::truncate_body(body);
        match status {
            401 => ApiError::Unauthorized,
            429 => ApiError::RateLimited { retry_after },
            400..=499 => ApiError::Client { status, body: truncated },
            500..=599 => ApiError::ServerRetryable(format!("Server error ({}): {}", status, truncated)),
            _ => ApiError::Http { status, body: truncated },
        }
    }

    /// Classify GraphQL `errors[]` messages: server-ish wording is retryable.
    pub fn from_graphql_messages(messages: &str) -> Self {
        let lower = messages.to_lowercase();
        if SERVER_ERROR_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            ApiError::ServerRetryable(format!("Server-side GraphQL errors: {}", messages))
        } else {
            ApiError::GraphQl(messages.to_string())
        }
    }
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } | ApiError::Network(_) | ApiError::ServerRetryable(_) => true,
            ApiError::Http { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<RetryError<ApiError>> for ApiError {
    fn from(err: RetryError<ApiError>) -> Self {
        match err {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { attempts, last } => ApiError::RetryExhausted {
                attempts,
                last: Box::new(last),
            },
        }
    }
}
