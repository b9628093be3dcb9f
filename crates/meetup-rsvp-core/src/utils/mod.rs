//! Cross-cutting helpers: retry with backoff and text formatting.

pub mod format;
pub mod retry;

pub use format::{format_count, percentage, truncate_description};
pub use retry::{RetryConfig, RetryError, RetryExecutor, Retryable};
