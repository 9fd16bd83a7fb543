//! Pool feed abstraction for fetching the current universe of yield pools.

use crate::domain::Pool;
use async_trait::async_trait;
use std::fmt;

pub mod llama;
pub mod mock;
pub mod retry;

pub use llama::LlamaPoolFeed;
pub use mock::MockPoolFeed;
pub use retry::FixedAttempts;

/// Source of pool snapshots.
///
/// Implementations own their retry/timeout policy: an `Err` means the feed could not be
/// obtained at all and the caller must not act on partial data.
#[async_trait]
pub trait PoolFeed: Send + Sync + fmt::Debug {
    /// Fetch every pool currently listed by the source.
    ///
    /// Records that fail validation are dropped; they never surface as an error.
    async fn fetch_pools(&self) -> Result<Vec<Pool>, FeedError>;
}

/// Error type for pool feed operations.
#[derive(Debug, Clone)]
pub enum FeedError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded on every attempt
    RateLimited,
    Other(String),
}

impl FeedError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// A malformed body is retried like a 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::NetworkError(_) | FeedError::RateLimited | FeedError::ParseError(_) => true,
            FeedError::HttpError { status, .. } => *status >= 500,
            FeedError::Other(_) => false,
        }
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            FeedError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            FeedError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            FeedError::RateLimited => write!(f, "Rate limited"),
            FeedError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for FeedError {}
