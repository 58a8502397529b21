//! Core domain types for the solvebot review system: diff indexing,
//! line resolution and review value objects.

pub mod diff;
pub mod resolve;
pub mod review;

pub use diff::{ChangedFile, DiffIndex};
pub use resolve::{resolve_suggestion, ResolverConfig};
pub use review::{Marker, ResolvedComment, ReviewResult, Suggestion, ANSWER_UNAVAILABLE};

/// Error type shared by all solvebot crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("branch ref moved concurrently")]
    ConcurrentModification,

    #[error("failed to decode AI response: {0}")]
    Decode(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether a retry of the whole job may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConcurrentModification | Error::Http(_))
    }
}
