//! Unified crate-level error types.
//!
//! This module provides a single [`LoadError`] type used across the crate
//! and a convenient [`LoadResult`] alias.
//!
//! Notes
//! -----
//! `LoadError` is `Clone`: one fetch failure fans out to every pending
//! range request and to the event observer, so the error must be shareable.
//! Transport failures are therefore carried as strings rather than as the
//! HTTP client's error type.

/// Result type used by this crate.
pub type LoadResult<T> = Result<T, LoadError>;

/// Unified error type for the `media-cache-loader` crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// A generic error with a message.
    #[error("{0}")]
    Message(String),

    /// Network-level failure: connect, status, timeout, or a broken body
    /// stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The fetch was cancelled before it completed.
    #[error("fetch cancelled")]
    Cancelled,

    /// A range request was malformed (for example, its end overflows).
    #[error("invalid range: {0}")]
    InvalidRange(&'static str),

    /// A range request arrived after the fetch had already failed; carries
    /// the stored failure.
    #[error("fetch already failed: {0}")]
    Failed(String),
}

impl LoadError {
    /// Convenience helper to construct a simple message error.
    pub fn msg(msg: impl Into<String>) -> Self {
        LoadError::Message(msg.into())
    }

    /// Convenience helper for transport-level failures.
    pub fn transport(msg: impl Into<String>) -> Self {
        LoadError::Transport(msg.into())
    }
}
