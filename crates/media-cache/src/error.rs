//! Unified crate-level error types.
//!
//! This module provides a single [`CacheError`] type used across the crate
//! and a convenient [`CacheResult`] alias.
//!
//! Notes
//! -----
//! A cache miss is never an error: lookup operations return `Ok(None)`.
//! `CacheError` is reserved for real failures (I/O, image decoding, layout
//! problems). Variant production failures (resize, transcode) are handled
//! as best-effort inside [`crate::cache::MediaCache`] and usually never
//! reach the caller.

use std::io;

/// Result type used by this crate.
pub type CacheResult<T> = Result<T, CacheError>;

/// Unified error type for the `media-cache` crate.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A generic error with a message.
    #[error("{0}")]
    Message(String),

    /// I/O error.
    ///
    /// Uses the concrete `std::io::Error` to preserve error kinds and sources.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Image decoding or encoding failed.
    ///
    /// String-based so the `image` crate's error type stays out of the
    /// public API.
    #[error("image error: {0}")]
    Image(String),

    /// The shared cache instance was used before [`crate::cache::MediaCache::init_shared`].
    #[error("shared cache not initialized")]
    SharedNotInitialized,

    /// Extra context around a lower-level cache error.
    ///
    /// Use this for adding human-readable context without creating many
    /// wrapper enums.
    #[error("{context}: {source}")]
    Context {
        /// What we were doing when the error occurred.
        context: &'static str,
        /// The underlying error.
        #[source]
        source: Box<CacheError>,
    },
}

impl CacheError {
    /// Convenience helper to construct a simple message error.
    pub fn msg(msg: impl Into<String>) -> Self {
        CacheError::Message(msg.into())
    }

    /// Convenience helper for image pipeline failures.
    pub fn image(err: impl std::fmt::Display) -> Self {
        CacheError::Image(err.to_string())
    }

    /// Attach static context to an existing error.
    pub fn with_context(self, context: &'static str) -> Self {
        CacheError::Context {
            context,
            source: Box::new(self),
        }
    }
}
