//! Configuration for the `media-cache` crate.
//!
//! One flat settings struct covers both tiers:
//! - disk layout (cache root directory),
//! - memory-tier limits (entry counts and byte costs for the encoded and
//!   decoded stores),
//! - the optional video transcoder used to produce sized video variants.
//!
//! Limits are enforced strictly: an insert that would exceed a limit evicts
//! least-recently-used entries until the store is within bounds again.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::transcode::VideoTranscoder;

/// Settings for a [`crate::MediaCache`] instance.
#[derive(Clone)]
pub struct CacheSettings {
    /// Root directory of the disk tier. `videos/`, `images/` and `scratch/`
    /// are created underneath it.
    pub root: PathBuf,

    /// Maximum number of entries in the encoded-bytes memory store.
    /// Default: 128.
    pub encoded_max_entries: usize,

    /// Maximum total cost (payload bytes) of the encoded-bytes memory store.
    /// Default: 64 MiB.
    pub encoded_max_cost: u64,

    /// Maximum number of entries in the decoded-image memory store.
    /// Default: 32.
    pub decoded_max_entries: usize,

    /// Maximum total cost of the decoded-image memory store, where one
    /// entry costs `width * height * 4` bytes.
    /// Default: 128 MiB.
    pub decoded_max_cost: u64,

    /// Transcoder used to produce sized video variants.
    ///
    /// When `None`, sized video variants are skipped. Not included in Debug
    /// output for readability.
    pub transcoder: Option<Arc<dyn VideoTranscoder>>,
}

impl CacheSettings {
    /// Create settings rooted at the given directory, with default limits.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            encoded_max_entries: 128,
            encoded_max_cost: 64 * 1024 * 1024,
            decoded_max_entries: 32,
            decoded_max_cost: 128 * 1024 * 1024,
            transcoder: None,
        }
    }

    // -------------------------
    // Memory-tier setters
    // -------------------------

    pub fn encoded_max_entries(mut self, v: usize) -> Self {
        self.encoded_max_entries = v;
        self
    }

    pub fn encoded_max_cost(mut self, v: u64) -> Self {
        self.encoded_max_cost = v;
        self
    }

    pub fn decoded_max_entries(mut self, v: usize) -> Self {
        self.decoded_max_entries = v;
        self
    }

    pub fn decoded_max_cost(mut self, v: u64) -> Self {
        self.decoded_max_cost = v;
        self
    }

    // -------------------------
    // Transcode setter
    // -------------------------

    /// Sets the transcoder used for sized video variants.
    pub fn transcoder(mut self, t: Arc<dyn VideoTranscoder>) -> Self {
        self.transcoder = Some(t);
        self
    }
}

impl fmt::Debug for CacheSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print `transcoder` to keep Debug output clean.
        f.debug_struct("CacheSettings")
            .field("root", &self.root)
            .field("encoded_max_entries", &self.encoded_max_entries)
            .field("encoded_max_cost", &self.encoded_max_cost)
            .field("decoded_max_entries", &self.decoded_max_entries)
            .field("decoded_max_cost", &self.decoded_max_cost)
            .field("has_transcoder", &self.transcoder.is_some())
            .finish()
    }
}
