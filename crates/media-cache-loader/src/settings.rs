//! Configuration for the `media-cache-loader` crate.
//!
//! One flat settings struct per loader covers transport timeouts, the
//! cache commit policy, and the optional target size committed alongside
//! the original payload.

use std::time::Duration;

use media_cache::Dimensions;

/// Whether a finished download is handed to the durable cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Commit the finished payload (default).
    #[default]
    Allow,
    /// Never touch the durable cache for this fetch.
    Bypass,
}

/// Settings for a [`crate::ProgressiveLoader`] instance.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    /// Timeout for establishing the response (connect plus headers).
    /// Default: 30s.
    pub request_timeout: Duration,

    /// Timeout between consecutive body chunks. `None` disables the idle
    /// watchdog. Default: 30s.
    pub idle_timeout: Option<Duration>,

    /// Cache commit policy applied when the fetch completes.
    /// Default: [`CachePolicy::Allow`].
    pub cache_policy: CachePolicy,

    /// When set, a sized rendition fitting within these dimensions is
    /// committed best-effort right after the original payload.
    /// Default: `None`.
    pub target_size: Option<Dimensions>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(30)),
            cache_policy: CachePolicy::Allow,
            target_size: None,
        }
    }
}

impl LoaderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_timeout(mut self, v: Duration) -> Self {
        self.request_timeout = v;
        self
    }

    pub fn idle_timeout(mut self, v: Option<Duration>) -> Self {
        self.idle_timeout = v;
        self
    }

    pub fn cache_policy(mut self, v: CachePolicy) -> Self {
        self.cache_policy = v;
        self
    }

    pub fn target_size(mut self, v: Option<Dimensions>) -> Self {
        self.target_size = v;
        self
    }
}
