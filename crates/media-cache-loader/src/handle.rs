//! Fetch identity types.
//!
//! A [`ResourceHandle`] names *what* to fetch (URL plus cache kind) and
//! *who* it is fetched for (the [`OwnerTag`]). The owner tag exists purely
//! for log attribution; the loader never dereferences it and never ties its
//! own lifetime to the owner's.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use media_cache::{ResourceKind, SourceId};
use url::Url;

/// Diagnostic tag naming the party a fetch is performed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerTag(Arc<str>);

impl OwnerTag {
    /// Creates a tag from a label such as a player or view identifier.
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self(label.into())
    }

    /// Tag used when no owner was named.
    pub fn detached() -> Self {
        Self::new("detached")
    }

    /// The label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OwnerTag {
    fn default() -> Self {
        Self::detached()
    }
}

impl fmt::Display for OwnerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one progressive fetch.
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    /// Remote location of the payload.
    pub url: Url,
    /// Cache kind the payload belongs to (selects the durable directory
    /// and the sizing pipeline).
    pub kind: ResourceKind,
    /// Diagnostic owner attribution.
    pub owner: OwnerTag,
}

impl ResourceHandle {
    /// Creates a handle with no owner attribution.
    pub fn new(url: Url, kind: ResourceKind) -> Self {
        Self {
            url,
            kind,
            owner: OwnerTag::detached(),
        }
    }

    /// Attaches an owner tag for log attribution.
    pub fn owned_by(mut self, owner: OwnerTag) -> Self {
        self.owner = owner;
        self
    }

    /// Cache identity derived from the URL.
    pub fn source_id(&self) -> SourceId {
        SourceId::from_url(&self.url)
    }
}

/// Response metadata recorded when network headers arrive.
///
/// Both fields stay `None` until a response has been seen; a resource
/// served without a `Content-Length` keeps `total_len` unset for its whole
/// lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    /// MIME type reported by the server, if any.
    pub content_type: Option<String>,
    /// Total payload length in bytes, when the server declared one.
    pub total_len: Option<u64>,
}

impl ResponseMeta {
    /// Creates metadata from response headers.
    pub fn new(content_type: Option<String>, total_len: Option<u64>) -> Self {
        Self {
            content_type,
            total_len,
        }
    }

    /// Metadata synthesized for pre-supplied payloads that never touch the
    /// network: the length is exact and the content type is guessed from
    /// the URL extension.
    pub(crate) fn synthesized(handle: &ResourceHandle, len: u64) -> Self {
        Self {
            content_type: Some(guess_content_type(&handle.url).to_string()),
            total_len: Some(len),
        }
    }
}

/// Best-effort MIME guess from the URL path extension.
fn guess_content_type(url: &Url) -> &'static str {
    let ext = Path::new(url.path())
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}
