//! Core data models for the cache.
//!
//! This module is intentionally focused on *pure* types, with no I/O
//! concerns. Higher-level modules (`disk`, `cache`, `resize`) build on top
//! of these types.
//!
//! Identity model
//! --------------
//! A cached resource is addressed by a [`CacheKey`]: the [`SourceId`]
//! derived from the resource URL, the [`ResourceKind`] (which selects the
//! on-disk directory), and the [`SizeVariant`] (original payload or a
//! resized/transcoded rendition). The `SourceId` carries the lowercased,
//! sanitized base name and the original file extension; both feed the
//! deterministic file naming in [`crate::naming`].

use std::fmt;

use url::Url;

/// Kind of media resource stored in the cache.
///
/// The kind selects the on-disk subdirectory and which variant pipeline
/// (image resize vs. video transcode) applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Video payloads, stored under `videos/`.
    Video,
    /// Image payloads, stored under `images/`.
    Image,
}

impl ResourceKind {
    /// Directory name for this kind under the cache root.
    pub fn dir_name(self) -> &'static str {
        match self {
            ResourceKind::Video => "videos",
            ResourceKind::Image => "images",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Pixel dimensions of a target rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Creates dimensions from a width/height pair.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which rendition of a source is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeVariant {
    /// The payload exactly as fetched.
    Original,
    /// A rendition scaled/transcoded to fit within the given dimensions.
    Sized(Dimensions),
}

impl SizeVariant {
    /// Dimension pair used in file names.
    ///
    /// The original variant is encoded as `0-0` so that a single naming
    /// template covers every variant and sized lookups can never alias the
    /// original.
    pub fn name_dimensions(self) -> (u32, u32) {
        match self {
            SizeVariant::Original => (0, 0),
            SizeVariant::Sized(d) => (d.width, d.height),
        }
    }
}

/// Identity of a remote source, reduced to what the cache layout needs.
///
/// Derived from the source URL: the last path segment is split into a stem
/// and an extension, then both are sanitized and lowercased. Query strings
/// never participate in identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId {
    base: String,
    ext: Option<String>,
}

impl SourceId {
    /// Derives a source identity from a URL.
    pub fn from_url(url: &Url) -> Self {
        let last = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("");
        Self::from_name(last)
    }

    /// Derives a source identity from a bare file name (no path, no query).
    pub fn from_name(name: &str) -> Self {
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (name, None),
        };

        let base = sanitize_component(stem);
        let ext = ext.map(sanitize_extension).filter(|e| !e.is_empty());

        Self { base, ext }
    }

    /// Lowercased, sanitized base name used as the file-name prefix.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Lowercased original extension, if the source name carried one.
    pub fn ext(&self) -> Option<&str> {
        self.ext.as_deref()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ext {
            Some(ext) => write!(f, "{}.{}", self.base, ext),
            None => f.write_str(&self.base),
        }
    }
}

/// Full address of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Source identity.
    pub source: SourceId,
    /// Resource kind (selects the on-disk directory).
    pub kind: ResourceKind,
    /// Addressed rendition.
    pub variant: SizeVariant,
}

impl CacheKey {
    /// Key for the original payload of a source.
    pub fn original(source: SourceId, kind: ResourceKind) -> Self {
        Self {
            source,
            kind,
            variant: SizeVariant::Original,
        }
    }

    /// Key for a sized rendition of a source.
    pub fn sized(source: SourceId, kind: ResourceKind, dimensions: Dimensions) -> Self {
        Self {
            source,
            kind,
            variant: SizeVariant::Sized(dimensions),
        }
    }
}

/// Sanitizes one file-name component: lowercase, ASCII alphanumerics plus
/// `-` and `_` kept, everything else replaced with `_`, then surrounding
/// `_` trimmed. Falls back to `"resource"` when nothing survives.
fn sanitize_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if ch == '-' || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "resource".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitizes an extension: lowercase ASCII alphanumerics only, capped at a
/// conventional length.
fn sanitize_extension(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .take(8)
        .collect()
}
