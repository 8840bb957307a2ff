//! Two-tier durable cache for media payloads.
//!
//! Finished downloads are stored twice: a bounded in-memory LRU tier for
//! hot entries (encoded bytes plus optionally decoded images), backed by a
//! flat on-disk tier that survives process restarts. Entries are keyed by
//! source identity plus a size variant, so the original payload and any
//! resized renditions of it live side by side and can be evicted or
//! deleted independently.
//!
//! Design goals:
//! - Deterministic, reversible file naming: every variant of a source maps
//!   to exactly one file name, and directory scans can recover all variants
//!   of a source without an index file.
//! - Crash-safe disk writes: payloads land in a scratch directory first and
//!   are moved into place atomically, so readers never observe a partial
//!   file.
//! - Contained sizing: resize and transcode work is best-effort and must
//!   never fail the original commit.
//!
//! This crate is composed of several modules:
//! - `model`: Cache identity types (`SourceId`, `SizeVariant`, `CacheKey`).
//! - `naming`: Deterministic variant file naming and prefix matching.
//! - `memory`: The bounded LRU store used by the in-memory tier.
//! - `disk`: The flat on-disk tier with atomic writes.
//! - `cache`: `MediaCache`, the facade combining both tiers.
//! - `resize`: Image decode/downscale helpers.
//! - `transcode`: The `VideoTranscoder` seam plus an ffmpeg-backed impl.
//! - `settings`: Cache configuration.
//! - `error`: Unified error types.
//!
//! This file (`lib.rs`) acts as a facade: it re-exports the main types
//! and functions from the internal modules to form the public API of the
//! `media-cache` crate.

mod cache;
mod disk;
mod error;
mod memory;
mod model;
mod naming;
mod resize;
mod settings;
mod transcode;

pub use crate::cache::MediaCache;
pub use crate::error::{CacheError, CacheResult};
pub use crate::model::{CacheKey, Dimensions, ResourceKind, SizeVariant, SourceId};
pub use crate::settings::CacheSettings;
pub use crate::transcode::{FfmpegTranscoder, NullTranscoder, VideoTranscoder};

// Deterministic naming helpers, exposed so callers can reason about the
// on-disk layout (and tests can assert it) without going through a cache.
pub use crate::naming::{
    matches_source, matches_variant, source_prefix, variant_file_name, variant_prefix,
};

// Sizing helpers shared with callers that want to pre-compute target
// dimensions or budget decoded-image memory the way the cache does.
pub use crate::resize::{decoded_cost, fit_within};

pub use bytes::Bytes;
pub use image::DynamicImage;
