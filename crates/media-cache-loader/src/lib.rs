//! Progressive media loader for `media-cache`.
//!
//! A progressive fetch downloads a payload once, front to back, while
//! consumers read byte ranges out of it concurrently — including ranges
//! that have not arrived yet. The coordinator parks those requests and
//! serves them incrementally as coverage grows, so playback can start
//! long before the download finishes. When the fetch completes, the
//! payload is committed to the durable [`media_cache::MediaCache`] tiers
//! and later opens are served without touching the network.
//!
//! Design goals:
//! - One buffer per fetch, append-only, frozen at the terminal phase;
//!   range delivery never re-reads the network.
//! - Requests can outrun the data: partial deliveries are first-class,
//!   and a request is clipped (never stuck) when the payload ends early.
//! - Terminal phases are sticky. A failure fails pending requests exactly
//!   once; a completion serves late requests straight from the buffer.
//! - Caching is best-effort and one-directional: a finished download
//!   feeds the cache, cache problems never break the download.
//!
//! This crate is composed of several modules:
//! - `loader`: `ProgressiveLoader`, the per-fetch coordinator.
//! - `ledger`: Pending range requests and the reconciliation pass.
//! - `buffer`: The append-only single-pass fetch buffer.
//! - `http`: The `FetchSource` transport seam and its `reqwest` impl.
//! - `handle`: Fetch identity (`ResourceHandle`, `OwnerTag`) and response
//!   metadata.
//! - `events`: Observer events and the `EventSink` callback.
//! - `settings`: Loader configuration.
//! - `error`: Unified error types.
//!
//! This file (`lib.rs`) acts as a facade: it re-exports the main types
//! and functions from the internal modules to form the public API of the
//! `media-cache-loader` crate.

mod buffer;
mod error;
mod events;
mod handle;
mod http;
mod ledger;
mod loader;
mod settings;

pub use crate::error::{LoadError, LoadResult};
pub use crate::events::{format_bytes, EventSink, LoaderEvent};
pub use crate::handle::{OwnerTag, ResourceHandle, ResponseMeta};
pub use crate::http::{shared_http_client, FetchResponse, FetchSource, HttpFetchSource};
pub use crate::ledger::{RangeId, RangeReceiver};
pub use crate::loader::{LoadPhase, ProgressiveLoader};
pub use crate::settings::{CachePolicy, LoaderSettings};

// Cache-side types that appear in this crate's API surface.
pub use media_cache::{Dimensions, MediaCache, ResourceKind, SourceId};

pub use bytes::Bytes;
pub use url::Url;
