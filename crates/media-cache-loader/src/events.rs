//! Loader observer events.
//!
//! Events are pushed through an [`EventSink`] callback rather than a
//! channel: the observer is typically UI-adjacent code that wants every
//! update synchronously and never blocks. Events are `Clone` so one sink
//! can fan them out further.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::LoadError;

/// Callback invoked for every lifecycle event of a loader.
///
/// Must be cheap and non-blocking; it is called from the fetch task and,
/// for pre-supplied payloads, from the constructor.
pub type EventSink = Arc<dyn Fn(LoaderEvent) + Send + Sync>;

/// Lifecycle events emitted by a [`crate::ProgressiveLoader`].
#[derive(Debug, Clone)]
pub enum LoaderEvent {
    /// Bytes arrived and were folded into the buffer.
    Progress {
        /// Total bytes buffered so far.
        received: u64,
        /// Declared payload length, when the server sent one.
        total: Option<u64>,
        /// `received / total`, clamped to `1.0`; absent while the total is
        /// unknown.
        fraction: Option<f32>,
        /// Human-readable summary such as `"1.2 MiB / 8.0 MiB"`.
        detail: String,
    },
    /// The fetch finished and the buffer is final.
    Completed {
        /// The complete payload.
        bytes: Bytes,
    },
    /// The fetch ended without a complete payload.
    Failed {
        /// What went wrong.
        error: LoadError,
    },
}

impl LoaderEvent {
    pub(crate) fn progress(received: u64, total: Option<u64>) -> Self {
        let fraction = total.map(|total| {
            if total == 0 {
                1.0
            } else {
                (received as f64 / total as f64).min(1.0) as f32
            }
        });
        let detail = match total {
            Some(total) => format!("{} / {}", format_bytes(received), format_bytes(total)),
            None => format_bytes(received),
        };
        Self::Progress {
            received,
            total,
            fraction,
            detail,
        }
    }
}

/// Convert bytes to a human-readable size.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
