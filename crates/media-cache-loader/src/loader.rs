//! Progressive download coordinator.
//!
//! One [`ProgressiveLoader`] drives one fetch: bytes are downloaded in a
//! single forward pass into an append-only buffer, consumers ask for byte
//! ranges that are served incrementally as coverage grows, and the
//! finished payload is handed to the durable cache. Phase transitions are
//! strictly `Idle -> Fetching -> {Completed, Failed}`; both terminal
//! phases are sticky.
//!
//! All coordinator state (phase, buffer, pending ranges) lives behind one
//! mutex, so fetch-task callbacks and consumer submissions interleave
//! safely regardless of which thread they arrive on. Every mutation ends
//! with one reconciliation pass; the observer sink is always invoked
//! outside the lock.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use media_cache::{CacheKey, MediaCache};

use crate::buffer::FetchBuffer;
use crate::error::LoadError;
use crate::events::{EventSink, LoaderEvent};
use crate::handle::{ResourceHandle, ResponseMeta};
use crate::http::{FetchSource, HttpFetchSource};
use crate::ledger::{reconcile, RangeId, RangeLedger, RangeReceiver, ReconcileOutcome};
use crate::settings::{CachePolicy, LoaderSettings};

/// Lifecycle phase of one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Created, no network activity yet.
    Idle,
    /// The fetch task is running.
    Fetching,
    /// The full payload is buffered and final.
    Completed,
    /// The fetch ended without a full payload; the error is stored.
    Failed,
}

impl LoadPhase {
    /// True once the phase can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadPhase::Completed | LoadPhase::Failed)
    }
}

struct CoordinatorState {
    phase: LoadPhase,
    buffer: FetchBuffer,
    ledger: RangeLedger,
    failure: Option<LoadError>,
}

/// State shared between the public handle and the fetch task.
struct LoaderShared {
    handle: ResourceHandle,
    settings: LoaderSettings,
    cache: Option<Arc<MediaCache>>,
    sink: EventSink,
    cancel: CancellationToken,
    state: Mutex<CoordinatorState>,
}

impl LoaderShared {
    fn on_headers(&self, meta: ResponseMeta) {
        debug!(
            "response opened url='{}' content_type={:?} total={:?}",
            self.handle.url, meta.content_type, meta.total_len
        );
        let mut guard = self.state.lock();
        if guard.phase.is_terminal() {
            return;
        }
        guard.buffer.begin_response(meta);
    }

    fn on_chunk(&self, chunk: Bytes) {
        let event = {
            let mut guard = self.state.lock();
            if guard.phase.is_terminal() {
                return;
            }
            let st = &mut *guard;
            st.buffer.append(&chunk);
            reconcile(&st.buffer, &mut st.ledger, ReconcileOutcome::InFlight);
            LoaderEvent::progress(st.buffer.len(), st.buffer.meta().and_then(|m| m.total_len))
        };
        (self.sink)(event);
    }

    /// Terminal success: freeze, run the last delivery pass, commit, notify.
    async fn complete(&self) {
        let payload = {
            let mut guard = self.state.lock();
            if guard.phase.is_terminal() {
                return;
            }
            let st = &mut *guard;
            st.buffer.freeze();
            reconcile(&st.buffer, &mut st.ledger, ReconcileOutcome::Completed);
            st.phase = LoadPhase::Completed;
            st.buffer.payload().unwrap_or_default()
        };
        debug!(
            "progressive fetch completed url='{}' ({} bytes)",
            self.handle.url,
            payload.len()
        );
        self.commit(payload.clone()).await;
        (self.sink)(LoaderEvent::Completed { bytes: payload });
    }

    /// Terminal failure: one final delivery pass serves whatever the buffer
    /// already covers, then every surviving request receives the error.
    fn fail(&self, error: LoadError) {
        {
            let mut guard = self.state.lock();
            if guard.phase.is_terminal() {
                return;
            }
            let st = &mut *guard;
            st.buffer.freeze();
            reconcile(&st.buffer, &mut st.ledger, ReconcileOutcome::Failed(&error));
            st.phase = LoadPhase::Failed;
            st.failure = Some(error.clone());
        }
        if matches!(error, LoadError::Cancelled) {
            debug!("progressive fetch cancelled url='{}'", self.handle.url);
        } else {
            warn!("progressive fetch failed url='{}': {}", self.handle.url, error);
        }
        (self.sink)(LoaderEvent::Failed { error });
    }

    /// Best-effort durable commit; never surfaces to the consumer.
    async fn commit(&self, payload: Bytes) {
        if self.settings.cache_policy == CachePolicy::Bypass {
            trace!("cache commit skipped by policy url='{}'", self.handle.url);
            return;
        }
        let Some(cache) = &self.cache else {
            return;
        };

        let source = self.handle.source_id();
        if let Err(e) = cache
            .put_original(source.clone(), self.handle.kind, payload.clone())
            .await
        {
            warn!("cache commit failed key='{}': {}", source, e);
        }

        if let Some(target) = self.settings.target_size {
            if let Err(e) = cache
                .put_sized(source.clone(), self.handle.kind, payload, target)
                .await
            {
                warn!("sized commit failed key='{}' target={}: {}", source, target, e);
            }
        }
    }
}

/// Runs the whole fetch: open, stream, terminal transition.
async fn run_fetch(shared: Arc<LoaderShared>, source: Arc<dyn FetchSource>) {
    let opened = tokio::select! {
        biased;
        _ = shared.cancel.cancelled() => {
            shared.fail(LoadError::Cancelled);
            return;
        }
        res = source.open(&shared.handle.url, &shared.cancel) => res,
    };

    let mut body = match opened {
        Ok(response) => {
            shared.on_headers(response.meta);
            response.body
        }
        Err(e) => {
            shared.fail(e);
            return;
        }
    };

    loop {
        // Cancellable read of the next chunk, with an optional idle timeout
        // (no bytes within the window counts as a transport failure).
        let next = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => {
                shared.fail(LoadError::Cancelled);
                return;
            }
            item = async {
                if let Some(d) = shared.settings.idle_timeout {
                    match tokio::time::timeout(d, body.next()).await {
                        Ok(v) => Ok(v),
                        Err(_) => Err(()),
                    }
                } else {
                    Ok(body.next().await)
                }
            } => {
                match item {
                    Ok(v) => v,
                    Err(()) => {
                        shared.fail(LoadError::transport(format!(
                            "idle timeout (url={})",
                            shared.handle.url
                        )));
                        return;
                    }
                }
            },
        };

        match next {
            Some(Ok(chunk)) => shared.on_chunk(chunk),
            Some(Err(e)) => {
                shared.fail(e);
                return;
            }
            None => break,
        }
    }

    shared.complete().await;
}

/// Coordinator for one progressive media fetch.
///
/// Must be created within a Tokio runtime context; the fetch task is
/// spawned on the runtime that created the loader, while range submission
/// and cancellation may come from any thread.
///
/// Dropping the loader cancels an in-flight fetch.
pub struct ProgressiveLoader {
    shared: Arc<LoaderShared>,
    source: Option<Arc<dyn FetchSource>>,
    runtime: Handle,
}

impl ProgressiveLoader {
    /// Creates an idle loader that will fetch over HTTP.
    pub fn new(
        handle: ResourceHandle,
        settings: LoaderSettings,
        cache: Option<Arc<MediaCache>>,
        sink: EventSink,
    ) -> Self {
        let source = Arc::new(HttpFetchSource::new(settings.request_timeout));
        Self::with_fetch_source(handle, settings, cache, sink, source)
    }

    /// Creates an idle loader over a caller-supplied transport.
    pub fn with_fetch_source(
        handle: ResourceHandle,
        settings: LoaderSettings,
        cache: Option<Arc<MediaCache>>,
        sink: EventSink,
        source: Arc<dyn FetchSource>,
    ) -> Self {
        Self {
            shared: Arc::new(LoaderShared {
                handle,
                settings,
                cache,
                sink,
                cancel: CancellationToken::new(),
                state: Mutex::new(CoordinatorState {
                    phase: LoadPhase::Idle,
                    buffer: FetchBuffer::new(),
                    ledger: RangeLedger::new(),
                    failure: None,
                }),
            }),
            source: Some(source),
            runtime: Handle::current(),
        }
    }

    /// Creates a loader around a payload that is already complete.
    ///
    /// The loader starts in [`LoadPhase::Completed`], never touches the
    /// network, and synthesizes response metadata from the payload. The
    /// sink receives the `Completed` event immediately.
    pub fn with_preloaded(handle: ResourceHandle, bytes: Bytes, sink: EventSink) -> Self {
        let meta = ResponseMeta::synthesized(&handle, bytes.len() as u64);
        let loader = Self {
            shared: Arc::new(LoaderShared {
                handle,
                settings: LoaderSettings::default(),
                cache: None,
                sink,
                cancel: CancellationToken::new(),
                state: Mutex::new(CoordinatorState {
                    phase: LoadPhase::Completed,
                    buffer: FetchBuffer::preloaded(bytes.clone(), meta),
                    ledger: RangeLedger::new(),
                    failure: None,
                }),
            }),
            source: None,
            runtime: Handle::current(),
        };
        (loader.shared.sink)(LoaderEvent::Completed { bytes });
        loader
    }

    /// Opens through the durable cache: a cached original payload yields a
    /// pre-supplied loader, anything else yields an idle fetching loader.
    ///
    /// Cache read errors are treated as misses.
    pub async fn open_or_fetch(
        handle: ResourceHandle,
        settings: LoaderSettings,
        cache: Arc<MediaCache>,
        sink: EventSink,
    ) -> Self {
        let key = CacheKey::original(handle.source_id(), handle.kind);
        match cache.get(&key).await {
            Ok(Some(bytes)) => {
                debug!("cache: HIT key='{}' ({} bytes)", key.source, bytes.len());
                return Self::with_preloaded(handle, bytes, sink);
            }
            Ok(None) => {
                debug!("cache: MISS key='{}'", key.source);
            }
            Err(e) => {
                warn!("cache read failed key='{}', fetching: {}", key.source, e);
            }
        }
        Self::new(handle, settings, Some(cache), sink)
    }

    /// Starts the fetch task. No-op unless the loader is idle.
    pub fn start(&self) {
        let Some(source) = self.source.clone() else {
            return;
        };
        {
            let mut guard = self.shared.state.lock();
            if guard.phase != LoadPhase::Idle {
                return;
            }
            guard.phase = LoadPhase::Fetching;
        }
        debug!(
            "starting progressive fetch url='{}' owner='{}'",
            self.shared.handle.url, self.shared.handle.owner
        );
        self.runtime.spawn(run_fetch(Arc::clone(&self.shared), source));
    }

    /// Submits a byte-range request.
    ///
    /// `len: None` means "until end of payload". Whatever the buffer
    /// already covers is delivered before this returns; the rest arrives
    /// through the receiver as the fetch progresses. Submitting to an idle
    /// loader starts the fetch.
    pub fn request_range(&self, offset: u64, len: Option<u64>) -> RangeReceiver {
        let (receiver, start_fetch) = {
            let mut guard = self.shared.state.lock();
            let st = &mut *guard;

            if len.is_some_and(|len| offset.checked_add(len).is_none()) {
                return st
                    .ledger
                    .reject(LoadError::InvalidRange("requested end overflows"));
            }

            if st.phase == LoadPhase::Failed {
                let stored = st.failure.clone().unwrap_or(LoadError::Cancelled);
                return st.ledger.reject(LoadError::Failed(stored.to_string()));
            }

            let receiver = st.ledger.submit(offset, len);
            let outcome = if st.phase == LoadPhase::Completed {
                ReconcileOutcome::Completed
            } else {
                ReconcileOutcome::InFlight
            };
            reconcile(&st.buffer, &mut st.ledger, outcome);
            (receiver, st.phase == LoadPhase::Idle)
        };

        if start_fetch {
            self.start();
        }
        receiver
    }

    /// Cancels one pending range request. Idempotent; unknown or already
    /// retired ids are ignored. The fetch itself keeps running.
    pub fn cancel_range(&self, id: RangeId) {
        self.shared.state.lock().ledger.cancel(id);
    }

    /// Cancels the fetch: stops the task, fails pending requests with
    /// [`LoadError::Cancelled`]. Idempotent; a completed loader is
    /// unaffected apart from the token.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
        self.shared.fail(LoadError::Cancelled);
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LoadPhase {
        self.shared.state.lock().phase
    }

    /// Bytes buffered so far.
    pub fn buffered_len(&self) -> u64 {
        self.shared.state.lock().buffer.len()
    }

    /// Response metadata, once a response has been seen (or synthesized).
    pub fn metadata(&self) -> Option<ResponseMeta> {
        self.shared.state.lock().buffer.meta().cloned()
    }

    /// Identity this loader fetches.
    pub fn handle(&self) -> &ResourceHandle {
        &self.shared.handle
    }
}

impl Drop for ProgressiveLoader {
    fn drop(&mut self) {
        // The owner is gone; a still-running fetch task notices the token
        // and fails pending requests with `Cancelled`.
        self.shared.cancel.cancel();
    }
}
