//! Pending range requests and the reconciliation pass.
//!
//! Consumers ask for byte ranges before the bytes exist. Every request is
//! parked in the [`RangeLedger`] in submission order and re-examined after
//! each buffer mutation by [`reconcile`]: whatever part of the request is
//! buffered but not yet delivered is copied to the request's channel, the
//! request's cursor advances, and fully served requests retire. The pass
//! is pure bookkeeping over in-memory bytes; it never blocks and never
//! touches the network.

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tracing::trace;

use crate::buffer::FetchBuffer;
use crate::error::{LoadError, LoadResult};

/// Identifier of one range request, unique per loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeId(u64);

impl std::fmt::Display for RangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Consumer end of one range request.
///
/// Chunks arrive in offset order as they become available. The channel
/// closing without an error means the request was fully served (or clipped
/// at end of payload, or cancelled).
pub struct RangeReceiver {
    id: RangeId,
    rx: mpsc::UnboundedReceiver<LoadResult<Bytes>>,
}

impl RangeReceiver {
    /// Identifier to pass to [`crate::ProgressiveLoader::cancel_range`].
    pub fn id(&self) -> RangeId {
        self.id
    }

    /// Next delivered chunk, or `None` once the request is retired.
    pub async fn next_chunk(&mut self) -> Option<LoadResult<Bytes>> {
        self.rx.recv().await
    }

    /// Gathers every delivered chunk into one contiguous payload.
    pub async fn collect(mut self) -> LoadResult<Bytes> {
        let mut out = BytesMut::new();
        while let Some(item) = self.rx.recv().await {
            out.extend_from_slice(&item?);
        }
        Ok(out.freeze())
    }
}

/// One parked range request.
struct PendingRange {
    id: RangeId,
    /// First byte the consumer asked for.
    requested_offset: u64,
    /// One past the last requested byte; `None` for "until end of payload".
    requested_end: Option<u64>,
    /// Next byte to deliver. Starts at `requested_offset`.
    cursor: u64,
    tx: mpsc::UnboundedSender<LoadResult<Bytes>>,
}

impl PendingRange {
    /// Bytes still owed, measured from the cursor.
    fn remaining(&self) -> u64 {
        match self.requested_end {
            Some(end) => end.saturating_sub(self.cursor),
            None => u64::MAX,
        }
    }

    fn is_satisfied(&self) -> bool {
        self.requested_end.is_some_and(|end| self.cursor >= end)
    }
}

/// Submission-ordered set of pending range requests.
pub(crate) struct RangeLedger {
    next_id: u64,
    pending: Vec<PendingRange>,
}

impl RangeLedger {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            pending: Vec::new(),
        }
    }

    /// Parks a new request and returns its consumer end.
    pub(crate) fn submit(&mut self, offset: u64, len: Option<u64>) -> RangeReceiver {
        let id = self.allocate_id();
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending.push(PendingRange {
            id,
            requested_offset: offset,
            requested_end: len.map(|len| offset.saturating_add(len)),
            cursor: offset,
            tx,
        });
        trace!(id = %id, offset, len = ?len, "range request submitted");
        RangeReceiver { id, rx }
    }

    /// Builds an already-retired receiver carrying a single error.
    pub(crate) fn reject(&mut self, error: LoadError) -> RangeReceiver {
        let id = self.allocate_id();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Err(error));
        RangeReceiver { id, rx }
    }

    /// Removes a request if it is still pending. Idempotent.
    pub(crate) fn cancel(&mut self, id: RangeId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|req| req.id != id);
        let removed = self.pending.len() != before;
        if removed {
            trace!(id = %id, "range request cancelled");
        }
        removed
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn allocate_id(&mut self) -> RangeId {
        let id = RangeId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// What the fetch looked like when a reconciliation pass ran.
#[derive(Clone, Copy)]
pub(crate) enum ReconcileOutcome<'a> {
    /// More bytes may still arrive; unserved requests stay parked.
    InFlight,
    /// The payload is final; every request is clipped to it and retired.
    Completed,
    /// The fetch is over without a full payload; after delivering what the
    /// buffer holds, surviving requests receive this error.
    Failed(&'a LoadError),
}

/// Runs one delivery pass over every pending request, in submission order.
pub(crate) fn reconcile(
    buffer: &FetchBuffer,
    ledger: &mut RangeLedger,
    outcome: ReconcileOutcome<'_>,
) {
    let buffered = buffer.len();
    ledger.pending.retain_mut(|req| {
        let available = buffered.saturating_sub(req.cursor);
        let deliver = available.min(req.remaining());
        if deliver > 0 {
            let chunk = buffer.copy_range(req.cursor, deliver);
            if req.tx.send(Ok(chunk)).is_err() {
                trace!(id = %req.id, "range receiver dropped, retiring");
                return false;
            }
            req.cursor += deliver;
            trace!(id = %req.id, delivered = deliver, cursor = req.cursor, "range delivery");
        }
        if req.is_satisfied() {
            trace!(id = %req.id, "range fully served");
            return false;
        }
        match outcome {
            ReconcileOutcome::InFlight => true,
            ReconcileOutcome::Completed => {
                trace!(
                    id = %req.id,
                    served = req.cursor - req.requested_offset,
                    "range clipped at end of payload"
                );
                false
            }
            ReconcileOutcome::Failed(error) => {
                let _ = req.tx.send(Err(error.clone()));
                false
            }
        }
    });
}
