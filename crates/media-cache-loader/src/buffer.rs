//! Single-pass fetch buffer.
//!
//! One fetch accumulates into one [`FetchBuffer`]: bytes are only ever
//! appended, the buffer restarts from empty when response headers arrive,
//! and it freezes into an immutable payload at the terminal phase. Range
//! delivery copies out of the growing buffer and slices zero-copy out of
//! the frozen one.

use bytes::{Bytes, BytesMut};

use crate::handle::ResponseMeta;

/// Ceiling on capacity seeded from a declared content length. The header
/// is remote input, so growth past this bound is left to amortized appends.
const RESERVE_CAP: u64 = 64 * 1024;

pub(crate) struct FetchBuffer {
    data: BytesMut,
    frozen: Option<Bytes>,
    meta: Option<ResponseMeta>,
}

impl FetchBuffer {
    /// Empty buffer with no response seen yet.
    pub(crate) fn new() -> Self {
        Self {
            data: BytesMut::new(),
            frozen: None,
            meta: None,
        }
    }

    /// Buffer that starts frozen around a pre-supplied payload.
    pub(crate) fn preloaded(payload: Bytes, meta: ResponseMeta) -> Self {
        Self {
            data: BytesMut::new(),
            frozen: Some(payload),
            meta: Some(meta),
        }
    }

    /// Restarts accumulation for a fresh response.
    ///
    /// Headers always precede body bytes, so anything buffered before this
    /// point belonged to a previous exchange and is dropped.
    pub(crate) fn begin_response(&mut self, meta: ResponseMeta) {
        debug_assert!(self.frozen.is_none(), "response after terminal phase");
        self.data.clear();
        if let Some(total) = meta.total_len {
            self.data.reserve(total.min(RESERVE_CAP) as usize);
        }
        self.meta = Some(meta);
    }

    /// Appends one body chunk.
    pub(crate) fn append(&mut self, chunk: &[u8]) {
        debug_assert!(self.frozen.is_none(), "append after terminal phase");
        if self.frozen.is_none() {
            self.data.extend_from_slice(chunk);
        }
    }

    /// Seals the buffer; afterwards `payload` is available and slices are
    /// zero-copy. Idempotent.
    pub(crate) fn freeze(&mut self) {
        if self.frozen.is_none() {
            self.frozen = Some(std::mem::take(&mut self.data).freeze());
        }
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    /// Bytes buffered so far.
    pub(crate) fn len(&self) -> u64 {
        match &self.frozen {
            Some(payload) => payload.len() as u64,
            None => self.data.len() as u64,
        }
    }

    /// Response metadata, if a response has been seen (or synthesized).
    pub(crate) fn meta(&self) -> Option<&ResponseMeta> {
        self.meta.as_ref()
    }

    /// The sealed payload; `None` until [`FetchBuffer::freeze`].
    pub(crate) fn payload(&self) -> Option<Bytes> {
        self.frozen.clone()
    }

    /// Copies `len` bytes starting at `offset` out of the buffer.
    ///
    /// Callers must stay within `self.len()`; the reconciler computes its
    /// ranges from it.
    pub(crate) fn copy_range(&self, offset: u64, len: u64) -> Bytes {
        let start = offset as usize;
        let end = start + len as usize;
        match &self.frozen {
            Some(payload) => payload.slice(start..end),
            None => Bytes::copy_from_slice(&self.data[start..end]),
        }
    }
}
