//! Two-tier cache facade.
//!
//! [`MediaCache`] composes the bounded memory stores with the file-system
//! tier:
//!
//! - `get` checks memory first; a disk hit is promoted into memory so the
//!   next lookup needs no I/O.
//! - `put` writes the disk tier and populates memory.
//! - decoded-image lookups decode from the encoded tier on miss and cache
//!   the decoded value with a pixel-based cost.
//!
//! Both memory stores sit behind one lock scoped to the cache instance;
//! lock sections never perform I/O. Rendition production (resize,
//! transcode) is best-effort: a failed rendition is logged and skipped, it
//! never fails the put.

use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use image::DynamicImage;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::disk::DiskStore;
use crate::error::{CacheError, CacheResult};
use crate::memory::LruStore;
use crate::model::{CacheKey, Dimensions, ResourceKind, SizeVariant, SourceId};
use crate::naming;
use crate::resize;
use crate::settings::CacheSettings;

static SHARED: LazyLock<RwLock<Option<Arc<MediaCache>>>> = LazyLock::new(|| RwLock::new(None));

/// Both memory stores, guarded together by one lock.
struct MemoryTier {
    encoded: LruStore<CacheKey, Bytes>,
    decoded: LruStore<CacheKey, Arc<DynamicImage>>,
}

/// Two-tier durable media cache.
pub struct MediaCache {
    settings: CacheSettings,
    disk: DiskStore,
    memory: Mutex<MemoryTier>,
    transcode_cancel: Mutex<CancellationToken>,
}

impl MediaCache {
    /// Creates a cache instance and its on-disk layout.
    pub async fn new(settings: CacheSettings) -> CacheResult<Self> {
        let disk = DiskStore::new(settings.root.clone());
        disk.ensure_layout().await?;

        let memory = Mutex::new(MemoryTier {
            encoded: LruStore::new(
                "encoded",
                settings.encoded_max_entries,
                settings.encoded_max_cost,
            ),
            decoded: LruStore::new(
                "decoded",
                settings.decoded_max_entries,
                settings.decoded_max_cost,
            ),
        });

        debug!(root = ?settings.root, "media cache ready");
        Ok(Self {
            settings,
            disk,
            memory,
            transcode_cancel: Mutex::new(CancellationToken::new()),
        })
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    // ----------------------------
    // Lookups
    // ----------------------------

    /// Returns the encoded payload for a key, memory tier first.
    ///
    /// `Ok(None)` is a plain miss; errors are reserved for real storage
    /// failures.
    pub async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        if let Some(bytes) = self.memory.lock().encoded.get(key) {
            trace!(key = ?key, "memory hit");
            return Ok(Some(bytes));
        }

        let Some(bytes) = self.disk.read(key).await? else {
            trace!(key = ?key, "cache miss");
            return Ok(None);
        };

        trace!(key = ?key, len = bytes.len(), "disk hit, promoting into memory");
        self.memory
            .lock()
            .encoded
            .insert(key.clone(), bytes.clone(), bytes.len() as u64);
        Ok(Some(bytes))
    }

    /// Returns the decoded image for a key, decoding from the encoded tier
    /// on miss.
    ///
    /// Only meaningful for [`ResourceKind::Image`] keys; video keys always
    /// miss.
    pub async fn get_decoded_image(
        &self,
        key: &CacheKey,
    ) -> CacheResult<Option<Arc<DynamicImage>>> {
        if key.kind != ResourceKind::Image {
            return Ok(None);
        }

        if let Some(image) = self.memory.lock().decoded.get(key) {
            trace!(key = ?key, "decoded memory hit");
            return Ok(Some(image));
        }

        let Some(bytes) = self.get(key).await? else {
            return Ok(None);
        };

        let decoded = tokio::task::spawn_blocking(move || resize::decode(&bytes))
            .await
            .map_err(|e| CacheError::msg(format!("image decode task failed: {e}")))??;
        let decoded = Arc::new(decoded);

        let cost = resize::decoded_cost(&decoded);
        self.memory
            .lock()
            .decoded
            .insert(key.clone(), Arc::clone(&decoded), cost);
        Ok(Some(decoded))
    }

    /// Whether a payload for the key exists in either tier.
    pub async fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        if self.memory.lock().encoded.contains(key) {
            return Ok(true);
        }
        Ok(self.disk.find(key).await?.is_some())
    }

    /// Payload size for the key without reading it, if known.
    pub async fn len_hint(&self, key: &CacheKey) -> CacheResult<Option<u64>> {
        if let Some(cost) = self.memory.lock().encoded.cost_of(key) {
            return Ok(Some(cost));
        }
        self.disk.len_of(key).await
    }

    // ----------------------------
    // Writes
    // ----------------------------

    /// Stores the original payload of a source.
    pub async fn put_original(
        &self,
        source: SourceId,
        kind: ResourceKind,
        bytes: Bytes,
    ) -> CacheResult<()> {
        let key = CacheKey::original(source, kind);
        self.disk.write(&key, bytes.clone()).await?;

        let len = bytes.len() as u64;
        debug!(key = ?key, len, "stored original payload");
        self.memory.lock().encoded.insert(key, bytes, len);
        Ok(())
    }

    /// Produces and stores a sized rendition of an already-complete payload.
    ///
    /// Images are scaled on a blocking thread; videos go through the
    /// configured [`crate::transcode::VideoTranscoder`]. A rendition that
    /// cannot be produced is skipped, not an error.
    pub async fn put_sized(
        &self,
        source: SourceId,
        kind: ResourceKind,
        bytes: Bytes,
        target: Dimensions,
    ) -> CacheResult<()> {
        match kind {
            ResourceKind::Image => self.put_sized_image(source, bytes, target).await,
            ResourceKind::Video => self.put_sized_video(source, bytes, target).await,
        }
    }

    async fn put_sized_image(
        &self,
        source: SourceId,
        bytes: Bytes,
        target: Dimensions,
    ) -> CacheResult<()> {
        let key = CacheKey::sized(source, ResourceKind::Image, target);

        let input = bytes;
        let scaled = tokio::task::spawn_blocking(move || resize::scale_encoded(&input, target))
            .await
            .map_err(|e| CacheError::msg(format!("resize task failed: {e}")))?;

        let scaled = match scaled {
            Ok(scaled) => scaled,
            Err(e) => {
                warn!(key = ?key, error = %e, "image rendition failed, skipping variant");
                return Ok(());
            }
        };

        self.disk.write(&key, scaled.clone()).await?;
        let len = scaled.len() as u64;
        debug!(key = ?key, len, "stored image rendition");
        self.memory.lock().encoded.insert(key, scaled, len);
        Ok(())
    }

    async fn put_sized_video(
        &self,
        source: SourceId,
        bytes: Bytes,
        target: Dimensions,
    ) -> CacheResult<()> {
        let key = CacheKey::sized(source, ResourceKind::Video, target);
        let Some(transcoder) = self.settings.transcoder.clone() else {
            debug!(key = ?key, "no transcoder configured, skipping video rendition");
            return Ok(());
        };

        // Stage the payload as a scratch file for the external tool.
        let scratch = self.disk.scratch_dir();
        let suffix = format!(".{}", key.source.ext().unwrap_or("bin"));
        let staged = tokio::task::spawn_blocking(
            move || -> std::io::Result<tempfile::NamedTempFile> {
                use std::io::Write;
                let mut tmp = tempfile::Builder::new()
                    .prefix(".transcode-in-")
                    .suffix(&suffix)
                    .tempfile_in(&scratch)?;
                tmp.write_all(&bytes)?;
                tmp.flush()?;
                Ok(tmp)
            },
        )
        .await
        .map_err(|e| CacheError::msg(format!("transcode staging task failed: {e}")))?
        .map_err(|e| CacheError::Io(e).with_context("staging transcode input"))?;

        let output = self
            .disk
            .scratch_dir()
            .join(format!(
                ".out-{}",
                naming::variant_file_name(&key.source, SizeVariant::Sized(target))
            ));
        // A leftover from an interrupted run would confuse the tool.
        let _ = tokio::fs::remove_file(&output).await;

        let cancel = self.transcode_cancel.lock().child_token();
        let produced = transcoder
            .transcode(staged.path(), &output, target, &cancel)
            .await;
        drop(staged);

        let Some(produced) = produced else {
            debug!(key = ?key, "video rendition skipped");
            return Ok(());
        };

        let final_path = self.disk.adopt(&key, &produced).await?;
        match tokio::fs::read(&final_path).await {
            Ok(data) => {
                let data = Bytes::from(data);
                let len = data.len() as u64;
                debug!(key = ?key, len, "stored video rendition");
                self.memory.lock().encoded.insert(key, data, len);
            }
            Err(e) => {
                warn!(error = %e, "could not load produced rendition into memory");
            }
        }
        Ok(())
    }

    /// Cancels in-flight video transcode jobs. Later jobs are unaffected.
    pub fn cancel_transcodes(&self) {
        let mut guard = self.transcode_cancel.lock();
        guard.cancel();
        *guard = CancellationToken::new();
    }

    // ----------------------------
    // Deletes
    // ----------------------------

    /// Removes every variant of a source within one kind, from both tiers.
    pub async fn delete(&self, source: &SourceId, kind: ResourceKind) -> CacheResult<usize> {
        let removed = self.disk.delete_source(source, kind).await?;
        let mut memory = self.memory.lock();
        memory
            .encoded
            .retain(|k| !(k.kind == kind && &k.source == source));
        memory
            .decoded
            .retain(|k| !(k.kind == kind && &k.source == source));
        drop(memory);

        debug!(source = %source, kind = %kind, removed, "deleted cached source");
        Ok(removed)
    }

    /// Removes every variant of a source across both kinds.
    pub async fn delete_all(&self, source: &SourceId) -> CacheResult<usize> {
        let removed = self.disk.delete_source_all(source).await?;
        let mut memory = self.memory.lock();
        memory.encoded.retain(|k| &k.source != source);
        memory.decoded.retain(|k| &k.source != source);
        drop(memory);

        debug!(source = %source, removed, "deleted cached source everywhere");
        Ok(removed)
    }

    /// Empties one kind, from both tiers.
    pub async fn clear(&self, kind: ResourceKind) -> CacheResult<usize> {
        let removed = self.disk.clear_kind(kind).await?;
        let mut memory = self.memory.lock();
        memory.encoded.retain(|k| k.kind != kind);
        memory.decoded.retain(|k| k.kind != kind);
        drop(memory);

        debug!(kind = %kind, removed, "cleared cache kind");
        Ok(removed)
    }

    /// Empties everything, including scratch.
    pub async fn clear_all(&self) -> CacheResult<()> {
        self.disk.clear_all().await?;
        let mut memory = self.memory.lock();
        memory.encoded.clear();
        memory.decoded.clear();
        Ok(())
    }

    /// Removes partial/temporary files. Final files are untouched.
    pub async fn purge_scratch(&self) -> CacheResult<usize> {
        self.disk.purge_scratch().await
    }

    // ----------------------------
    // Shared instance lifecycle
    // ----------------------------

    /// Builds and installs the process-wide shared instance, replacing any
    /// previous one.
    pub async fn init_shared(settings: CacheSettings) -> CacheResult<Arc<MediaCache>> {
        let cache = Arc::new(MediaCache::new(settings).await?);
        *SHARED.write() = Some(Arc::clone(&cache));
        Ok(cache)
    }

    /// Returns the instance installed by [`MediaCache::init_shared`].
    pub fn shared() -> CacheResult<Arc<MediaCache>> {
        SHARED
            .read()
            .clone()
            .ok_or(CacheError::SharedNotInitialized)
    }

    /// Drops the shared instance. Existing handles stay valid, but
    /// [`MediaCache::shared`] fails until the next init.
    pub fn reset_shared() {
        *SHARED.write() = None;
    }
}
