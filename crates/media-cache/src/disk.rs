//! File-system tier of the cache.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/videos/    final video files
//! <root>/images/    final image files
//! <root>/scratch/   partial and temporary files, safe to delete at any time
//! ```
//!
//! Final files are never written in place: payloads land in a scratch-dir
//! temp file first and are renamed into the kind directory, so a reader can
//! never observe a partially written final file. Lookups scan the kind
//! directory with a boundary-checked prefix match (see [`crate::naming`]),
//! so the store needs no index and survives process restarts as-is.
//!
//! Bulk operations (source deletes, clears, scratch purges) are
//! best-effort: individual failures are logged and skipped so one stuck
//! file cannot wedge the whole cache.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tracing::{trace, warn};

use crate::error::{CacheError, CacheResult};
use crate::model::{CacheKey, ResourceKind, SourceId};
use crate::naming;

const SCRATCH_DIR: &str = "scratch";

pub(crate) struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Creates the kind directories and the scratch directory.
    pub(crate) async fn ensure_layout(&self) -> CacheResult<()> {
        for dir in [
            self.kind_dir(ResourceKind::Video),
            self.kind_dir(ResourceKind::Image),
            self.scratch_dir(),
        ] {
            fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    pub(crate) fn kind_dir(&self, kind: ResourceKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    pub(crate) fn scratch_dir(&self) -> PathBuf {
        self.root.join(SCRATCH_DIR)
    }

    // ----------------------------
    // Lookups
    // ----------------------------

    /// Finds the stored file for a key, if any.
    pub(crate) async fn find(&self, key: &CacheKey) -> CacheResult<Option<PathBuf>> {
        let prefix = naming::variant_prefix(&key.source, key.variant);
        let dir = self.kind_dir(key.kind);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io(e).with_context("listing cache directory")),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if naming::matches_variant(name, &prefix) {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    /// Reads the stored payload for a key.
    pub(crate) async fn read(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        let Some(path) = self.find(key).await? else {
            return Ok(None);
        };
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            // Deleted between the scan and the read. A miss, not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e).with_context("reading cached file")),
        }
    }

    /// Size of the stored file for a key, if present.
    pub(crate) async fn len_of(&self, key: &CacheKey) -> CacheResult<Option<u64>> {
        let Some(path) = self.find(key).await? else {
            return Ok(None);
        };
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ----------------------------
    // Writes
    // ----------------------------

    /// Atomically stores a payload under the key's deterministic name.
    ///
    /// The bytes are written to a scratch temp file and renamed into place,
    /// then any stale file sharing the variant prefix (a leftover with a
    /// different extension) is removed.
    pub(crate) async fn write(&self, key: &CacheKey, bytes: Bytes) -> CacheResult<PathBuf> {
        let file_name = naming::variant_file_name(&key.source, key.variant);
        let final_path = self.kind_dir(key.kind).join(&file_name);
        let scratch = self.scratch_dir();

        let path = final_path.clone();
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<PathBuf> {
            let mut tmp = tempfile::Builder::new()
                .prefix(".partial-")
                .tempfile_in(&scratch)?;
            tmp.write_all(&bytes)?;
            tmp.flush()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(path)
        })
        .await
        .map_err(|e| CacheError::msg(format!("cache write task failed: {e}")))?
        .map_err(|e| CacheError::Io(e).with_context("storing cached file"))?;

        self.remove_stale_siblings(key, &file_name).await;
        trace!(path = ?written, "stored cache file");
        Ok(written)
    }

    /// Moves an already-produced scratch file into its final name.
    ///
    /// Used for transcode outputs, which are written by an external tool
    /// directly into the scratch directory.
    pub(crate) async fn adopt(&self, key: &CacheKey, produced: &Path) -> CacheResult<PathBuf> {
        let file_name = naming::variant_file_name(&key.source, key.variant);
        let final_path = self.kind_dir(key.kind).join(&file_name);

        fs::rename(produced, &final_path)
            .await
            .map_err(|e| CacheError::Io(e).with_context("promoting scratch file"))?;

        self.remove_stale_siblings(key, &file_name).await;
        trace!(path = ?final_path, "adopted scratch file");
        Ok(final_path)
    }

    // ----------------------------
    // Deletes
    // ----------------------------

    /// Removes every variant of a source within one kind directory.
    pub(crate) async fn delete_source(
        &self,
        source: &SourceId,
        kind: ResourceKind,
    ) -> CacheResult<usize> {
        let prefix = naming::source_prefix(source);
        self.remove_matching(&self.kind_dir(kind), |name| {
            naming::matches_source(name, &prefix)
        })
        .await
    }

    /// Removes every variant of a source from both kind directories.
    pub(crate) async fn delete_source_all(&self, source: &SourceId) -> CacheResult<usize> {
        let videos = self.delete_source(source, ResourceKind::Video).await?;
        let images = self.delete_source(source, ResourceKind::Image).await?;
        Ok(videos + images)
    }

    /// Removes every file of one kind.
    pub(crate) async fn clear_kind(&self, kind: ResourceKind) -> CacheResult<usize> {
        self.remove_matching(&self.kind_dir(kind), |_| true).await
    }

    /// Removes every partial/temporary file. Final files are untouched.
    pub(crate) async fn purge_scratch(&self) -> CacheResult<usize> {
        self.remove_matching(&self.scratch_dir(), |_| true).await
    }

    /// Empties both kind directories and the scratch directory.
    pub(crate) async fn clear_all(&self) -> CacheResult<()> {
        self.clear_kind(ResourceKind::Video).await?;
        self.clear_kind(ResourceKind::Image).await?;
        self.purge_scratch().await?;
        Ok(())
    }

    // ----------------------------
    // Internals
    // ----------------------------

    /// Removes files in `dir` whose name satisfies `matches`, skipping
    /// failures. Returns the number of files removed.
    async fn remove_matching(
        &self,
        dir: &Path,
        matches: impl Fn(&str) -> bool,
    ) -> CacheResult<usize> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CacheError::Io(e).with_context("listing cache directory")),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !matches(name) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = ?entry.path(), error = %e, "failed to remove cache file");
                }
            }
        }
        Ok(removed)
    }

    /// Removes leftovers that share the variant prefix but not the final
    /// file name (e.g. the same rendition stored earlier with a different
    /// extension). Best-effort.
    async fn remove_stale_siblings(&self, key: &CacheKey, keep_name: &str) {
        let prefix = naming::variant_prefix(&key.source, key.variant);
        let result = self
            .remove_matching(&self.kind_dir(key.kind), |name| {
                name != keep_name && naming::matches_variant(name, &prefix)
            })
            .await;
        match result {
            Ok(0) => {}
            Ok(n) => trace!(count = n, prefix = %prefix, "removed stale cache files"),
            Err(e) => warn!(error = %e, "stale cache file cleanup failed"),
        }
    }
}
