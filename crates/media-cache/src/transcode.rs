//! Video transcode seam.
//!
//! Sized video variants are produced by an external transcoder. The trait
//! is deliberately best-effort: a rendition that cannot be produced is
//! skipped, never an error the caller has to handle. Jobs are cancellable
//! through a [`CancellationToken`]; cancellation kills the external
//! process and discards any partial output (which lives in the scratch
//! directory and is reclaimed by the next purge).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::model::Dimensions;

/// Produces a sized rendition of a video file.
///
/// Returns the produced file on success, `None` when the rendition was
/// skipped or failed. Implementations log their own failures.
#[async_trait]
pub trait VideoTranscoder: Send + Sync {
    /// Transcodes `input` into `output`, scaled to fit within `target`.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        target: Dimensions,
        cancel: &CancellationToken,
    ) -> Option<PathBuf>;
}

/// Transcoder that never produces output.
///
/// With this transcoder configured (or none at all), sized video variants
/// are skipped while image variants keep working.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTranscoder;

#[async_trait]
impl VideoTranscoder for NullTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        _output: &Path,
        target: Dimensions,
        _cancel: &CancellationToken,
    ) -> Option<PathBuf> {
        debug!(input = ?input, target = %target, "null transcoder, skipping rendition");
        None
    }
}

/// Transcoder shelling out to `ffmpeg`.
///
/// The scale filter uses `force_original_aspect_ratio=decrease`, matching
/// the aspect-fit behavior of the image pipeline. Audio streams are copied
/// unchanged.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
}

impl FfmpegTranscoder {
    /// Uses `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: "ffmpeg".to_string(),
        }
    }

    /// Uses an explicit binary path or name.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoTranscoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        target: Dimensions,
        cancel: &CancellationToken,
    ) -> Option<PathBuf> {
        let scale = format!(
            "scale={}:{}:force_original_aspect_ratio=decrease",
            target.width, target.height
        );

        let mut child = match Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-vf")
            .arg(&scale)
            .arg("-c:a")
            .arg("copy")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.program, error = %e, "failed to spawn transcoder");
                return None;
            }
        };

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(input = ?input, "transcode cancelled, killing child process");
                let _ = child.start_kill();
                let _ = child.wait().await;
                return None;
            }
            status = child.wait() => status,
        };

        match status {
            Ok(s) if s.success() => {
                if tokio::fs::try_exists(output).await.unwrap_or(false) {
                    debug!(output = ?output, target = %target, "transcode finished");
                    Some(output.to_path_buf())
                } else {
                    warn!(output = ?output, "transcoder exited cleanly but produced no file");
                    None
                }
            }
            Ok(s) => {
                warn!(status = %s, input = ?input, "transcoder failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "waiting for transcoder failed");
                None
            }
        }
    }
}
