//! Aspect-fit image scaling.
//!
//! Sized image variants are produced by scaling the decoded source with a
//! uniform ratio so the result fits within the target box. The ratio is
//! capped at 1.0: the cache never upscales a source. Re-encoding keeps the
//! source format, so a `.png` source yields a `.png` rendition.
//!
//! Everything here is synchronous and CPU-bound; callers run it on a
//! blocking thread.

use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::trace;

use crate::error::{CacheError, CacheResult};
use crate::model::Dimensions;

/// Bytes-per-pixel estimate for decoded-image cost accounting.
const BYTES_PER_PIXEL: u64 = 4;

/// Memory cost of a decoded image: pixel dimensions times the
/// bytes-per-pixel estimate.
pub fn decoded_cost(image: &DynamicImage) -> u64 {
    let (w, h) = image.dimensions();
    u64::from(w) * u64::from(h) * BYTES_PER_PIXEL
}

/// Computes the aspect-fit dimensions for scaling `source` into `target`.
///
/// The uniform ratio is `min(target_w / w, target_h / h)`, capped at 1.0 so
/// the source is never upscaled. Each axis rounds to at least one pixel.
pub fn fit_within(source: Dimensions, target: Dimensions) -> Dimensions {
    if source.width == 0 || source.height == 0 {
        return source;
    }

    let ratio_w = f64::from(target.width) / f64::from(source.width);
    let ratio_h = f64::from(target.height) / f64::from(source.height);
    let ratio = ratio_w.min(ratio_h).min(1.0);

    Dimensions {
        width: ((f64::from(source.width) * ratio).round() as u32).max(1),
        height: ((f64::from(source.height) * ratio).round() as u32).max(1),
    }
}

/// Decodes an image payload.
pub(crate) fn decode(bytes: &[u8]) -> CacheResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(CacheError::image)
}

/// Scales an encoded image payload to fit within `target`, re-encoding in
/// the source format.
///
/// When the fit dimensions equal the source dimensions (the target does not
/// downscale), the payload is returned unchanged.
pub(crate) fn scale_encoded(bytes: &Bytes, target: Dimensions) -> CacheResult<Bytes> {
    let format = image::guess_format(bytes).map_err(CacheError::image)?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(CacheError::image)?;

    let (w, h) = img.dimensions();
    let fitted = fit_within(Dimensions::new(w, h), target);
    if fitted.width == w && fitted.height == h {
        trace!(
            source = %Dimensions::new(w, h),
            target = %target,
            "target does not downscale, keeping original payload"
        );
        return Ok(bytes.clone());
    }

    let scaled = img.resize_exact(fitted.width, fitted.height, FilterType::Lanczos3);
    let mut out = Cursor::new(Vec::new());
    scaled
        .write_to(&mut out, format)
        .map_err(CacheError::image)?;
    Ok(Bytes::from(out.into_inner()))
}
