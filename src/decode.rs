//! Decode primitives built on the `image` crate.
//!
//! Decodes run under an allocation budget (`image::Limits`); a breached
//! budget is reported as [`DecodeError::OutOfMemory`], which is the
//! recoverable resource-exhaustion class distinct from malformed input.

use crate::request::TargetSize;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageReader, Limits};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::trace;

/// Fixed aggressive down-sample factor applied to preview decodes,
/// regardless of the request's own sub-sample value.
pub const PREVIEW_SUBSAMPLE: u32 = 8;

/// Decode failures.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Source file missing, a directory, or not yet downloaded
    #[error("source not found: {0}")]
    NotFound(String),

    /// Bytes could not be parsed as a supported image
    #[error("failed to decode image: {0}")]
    Malformed(String),

    /// Decode exceeded the configured memory budget
    #[error("out of memory while decoding")]
    OutOfMemory,
}

impl From<ImageError> for DecodeError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Limits(_) => DecodeError::OutOfMemory,
            other => DecodeError::Malformed(other.to_string()),
        }
    }
}

fn alloc_limits(max_alloc: u64) -> Limits {
    let mut limits = Limits::default();
    limits.max_alloc = Some(max_alloc);
    limits
}

/// Reject a decode whose output buffer alone would breach the budget.
///
/// The decoder's own limits guard its internal allocations; this check
/// catches the final pixel buffer up front, before any pixels are
/// materialized.
fn check_budget(dimensions: (u32, u32), max_alloc: u64) -> Result<(), DecodeError> {
    let (width, height) = dimensions;
    let estimated = u64::from(width)
        .checked_mul(u64::from(height))
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(DecodeError::OutOfMemory)?;
    if estimated > max_alloc {
        return Err(DecodeError::OutOfMemory);
    }
    Ok(())
}

/// Apply a sub-sample factor by shrinking to `dims / factor`.
///
/// Nearest-neighbour keeps this cheap; sub-sampling trades quality for
/// speed and memory.
fn subsample(image: DynamicImage, factor: u32) -> DynamicImage {
    if factor <= 1 {
        return image;
    }
    let width = (image.width() / factor).max(1);
    let height = (image.height() / factor).max(1);
    trace!(factor, width, height, "sub-sampling decoded image");
    image.resize_exact(width, height, FilterType::Nearest)
}

/// Decode an image file, sub-sampled by `factor`, under `max_alloc` bytes.
///
/// # Errors
///
/// `NotFound` when the path does not exist or is a directory, `OutOfMemory`
/// when the decode would exceed the budget, `Malformed` otherwise.
pub fn decode_file(path: &Path, factor: u32, max_alloc: u64) -> Result<DynamicImage, DecodeError> {
    if !path.exists() || path.is_dir() {
        return Err(DecodeError::NotFound(path.display().to_string()));
    }

    if let Some(dimensions) = probe_file_size(path) {
        check_budget(dimensions, max_alloc)?;
    }

    let mut reader = ImageReader::open(path)
        .map_err(|e| DecodeError::Malformed(format!("{}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| DecodeError::Malformed(format!("{}: {}", path.display(), e)))?;
    reader.limits(alloc_limits(max_alloc));

    let image = reader.decode()?;
    Ok(subsample(image, factor))
}

/// Decode an in-memory image, sub-sampled by `factor`, under `max_alloc`
/// bytes.
pub fn decode_bytes(bytes: &[u8], factor: u32, max_alloc: u64) -> Result<DynamicImage, DecodeError> {
    if let Some(dimensions) = probe_bytes_size(bytes) {
        check_budget(dimensions, max_alloc)?;
    }

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;
    reader.limits(alloc_limits(max_alloc));

    let image = reader.decode()?;
    Ok(subsample(image, factor))
}

/// Rescale a decoded image to exactly the target dimensions.
///
/// Consumes the intermediate buffer; the pre-scale pixels are released as
/// soon as the rescaled copy exists.
pub fn rescale(image: DynamicImage, target: TargetSize) -> DynamicImage {
    if image.width() == target.width && image.height() == target.height {
        return image;
    }
    image.resize_exact(target.width, target.height, FilterType::Triangle)
}

/// Read image dimensions from a file without materializing pixels.
pub fn probe_file_size(path: &Path) -> Option<(u32, u32)> {
    if !path.exists() || path.is_dir() {
        return None;
    }
    ImageReader::open(path)
        .ok()?
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Read image dimensions from in-memory bytes without materializing pixels.
pub fn probe_bytes_size(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
