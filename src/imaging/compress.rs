//! Byte-budget compression loop.
//!
//! Degrade quality first, then resolution:
//!
//! ```text
//! attempt  width  quality
//!    1     1280     80     ─┐
//!    2     1280     65      │ quality steps down by 15 …
//!    3     1280     50      │
//!    4     1280     35      │
//!    5     1280     20     ─┘ … until it reaches the floor
//!    6     1088     20     ─┐
//!    7      925     20      │ then width shrinks by 0.85 (min 640)
//!    8      786     20     ─┘
//! fallback  640     20        returned unconditionally
//! ```
//!
//! The first attempt whose payload fits the budget is returned. The attempt
//! cap plus the unconditional fallback guarantee termination for any source.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{
    decoded_payload_len, fit_surface, height_for_width, initial_width, shrink_width,
};
use super::params::{CompressionSchedule, EncodeParams, Quality};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Output of [`compress`]: a JPEG data URI plus how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
    /// Payload size in bytes, derived from the base64 length.
    pub size: usize,
    /// Number of budgeted attempts made (the fallback pass is not counted).
    pub attempts: u32,
    /// True when no attempt met the budget and the forced fallback was used.
    pub fallback: bool,
}

impl CompressedImage {
    /// Decode the data URI back into raw JPEG bytes.
    pub fn jpeg_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let b64 = self
            .data_uri
            .split_once(',')
            .map(|(_, body)| body)
            .unwrap_or(&self.data_uri);
        STANDARD.decode(b64)
    }
}

fn jpeg_data_uri(bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes))
}

/// Compress `image` until its JPEG payload is at most `target_bytes`.
///
/// Fails only if the backend cannot create a raster surface or encode; for
/// any decodable image it always returns a payload.
pub fn compress<B: ImageBackend>(
    backend: &B,
    image: &B::Image,
    schedule: &CompressionSchedule,
    target_bytes: usize,
) -> Result<CompressedImage, BackendError> {
    let source = backend.dimensions(image);
    let source_dims = (source.width, source.height);
    let max_pixels = backend.max_surface_pixels();
    let fit = |width: u32| fit_surface(source_dims, width, max_pixels);

    let mut width = fit(initial_width(source.width, schedule.max_width));
    let mut height = height_for_width(source_dims, width);
    let mut quality = schedule.initial_quality.max(schedule.min_quality);

    for attempt in 1..=schedule.max_attempts {
        let bytes = backend.encode_jpeg(
            image,
            &EncodeParams {
                width,
                height,
                quality,
            },
        )?;
        let data_uri = jpeg_data_uri(&bytes);
        let size = decoded_payload_len(&data_uri).unwrap_or(usize::MAX);

        tracing::debug!(
            attempt,
            width,
            height,
            quality = quality.value(),
            size,
            target_bytes,
            "compression attempt"
        );

        if size <= target_bytes {
            return Ok(CompressedImage {
                data_uri,
                width,
                height,
                quality,
                size,
                attempts: attempt,
                fallback: false,
            });
        }

        if quality > schedule.min_quality {
            quality = quality.lowered(schedule.quality_step, schedule.min_quality);
        } else {
            width = fit(shrink_width(width, schedule.width_factor, schedule.min_width));
            height = height_for_width(source_dims, width);
        }
    }

    let width = fit(schedule.min_width);
    let height = height_for_width(source_dims, width);
    let quality = schedule.min_quality;
    let bytes = backend.encode_jpeg(
        image,
        &EncodeParams {
            width,
            height,
            quality,
        },
    )?;
    let data_uri = jpeg_data_uri(&bytes);
    let size = decoded_payload_len(&data_uri).unwrap_or(usize::MAX);
    tracing::debug!(width, height, size, "compression fallback");

    Ok(CompressedImage {
        data_uri,
        width,
        height,
        quality,
        size,
        attempts: schedule.max_attempts,
        fallback: true,
    })
}
