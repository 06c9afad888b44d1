//! Pure Rust raster backend on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with format sniffing |
//! | Render at size | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::EncodeParams;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageReader};
use std::io::Cursor;

/// Largest raster surface we agree to allocate, in pixels.
///
/// Matches the common browser canvas area limit (16384 x 16384).
pub const MAX_SURFACE_PIXELS: u64 = 16_384 * 16_384;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy)]
pub struct RustBackend {
    max_surface_pixels: u64,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            max_surface_pixels: MAX_SURFACE_PIXELS,
        }
    }

    /// Use a smaller surface limit than [`MAX_SURFACE_PIXELS`].
    pub fn with_surface_limit(pixels: u64) -> Self {
        Self {
            max_surface_pixels: pixels.min(MAX_SURFACE_PIXELS),
        }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject surfaces that are empty or too large to allocate.
fn check_surface(width: u32, height: u32, limit: u64) -> Result<(), BackendError> {
    if width == 0 || height == 0 {
        return Err(BackendError::Surface(format!(
            "cannot create a {width}x{height} surface"
        )));
    }
    if width as u64 * height as u64 > limit {
        return Err(BackendError::Surface(format!(
            "{width}x{height} exceeds the {limit} pixel surface limit"
        )));
    }
    Ok(())
}

impl ImageBackend for RustBackend {
    type Image = DynamicImage;

    fn decode(&self, data: &[u8]) -> Result<DynamicImage, BackendError> {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .decode()
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn dimensions(&self, image: &DynamicImage) -> Dimensions {
        Dimensions {
            width: image.width(),
            height: image.height(),
        }
    }

    fn encode_jpeg(
        &self,
        image: &DynamicImage,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, BackendError> {
        check_surface(params.width, params.height, self.max_surface_pixels)?;

        let rendered = if image.width() == params.width && image.height() == params.height {
            image.to_rgb8()
        } else {
            image
                .resize_exact(params.width, params.height, FilterType::Lanczos3)
                .to_rgb8()
        };

        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, params.quality.as_jpeg());
        encoder
            .encode(
                rendered.as_raw(),
                rendered.width(),
                rendered.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| BackendError::Encode(e.to_string()))?;
        Ok(buf)
    }

    fn max_surface_pixels(&self) -> u64 {
        self.max_surface_pixels
    }
}
