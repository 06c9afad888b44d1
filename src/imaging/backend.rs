//! Raster backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the compressor needs
//! from a raster engine: decode bytes into a bitmap, and render that bitmap at
//! a given size into a JPEG payload.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust on top of the
//! `image` crate. Tests use a recording mock whose "encoded" size is a
//! function of the requested dimensions and quality.

use super::params::EncodeParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Input is not a decodable raster image (or not a valid data URI).
    #[error("Decode failed: {0}")]
    Decode(String),
    /// The off-screen raster surface could not be created.
    #[error("Raster surface unavailable: {0}")]
    Surface(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Natural pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for raster backends.
///
/// `Image` is the backend's decoded-bitmap handle. The compressor only ever
/// asks it for its dimensions and hands it back to [`encode_jpeg`](Self::encode_jpeg),
/// so a mock can use a plain [`Dimensions`] value.
pub trait ImageBackend: Send + Sync {
    type Image: Send;

    /// Decode raw file bytes into a bitmap.
    fn decode(&self, data: &[u8]) -> Result<Self::Image, BackendError>;

    /// Natural width and height of a decoded bitmap.
    fn dimensions(&self, image: &Self::Image) -> Dimensions;

    /// Render `image` at `params.width` x `params.height` and JPEG-encode it.
    fn encode_jpeg(&self, image: &Self::Image, params: &EncodeParams)
    -> Result<Vec<u8>, BackendError>;

    /// Largest `width * height` surface the backend will render.
    fn max_surface_pixels(&self) -> u64 {
        u64::MAX
    }
}
