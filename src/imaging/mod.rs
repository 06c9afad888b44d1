//! Image processing: pure Rust, no system libraries.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Raster decode** | data URI → `base64` → `image::ImageReader` |
//! | **Compress** | `resize_exact` (Lanczos3) + `JpegEncoder`, iterated to a byte budget |
//! | **Validate** | payload size from base64 length vs a hard MiB ceiling |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and payload-size math (unit testable)
//! - **Parameters**: Quality, per-pass encode params, schedule and size targets
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Compress / Decode / Validate**: the pipeline steps built on a backend

pub mod backend;
mod calculations;
pub mod compress;
pub mod decode;
mod params;
pub mod rust_backend;
pub mod validate;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::decoded_payload_len;
pub use compress::{CompressedImage, compress};
pub use decode::decode_data_uri;
pub use params::{CompressionSchedule, CompressionTarget, EncodeParams, Quality};
pub use rust_backend::RustBackend;
pub use validate::within_size_limit;
