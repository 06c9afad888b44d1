//! Data URI → decoded bitmap.

use super::backend::{BackendError, ImageBackend};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Split a `data:<mime>;base64,<payload>` URI and decode the payload bytes.
pub fn data_uri_bytes(uri: &str) -> Result<Vec<u8>, BackendError> {
    let (header, body) = uri
        .split_once(',')
        .ok_or_else(|| BackendError::Decode("invalid data URI: missing comma".into()))?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(BackendError::Decode(format!(
            "invalid data URI header: {header}"
        )));
    }
    STANDARD
        .decode(body)
        .map_err(|e| BackendError::Decode(format!("base64 decode error: {e}")))
}

/// Decode a data URI into the backend's bitmap type.
pub fn decode_data_uri<B: ImageBackend>(backend: &B, uri: &str) -> Result<B::Image, BackendError> {
    let bytes = data_uri_bytes(uri)?;
    backend.decode(&bytes)
}
