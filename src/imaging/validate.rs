//! Hard size ceiling check for encoded payloads.

use super::calculations::decoded_payload_len;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// True when the payload's decoded size is at most `max_mib` mebibytes.
///
/// Never fails: a malformed payload or a non-finite / negative ceiling is
/// simply not within the limit.
pub fn within_size_limit(payload: &str, max_mib: f64) -> bool {
    if !max_mib.is_finite() || max_mib < 0.0 {
        return false;
    }
    match decoded_payload_len(payload) {
        Some(len) => len as f64 <= max_mib * BYTES_PER_MIB,
        None => false,
    }
}
