//! Upload file naming.
//!
//! Every upload is stored under a fresh name so two uploads never collide,
//! without any coordination with the storage service:
//!
//! ```text
//! {prefix}-{timestamp_ms}-{suffix}-{base}.jpg
//! room-42-1760870400123-k3v9qa-front-view.jpg
//! ```
//!
//! - `prefix`: the owning entity id (sanitized), or `image` when there is none
//! - `timestamp_ms`: milliseconds since the Unix epoch
//! - `suffix`: 6 random lowercase alphanumerics
//! - `base`: the original file stem (sanitized, at most 40 chars)
//!
//! The extension is always `.jpg` because the compressor always emits JPEG.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Prefix used when the upload has no owning entity.
pub const DEFAULT_PREFIX: &str = "image";

const MAX_BASE_LEN: usize = 40;
const SUFFIX_LEN: usize = 6;

/// Lowercase, collapse every run of non-alphanumerics into one `-`, trim
/// dashes, and cap at `max_len` characters.
///
/// - `"Front View (2).JPG"` → `"front-view-2-jpg"`
/// - `"  __ "` → `""`
pub fn sanitize(input: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if out.len() >= max_len {
            break;
        }
    }
    out.truncate(max_len);
    out.trim_end_matches('-').to_string()
}

/// File stem without its last extension (`"a.b.jpg"` → `"a.b"`).
fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(pos) => &name[..pos],
    }
}

/// Assemble an upload name from already-chosen timestamp and suffix.
pub fn unique_file_name(
    prefix: Option<&str>,
    original_name: &str,
    timestamp_ms: i64,
    suffix: &str,
) -> String {
    let prefix = prefix
        .map(|p| sanitize(p, MAX_BASE_LEN))
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
    let base = sanitize(file_stem(original_name), MAX_BASE_LEN);
    let base = if base.is_empty() { "upload".to_string() } else { base };
    format!("{prefix}-{timestamp_ms}-{suffix}-{base}.jpg")
}

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Generate a fresh upload name using the current time and a random suffix.
pub fn generate_file_name(prefix: Option<&str>, original_name: &str) -> String {
    let now = chrono::Utc::now().timestamp_millis();
    unique_file_name(prefix, original_name, now, &random_suffix())
}
