//! Pure calculation functions for the compression loop.
//!
//! All functions here are pure and testable without any I/O or images.

/// Height that preserves the source aspect ratio at the given width.
///
/// Never returns 0: a 1px-tall sliver is still a valid raster surface.
pub fn height_for_width(source: (u32, u32), width: u32) -> u32 {
    let (src_w, src_h) = source;
    if src_w == 0 {
        return 0;
    }
    let h = (width as f64 * src_h as f64 / src_w as f64).round() as u32;
    h.max(1)
}

/// Starting width: the source width, capped at `max_width`.
pub fn initial_width(source_width: u32, max_width: u32) -> u32 {
    source_width.min(max_width)
}

/// Shrink `width` by `factor`, clamped to at least `min_width`.
pub fn shrink_width(width: u32, factor: f64, min_width: u32) -> u32 {
    let shrunk = (width as f64 * factor).round() as u32;
    shrunk.max(min_width)
}

/// Largest width not above `width` whose aspect-preserving surface fits in
/// `max_pixels`.
///
/// A 20x20000 strip widened to 640 would need a 640x640000 surface; this
/// narrows it instead. Never returns less than 1.
pub fn fit_surface(source: (u32, u32), width: u32, max_pixels: u64) -> u32 {
    let area = |w: u32| w as u64 * height_for_width(source, w) as u64;
    if area(width) <= max_pixels {
        return width;
    }
    let (src_w, src_h) = source;
    let estimate = (max_pixels as f64 * src_w as f64 / src_h.max(1) as f64).sqrt() as u32;
    let mut fitted = estimate.clamp(1, width);
    while fitted > 1 && area(fitted) > max_pixels {
        fitted -= 1;
    }
    fitted
}

/// Byte length of the binary payload inside a base64 data URI.
///
/// Accepts either a full `data:<mime>;base64,<payload>` URI or a bare base64
/// string. The size is derived from the character count: every 4 characters
/// carry 3 bytes, minus one byte per trailing `=` pad.
///
/// Returns `None` when the payload length is not a multiple of 4, which no
/// padded base64 encoder produces.
pub fn decoded_payload_len(payload: &str) -> Option<usize> {
    let b64 = match payload.split_once(',') {
        Some((header, body)) if header.starts_with("data:") => body,
        Some(_) => return None,
        None => payload,
    };
    if b64.len() % 4 != 0 {
        return None;
    }
    let padding = if b64.ends_with("==") {
        2
    } else if b64.ends_with('=') {
        1
    } else {
        0
    };
    (b64.len() / 4 * 3).checked_sub(padding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn fit_surface_keeps_widths_that_fit() {
        assert_eq!(fit_surface((2000, 1000), 1280, 16_384 * 16_384), 1280);
    }

    #[test]
    fn fit_surface_narrows_tall_strips() {
        let limit = 16_384u64 * 16_384;
        let w = fit_surface((20, 20_000), 640, limit);
        assert!(w < 640);
        assert!(w as u64 * height_for_width((20, 20_000), w) as u64 <= limit);
        // One pixel wider would overflow
        assert!((w + 1) as u64 * height_for_width((20, 20_000), w + 1) as u64 > limit);
    }

    #[test]
    fn fit_surface_bottoms_out_at_one() {
        assert_eq!(fit_surface((1, 1_000), 640, 10), 1);
    }

    // =========================================================================
    // dimension math
    // =========================================================================

    #[test]
    fn height_preserves_landscape_aspect() {
        assert_eq!(height_for_width((2000, 1000), 1280), 640);
    }

    #[test]
    fn height_preserves_portrait_aspect() {
        assert_eq!(height_for_width((1000, 2000), 640), 1280);
    }

    #[test]
    fn height_never_zero_for_extreme_panorama() {
        assert_eq!(height_for_width((10_000, 1), 640), 1);
    }

    #[test]
    fn initial_width_caps_large_sources() {
        assert_eq!(initial_width(4000, 1280), 1280);
    }

    #[test]
    fn initial_width_keeps_small_sources() {
        assert_eq!(initial_width(800, 1280), 800);
    }

    #[test]
    fn shrink_width_applies_factor() {
        assert_eq!(shrink_width(1280, 0.85, 640), 1088);
        assert_eq!(shrink_width(1088, 0.85, 640), 925);
    }

    #[test]
    fn shrink_width_clamps_to_minimum() {
        assert_eq!(shrink_width(700, 0.85, 640), 640);
        assert_eq!(shrink_width(640, 0.85, 640), 640);
    }

    // =========================================================================
    // decoded_payload_len
    // =========================================================================

    #[test]
    fn payload_len_matches_real_encoding_for_every_padding() {
        for n in [0usize, 1, 2, 3, 4, 5, 100, 101, 102] {
            let data = vec![7u8; n];
            let uri = format!("data:image/jpeg;base64,{}", STANDARD.encode(&data));
            assert_eq!(decoded_payload_len(&uri), Some(n), "length {n}");
        }
    }

    #[test]
    fn payload_len_accepts_bare_base64() {
        assert_eq!(decoded_payload_len("SGVsbG8gV29ybGQ="), Some(11));
    }

    #[test]
    fn payload_len_rejects_truncated_payload() {
        assert_eq!(decoded_payload_len("data:image/jpeg;base64,abc"), None);
    }

    #[test]
    fn payload_len_rejects_non_data_uri_with_comma() {
        assert_eq!(decoded_payload_len("hello,world="), None);
    }
}
