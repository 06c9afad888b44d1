//! CLI output formatting.
//!
//! Every command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects. Diagnostics go through `tracing` on
//! stderr; these lines are the user-facing report.
//!
//! # Output Format
//!
//! ## Compress
//!
//! ```text
//! bedroom.jpg
//!     Source: 4032x3024
//!     Output: 1280x960 @ q65 (98.4 KiB, 2 attempts)
//!     Size check: ok (limit 0.25 MiB)
//! ```
//!
//! ## Add (progress, then result)
//!
//! ```text
//! 002 front.jpg: queued
//! 002 front.jpg: compressing
//! 002 front.jpg: uploading
//! 002 front.jpg: complete (100%)
//! Gallery (2/5)
//! 001 https://cdn.example/pg/images/a.jpg
//! 002 https://cdn.example/pg/images/image-...-front.jpg
//! ```
//!
//! Positions are 1-based and zero-padded, matching the gallery order.

use crate::gallery::{AddOutcome, Commit, GalleryEvent, JobStage, SkipReason};
use crate::imaging::{CompressedImage, Dimensions};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_kib(bytes: usize) -> String {
    format!("{:.1} KiB", bytes as f64 / 1024.0)
}

fn stage_label(stage: JobStage) -> &'static str {
    match stage {
        JobStage::Queued => "queued",
        JobStage::Compressing => "compressing",
        JobStage::Uploading => "uploading",
        JobStage::Complete => "complete",
    }
}

// ============================================================================
// compress
// ============================================================================

/// Format the result of a local compression run.
pub fn format_compress_report(
    name: &str,
    source: Dimensions,
    image: &CompressedImage,
    within_limit: bool,
    limit_mib: f64,
) -> Vec<String> {
    let mut lines = vec![name.to_string()];
    lines.push(format!(
        "{}Source: {}x{}",
        indent(1),
        source.width,
        source.height
    ));
    let how = if image.fallback {
        "fallback".to_string()
    } else if image.attempts == 1 {
        "1 attempt".to_string()
    } else {
        format!("{} attempts", image.attempts)
    };
    lines.push(format!(
        "{}Output: {}x{} @ q{} ({}, {})",
        indent(1),
        image.width,
        image.height,
        image.quality.value(),
        format_kib(image.size),
        how
    ));
    let verdict = if within_limit { "ok" } else { "too large" };
    lines.push(format!(
        "{}Size check: {} (limit {} MiB)",
        indent(1),
        verdict,
        limit_mib
    ));
    lines
}

pub fn print_compress_report(
    name: &str,
    source: Dimensions,
    image: &CompressedImage,
    within_limit: bool,
    limit_mib: f64,
) {
    for line in format_compress_report(name, source, image, within_limit, limit_mib) {
        println!("{}", line);
    }
}

// ============================================================================
// add / remove
// ============================================================================

/// Format a single progress event. Commit events print nothing here; the
/// final list is printed once the call returns.
pub fn format_gallery_event(event: &GalleryEvent) -> Vec<String> {
    match event {
        GalleryEvent::Job {
            slot,
            file,
            stage: JobStage::Complete,
            percent,
        } => vec![format!(
            "{} {}: complete ({}%)",
            format_index(slot + 1),
            file,
            percent
        )],
        GalleryEvent::Job {
            slot, file, stage, ..
        } => vec![format!(
            "{} {}: {}",
            format_index(slot + 1),
            file,
            stage_label(*stage)
        )],
        GalleryEvent::Cleared { .. } | GalleryEvent::Committed { .. } => Vec::new(),
        GalleryEvent::AutoSaveFailed { message } => vec![format!("Warning: {}", message)],
    }
}

/// Format the gallery list with its capacity.
pub fn format_image_list(images: &[String], max_images: usize) -> Vec<String> {
    let mut lines = vec![format!("Gallery ({}/{})", images.len(), max_images)];
    if images.is_empty() {
        lines.push(format!("{}(no images)", indent(1)));
    }
    for (i, url) in images.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), url));
    }
    lines
}

pub fn print_image_list(images: &[String], max_images: usize) {
    for line in format_image_list(images, max_images) {
        println!("{}", line);
    }
}

/// Format a committed change: the new list, then any auto-save warning.
pub fn format_commit(commit: &Commit, max_images: usize) -> Vec<String> {
    let mut lines = format_image_list(&commit.images, max_images);
    if let Some(err) = &commit.auto_save_error {
        lines.push(format!("Warning: {} (change kept locally)", err));
    }
    lines
}

pub fn print_commit(commit: &Commit, max_images: usize) {
    for line in format_commit(commit, max_images) {
        println!("{}", line);
    }
}

/// Format the outcome of `add`.
pub fn format_add_outcome(outcome: &AddOutcome, current: &[String], max_images: usize) -> Vec<String> {
    match outcome {
        AddOutcome::Committed(commit) => format_commit(commit, max_images),
        AddOutcome::Skipped(reason) => {
            let why = match reason {
                SkipReason::Disabled => "uploads are disabled",
                SkipReason::AtCapacity => "gallery is full",
                SkipReason::NoImages => "no image files selected",
            };
            let mut lines = vec![format!("Nothing added: {}", why)];
            lines.extend(format_image_list(current, max_images));
            lines
        }
    }
}

pub fn print_add_outcome(outcome: &AddOutcome, current: &[String], max_images: usize) {
    for line in format_add_outcome(outcome, current, max_images) {
        println!("{}", line);
    }
}
