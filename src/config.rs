//! Gallery configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by a user config file in the config directory (the current
//! directory unless `--config-dir` says otherwise).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [gallery]
//! max_images = 5            # Images one entity may hold
//! uploads_enabled = true    # Administrative kill switch for new uploads
//! progress_clear_ms = 1000  # How long a finished upload stays in the progress list
//!
//! [compression]
//! target_kib = 110          # Budget the compressor aims for
//! hard_limit_mib = 0.25     # Ceiling enforced after compression
//! max_width = 1280          # Starting width cap
//! min_width = 640           # Width floor (also the fallback width)
//! initial_quality = 80      # JPEG quality of the first attempt (1-100)
//! min_quality = 20          # Quality floor (also the fallback quality)
//! quality_step = 15         # Quality decrement per attempt
//! width_factor = 0.85       # Width multiplier once quality is at the floor
//! max_attempts = 8          # Attempts before the forced fallback
//!
//! [upload]
//! endpoint = "http://localhost:3000/api/upload"
//! folder = "pg/images"
//! public = true
//! # entity_id = "room-42"   # Namespaces generated file names
//! timeout_secs = 30
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want:
//!
//! ```toml
//! [upload]
//! folder = "pg/rooms"
//! entity_id = "room-42"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{CompressionSchedule, CompressionTarget, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Name of the config file looked up in the config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Gallery limits and switches.
    pub gallery: GallerySection,
    /// Compression budget and schedule.
    pub compression: CompressionConfig,
    /// Remote storage settings.
    pub upload: UploadConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.compression;
        if self.gallery.max_images == 0 {
            return Err(ConfigError::Validation(
                "gallery.max_images must be at least 1".into(),
            ));
        }
        if c.target_kib == 0 {
            return Err(ConfigError::Validation(
                "compression.target_kib must be non-zero".into(),
            ));
        }
        if !c.hard_limit_mib.is_finite() || c.hard_limit_mib <= 0.0 {
            return Err(ConfigError::Validation(
                "compression.hard_limit_mib must be a positive number".into(),
            ));
        }
        if c.min_width == 0 || c.min_width > c.max_width {
            return Err(ConfigError::Validation(
                "compression.min_width must be non-zero and at most max_width".into(),
            ));
        }
        if !(1..=100).contains(&c.initial_quality) || !(1..=100).contains(&c.min_quality) {
            return Err(ConfigError::Validation(
                "compression qualities must be 1-100".into(),
            ));
        }
        if c.min_quality > c.initial_quality {
            return Err(ConfigError::Validation(
                "compression.min_quality must not exceed initial_quality".into(),
            ));
        }
        if c.quality_step == 0 {
            return Err(ConfigError::Validation(
                "compression.quality_step must be non-zero".into(),
            ));
        }
        if !(c.width_factor > 0.0 && c.width_factor < 1.0) {
            return Err(ConfigError::Validation(
                "compression.width_factor must be between 0 and 1 (exclusive)".into(),
            ));
        }
        if self.upload.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "upload.endpoint must not be empty".into(),
            ));
        }
        if self.upload.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upload.timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Gallery limits and switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GallerySection {
    /// Maximum number of images one entity may hold.
    pub max_images: usize,
    /// When false, new uploads are refused.
    pub uploads_enabled: bool,
    /// Milliseconds a completed upload stays in the progress list.
    pub progress_clear_ms: u64,
}

impl Default for GallerySection {
    fn default() -> Self {
        Self {
            max_images: 5,
            uploads_enabled: true,
            progress_clear_ms: 1000,
        }
    }
}

/// Compression budget and schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Size the compressor aims for, in KiB.
    pub target_kib: usize,
    /// Absolute ceiling enforced after compression, in MiB.
    pub hard_limit_mib: f64,
    pub max_width: u32,
    pub min_width: u32,
    pub initial_quality: u32,
    pub min_quality: u32,
    pub quality_step: u32,
    pub width_factor: f64,
    pub max_attempts: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        let schedule = CompressionSchedule::default();
        let target = CompressionTarget::default();
        Self {
            target_kib: target.target_bytes / 1024,
            hard_limit_mib: target.hard_limit_mib,
            max_width: schedule.max_width,
            min_width: schedule.min_width,
            initial_quality: schedule.initial_quality.value(),
            min_quality: schedule.min_quality.value(),
            quality_step: schedule.quality_step,
            width_factor: schedule.width_factor,
            max_attempts: schedule.max_attempts,
        }
    }
}

impl CompressionConfig {
    pub fn schedule(&self) -> CompressionSchedule {
        CompressionSchedule {
            max_width: self.max_width,
            min_width: self.min_width,
            initial_quality: Quality::new(self.initial_quality),
            min_quality: Quality::new(self.min_quality),
            quality_step: self.quality_step,
            width_factor: self.width_factor,
            max_attempts: self.max_attempts,
        }
    }

    pub fn target(&self) -> CompressionTarget {
        CompressionTarget {
            target_bytes: self.target_kib * 1024,
            hard_limit_mib: self.hard_limit_mib,
        }
    }
}

/// Remote storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// URL of the upload endpoint.
    pub endpoint: String,
    /// Destination folder in object storage.
    pub folder: String,
    /// Whether uploaded objects are publicly readable.
    pub public: bool,
    /// Owning entity id, used to namespace generated file names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/upload".to_string(),
            folder: "pg/images".to_string(),
            public: true,
            entity_id: None,
            timeout_secs: 30,
        }
    }
}

impl UploadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pg-gallery Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Gallery limits
# ---------------------------------------------------------------------------
[gallery]
# Maximum number of images one entity (room, PG location, ...) may hold.
max_images = 5

# Set to false to refuse new uploads (removal still works).
uploads_enabled = true

# Milliseconds a finished upload stays visible in the progress list.
progress_clear_ms = 1000

# ---------------------------------------------------------------------------
# Compression
# ---------------------------------------------------------------------------
[compression]
# Size the compressor tries to reach, in KiB.
target_kib = 110

# Hard ceiling checked after compression, in MiB. Images still above it
# are rejected and the whole batch fails.
hard_limit_mib = 0.25

# Width of the first attempt is min(source width, max_width).
max_width = 1280

# Width never shrinks below this; the forced fallback renders at this width.
min_width = 640

# JPEG quality (1-100) of the first attempt, and the floor it steps down to.
initial_quality = 80
min_quality = 20

# Quality decrement per attempt while above the floor.
quality_step = 15

# Once quality is at the floor, width is multiplied by this per attempt.
width_factor = 0.85

# Attempts before falling back to min_width at min_quality.
max_attempts = 8

# ---------------------------------------------------------------------------
# Upload
# ---------------------------------------------------------------------------
[upload]
# Endpoint accepting { file, options: { folder, fileName, isPublic } }.
endpoint = "http://localhost:3000/api/upload"

# Destination folder in object storage.
folder = "pg/images"

# Whether uploaded objects are publicly readable.
public = true

# Owning entity id; prefixes generated file names.
# entity_id = "room-42"

# Per-request timeout in seconds.
timeout_secs = 30
"##
}
