//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`compress`](super::compress) loop (which decides
//! what to try next) and the [`backend`](super::backend) (which does the
//! actual pixel work). This separation allows swapping backends (e.g. for
//! testing with a mock) without changing the compression logic.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality as an integer percentage (1–100). Clamped on construction.
//! - [`EncodeParams`]: One render + encode pass: target dimensions and quality.
//! - [`CompressionSchedule`]: The knobs of the degrade-quality-then-degrade-width loop.
//! - [`CompressionTarget`]: The soft byte budget and the hard post-compression ceiling.

/// Quality setting for lossy image encoding (1-100).
///
/// Carried as an integer percentage so the compression schedule
/// (80 → 65 → 50 → 35 → 20) steps exactly, with no float drift at the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Step down by `step`, never going below `floor`.
    pub fn lowered(self, step: u32, floor: Quality) -> Self {
        Self::new(self.0.saturating_sub(step)).max(floor)
    }

    /// Value in the `u8` range the JPEG encoder expects.
    pub fn as_jpeg(self) -> u8 {
        // Clamped to 1..=100 on construction
        self.0 as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Parameters for one render + encode pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

/// Iteration knobs for the compressor.
///
/// Defaults: start at up to 1280px wide at quality 80, step quality down by
/// 15 to a floor of 20, then shrink width by 0.85 per attempt to a minimum of
/// 640px, for at most 8 attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionSchedule {
    pub max_width: u32,
    pub min_width: u32,
    pub initial_quality: Quality,
    pub min_quality: Quality,
    pub quality_step: u32,
    pub width_factor: f64,
    pub max_attempts: u32,
}

impl Default for CompressionSchedule {
    fn default() -> Self {
        Self {
            max_width: 1280,
            min_width: 640,
            initial_quality: Quality::new(80),
            min_quality: Quality::new(20),
            quality_step: 15,
            width_factor: 0.85,
            max_attempts: 8,
        }
    }
}

/// Size limits for an ingested image.
///
/// `target_bytes` is what the compressor aims for; `hard_limit_mib` is the
/// absolute ceiling the size validator enforces afterwards. The hard limit is
/// deliberately looser so the compressor's unconditional fallback usually
/// still passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionTarget {
    pub target_bytes: usize,
    pub hard_limit_mib: f64,
}

impl Default for CompressionTarget {
    fn default() -> Self {
        Self {
            target_bytes: 110 * 1024,
            hard_limit_mib: 0.25,
        }
    }
}
