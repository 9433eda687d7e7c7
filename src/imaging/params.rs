//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides what derivatives to create) and the
//! [`backend`](super::backend) (which does the actual pixel work). The
//! separation allows swapping backends (e.g. for testing with a mock)
//! without changing derivation logic.

use std::path::PathBuf;

/// Quality setting for lossy JPEG re-encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(83)
    }
}

/// Sharpening parameters for the unsharp mask applied after resizing.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Light sharpening suitable for downscaled derivatives.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

/// Watermark scale relative to the derivative's long edge.
pub const WATERMARK_SCALE: f32 = 0.16;

/// Margin between a composited overlay and the image edge, in pixels.
pub const OVERLAY_MARGIN: u32 = 8;

/// What to composite onto a derivative, if anything.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    None,
    /// Semi-transparent watermark PNG, scaled to [`WATERMARK_SCALE`] of the
    /// long edge, anchored bottom-right, rotated 90° on portrait output.
    Watermark { image: PathBuf },
    /// Translucent bar with the link text centered, for non-photographic
    /// images that point somewhere else.
    LinkBar { text: String, font: Option<PathBuf> },
}

/// Full specification for producing one derivative.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantParams {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Post-resize dimensions, aspect ratio preserved.
    pub width: u32,
    pub height: u32,
    /// Center-crop to this square edge after resizing, when the resized
    /// image still exceeds it.
    pub crop_to: Option<u32>,
    pub overlay: Overlay,
    pub quality: Quality,
    pub sharpening: Option<Sharpening>,
}

/// What the backend reports back after producing a derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantOutput {
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_83() {
        assert_eq!(Quality::default().value(), 83);
    }

    #[test]
    fn sharpening_light_values() {
        let s = Sharpening::light();
        assert_eq!(s.sigma, 0.5);
        assert_eq!(s.threshold, 0);
    }
}
