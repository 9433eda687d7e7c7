//! Pure calculation functions for derivative dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::config::SizeBucket;

/// Compute post-resize dimensions for one bucket, preserving aspect ratio.
///
/// The scale dimension is whichever of width/height is **larger** — the
/// long edge lands exactly on `max`. Crop buckets invert that choice: the
/// **shorter** edge lands on `max` so the image fully covers the square
/// crop target.
///
/// ```
/// # use linotype::imaging::scale_dimensions;
/// // Landscape 2000x1500, plain bucket 720 → long edge 720
/// assert_eq!(scale_dimensions((2000, 1500), 720, false), (720, 540));
/// // Same source, crop bucket 90 → short edge 90
/// assert_eq!(scale_dimensions((2000, 1500), 90, true), (120, 90));
/// ```
pub fn scale_dimensions(original: (u32, u32), max: u32, crop: bool) -> (u32, u32) {
    let (w, h) = original;
    let scale_by_width = if crop { w <= h } else { w >= h };
    if scale_by_width {
        let ratio = max as f64 / w as f64;
        (max, (h as f64 * ratio).round() as u32)
    } else {
        let ratio = max as f64 / h as f64;
        ((w as f64 * ratio).round() as u32, max)
    }
}

/// Square edge to center-crop to, if the resized image still exceeds it.
pub fn crop_edge(resized: (u32, u32), max: u32) -> Option<u32> {
    if resized.0 > max || resized.1 > max {
        Some(max)
    } else {
        None
    }
}

/// A bucket the engine has decided to produce, with its dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedVariant {
    pub bucket: SizeBucket,
    pub width: u32,
    pub height: u32,
    pub crop_to: Option<u32>,
    /// True for the largest planned bucket — its output is also aliased
    /// under the original basename.
    pub is_largest: bool,
}

/// Decide which buckets to produce for a source image and compute their
/// dimensions. Buckets are consumed in ascending order; buckets whose
/// target exceeds the source's own scale edge are skipped (no upscaling).
pub fn plan_variants(original: (u32, u32), buckets: &[SizeBucket]) -> Vec<PlannedVariant> {
    let (w, h) = original;
    let long_edge = w.max(h);
    let short_edge = w.min(h);

    let mut planned: Vec<PlannedVariant> = buckets
        .iter()
        .filter(|b| {
            let scale_edge = if b.crop { short_edge } else { long_edge };
            b.max <= scale_edge
        })
        .map(|b| {
            let (out_w, out_h) = scale_dimensions(original, b.max, b.crop);
            let crop_to = if b.crop { crop_edge((out_w, out_h), b.max) } else { None };
            PlannedVariant {
                bucket: b.clone(),
                width: out_w,
                height: out_h,
                crop_to,
                is_largest: false,
            }
        })
        .collect();

    if let Some(last) = planned.iter_mut().rev().find(|p| !p.bucket.crop) {
        last.is_largest = true;
    }

    planned
}

/// Watermark edge length for a derivative: 16% of the long edge.
pub fn watermark_edge(dims: (u32, u32), scale: f32) -> u32 {
    let long_edge = dims.0.max(dims.1);
    ((long_edge as f32 * scale).round() as u32).max(1)
}

/// Portrait orientation check — drives the watermark rotation.
pub fn is_portrait(dims: (u32, u32)) -> bool {
    dims.1 > dims.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(max: u32, crop: bool) -> SizeBucket {
        SizeBucket {
            max,
            tag: if crop {
                format!("{max}c")
            } else {
                max.to_string()
            },
            crop,
            fallback: false,
        }
    }

    // =========================================================================
    // scale_dimensions
    // =========================================================================

    #[test]
    fn plain_bucket_scales_long_edge_landscape() {
        assert_eq!(scale_dimensions((2000, 1500), 1000, false), (1000, 750));
    }

    #[test]
    fn plain_bucket_scales_long_edge_portrait() {
        assert_eq!(scale_dimensions((1500, 2000), 1000, false), (750, 1000));
    }

    #[test]
    fn crop_bucket_scales_short_edge_landscape() {
        // Inverted: the short edge (height) lands on the target
        assert_eq!(scale_dimensions((2000, 1500), 90, true), (120, 90));
    }

    #[test]
    fn crop_bucket_scales_short_edge_portrait() {
        assert_eq!(scale_dimensions((1500, 2000), 90, true), (90, 120));
    }

    #[test]
    fn square_source_scales_both_edges() {
        assert_eq!(scale_dimensions((1000, 1000), 360, false), (360, 360));
        assert_eq!(scale_dimensions((1000, 1000), 90, true), (90, 90));
    }

    // =========================================================================
    // crop_edge
    // =========================================================================

    #[test]
    fn crop_needed_when_resized_exceeds_target() {
        assert_eq!(crop_edge((120, 90), 90), Some(90));
    }

    #[test]
    fn crop_skipped_when_already_square() {
        assert_eq!(crop_edge((90, 90), 90), None);
    }

    // =========================================================================
    // plan_variants
    // =========================================================================

    fn default_buckets() -> Vec<SizeBucket> {
        vec![
            bucket(90, true),
            bucket(360, false),
            bucket(720, false),
            bucket(1280, false),
        ]
    }

    #[test]
    fn plan_keeps_ascending_order() {
        let planned = plan_variants((3000, 2000), &default_buckets());
        let maxes: Vec<u32> = planned.iter().map(|p| p.bucket.max).collect();
        assert_eq!(maxes, vec![90, 360, 720, 1280]);
    }

    #[test]
    fn plan_skips_buckets_larger_than_source() {
        let planned = plan_variants((1000, 800), &default_buckets());
        let maxes: Vec<u32> = planned.iter().map(|p| p.bucket.max).collect();
        assert_eq!(maxes, vec![90, 360, 720]);
    }

    #[test]
    fn plan_marks_largest_noncrop_bucket() {
        let planned = plan_variants((1000, 800), &default_buckets());
        let largest: Vec<u32> = planned
            .iter()
            .filter(|p| p.is_largest)
            .map(|p| p.bucket.max)
            .collect();
        assert_eq!(largest, vec![720]);
    }

    #[test]
    fn plan_crop_bucket_gets_crop_target() {
        let planned = plan_variants((2000, 1500), &default_buckets());
        let crop = &planned[0];
        assert_eq!(crop.crop_to, Some(90));
        assert_eq!((crop.width, crop.height), (120, 90));
    }

    #[test]
    fn plan_crop_bucket_uses_short_edge_for_skip() {
        // Short edge 80 < 90: even the crop bucket is skipped
        let planned = plan_variants((500, 80), &default_buckets());
        assert!(planned.iter().all(|p| !p.bucket.crop));
    }

    #[test]
    fn plan_tiny_source_yields_nothing() {
        let planned = plan_variants((50, 40), &default_buckets());
        assert!(planned.is_empty());
    }

    // =========================================================================
    // Watermark geometry
    // =========================================================================

    #[test]
    fn watermark_edge_is_16_percent_of_long_edge() {
        assert_eq!(watermark_edge((1280, 960), 0.16), 205);
        assert_eq!(watermark_edge((960, 1280), 0.16), 205);
    }

    #[test]
    fn watermark_edge_never_zero() {
        assert_eq!(watermark_edge((4, 3), 0.16), 1);
    }

    #[test]
    fn portrait_detection() {
        assert!(is_portrait((600, 800)));
        assert!(!is_portrait((800, 600)));
        assert!(!is_portrait((800, 800)));
    }
}
