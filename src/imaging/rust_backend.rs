//! Pure Rust image processing backend — zero external dependencies.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` |
//! | Decode (JPEG, PNG) | `image` crate (pure Rust decoders) |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Center crop | `DynamicImage::crop_imm` |
//! | Sharpening | `image::imageops::unsharpen` |
//! | Watermark / bar compositing | `image::imageops::overlay` (alpha blend) |
//! | Link-bar text | `imageproc::drawing::draw_text_mut` + `ab_glyph` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at fixed quality |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{is_portrait, watermark_edge};
use super::params::{OVERLAY_MARGIN, Overlay, VariantParams, VariantOutput, WATERMARK_SCALE};
use ab_glyph::{FontVec, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use std::io::BufWriter;
use std::path::Path;
use tracing::warn;

/// Pure Rust backend using the `image` crate ecosystem.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path)
            .map_err(|e| BackendError::ProcessingFailed(e.to_string()))?;
        Ok(Dimensions { width, height })
    }

    fn produce(&self, params: &VariantParams) -> Result<VariantOutput, BackendError> {
        let decoded = image::open(&params.source)
            .map_err(|e| BackendError::ProcessingFailed(e.to_string()))?;

        let mut img = decoded.resize_exact(params.width, params.height, FilterType::Lanczos3);

        if let Some(edge) = params.crop_to {
            let (w, h) = (img.width(), img.height());
            if w > edge || h > edge {
                let x = w.saturating_sub(edge) / 2;
                let y = h.saturating_sub(edge) / 2;
                img = img.crop_imm(x, y, edge.min(w), edge.min(h));
            }
        }

        if let Some(sharpening) = params.sharpening {
            img = img.unsharpen(sharpening.sigma, sharpening.threshold);
        }

        let mut canvas = img.to_rgba8();
        match &params.overlay {
            Overlay::None => {}
            Overlay::Watermark { image } => composite_watermark(&mut canvas, image),
            Overlay::LinkBar { text, font } => {
                composite_link_bar(&mut canvas, text, font.as_deref())
            }
        }

        if let Some(parent) = params.output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let is_jpeg = params
            .output
            .extension()
            .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
            .unwrap_or(false);
        if is_jpeg {
            let file = std::fs::File::create(&params.output)?;
            let mut writer = BufWriter::new(file);
            let mut encoder =
                JpegEncoder::new_with_quality(&mut writer, params.quality.value() as u8);
            encoder
                .encode_image(&DynamicImage::ImageRgba8(canvas).to_rgb8())
                .map_err(|e| BackendError::ProcessingFailed(e.to_string()))?;
        } else {
            DynamicImage::ImageRgba8(canvas)
                .save(&params.output)
                .map_err(|e| BackendError::ProcessingFailed(e.to_string()))?;
        }

        let meta = std::fs::metadata(&params.output)?;
        let (width, height) = image::image_dimensions(&params.output)
            .map_err(|e| BackendError::ProcessingFailed(e.to_string()))?;
        Ok(VariantOutput {
            width,
            height,
            bytes: meta.len(),
        })
    }
}

/// Composite the watermark PNG, scaled to 16% of the long edge, anchored
/// bottom-right, rotated 90° when the derivative is portrait.
fn composite_watermark(canvas: &mut RgbaImage, watermark_path: &Path) {
    let watermark = match image::open(watermark_path) {
        Ok(w) => w,
        Err(err) => {
            warn!(path = %watermark_path.display(), %err, "cannot open watermark");
            return;
        }
    };

    let dims = (canvas.width(), canvas.height());
    let edge = watermark_edge(dims, WATERMARK_SCALE);
    let mut scaled = watermark.resize(edge, edge, FilterType::Lanczos3);
    if is_portrait(dims) {
        scaled = scaled.rotate90();
    }

    let scaled = scaled.to_rgba8();
    let x = canvas
        .width()
        .saturating_sub(scaled.width() + OVERLAY_MARGIN);
    let y = canvas
        .height()
        .saturating_sub(scaled.height() + OVERLAY_MARGIN);
    image::imageops::overlay(canvas, &scaled, x as i64, y as i64);
}

/// Composite a translucent bar along the bottom edge with the link text
/// centered. Without a usable font the bar is drawn untexted.
fn composite_link_bar(canvas: &mut RgbaImage, text: &str, font_path: Option<&Path>) {
    let width = canvas.width();
    let height = canvas.height();
    let bar_height = (height / 12).max(18).min(height);

    let mut bar = RgbaImage::from_pixel(width, bar_height, Rgba([0, 0, 0, 140]));

    if let Some(font) = font_path.and_then(load_font) {
        let scale = PxScale::from(bar_height as f32 * 0.6);
        let (text_w, text_h) = imageproc::drawing::text_size(scale, &font, text);
        let x = (width.saturating_sub(text_w) / 2) as i32;
        let y = (bar_height.saturating_sub(text_h) / 2) as i32;
        imageproc::drawing::draw_text_mut(
            &mut bar,
            Rgba([255, 255, 255, 230]),
            x,
            y,
            scale,
            &font,
            text,
        );
    }

    let y = height.saturating_sub(bar_height);
    image::imageops::overlay(canvas, &bar, 0, y as i64);
}

fn load_font(path: &Path) -> Option<FontVec> {
    let bytes = std::fs::read(path)
        .map_err(|err| warn!(path = %path.display(), %err, "cannot read overlay font"))
        .ok()?;
    FontVec::try_from_vec(bytes)
        .map_err(|err| warn!(path = %path.display(), %err, "invalid overlay font"))
        .ok()
}
