//! High-level image derivation.
//!
//! [`DeriveEngine::derive`] turns one source image into its configured
//! derivative set: plan the buckets, skip outputs that already exist,
//! decide the overlay (watermark for authored photographs, link bar for
//! linked embeds), produce through the backend, and alias the largest
//! variant under the original basename for backward-compatible URLs.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{PlannedVariant, plan_variants};
use super::params::{Overlay, Quality, Sharpening, VariantParams};
use crate::config::ImagesConfig;
use crate::extract::{CAMERA_FIELDS, COPYRIGHT_FIELDS, MetaFields};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File extensions the engine will resize. Everything else is copied
/// verbatim.
const RESIZABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// One resized/cropped rendition of a source image.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivative {
    pub max: u32,
    pub tag: String,
    pub crop: bool,
    pub fallback: bool,
    pub path: PathBuf,
    /// Site-relative URL, e.g. `files/dawn-360.jpg`.
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

/// All derivatives produced for one source image, ascending by size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivativeSet {
    pub stem: String,
    pub derivatives: Vec<Derivative>,
    /// URL of the original-basename alias (largest variant, or the
    /// verbatim copy for passthrough sources).
    pub original_url: String,
    /// True when the source was copied verbatim instead of resized.
    pub passthrough: bool,
}

impl DerivativeSet {
    /// The smallest-acceptable display variant, used as the `<img>` source.
    pub fn fallback(&self) -> Option<&Derivative> {
        self.derivatives.iter().find(|d| d.fallback)
    }

    /// The largest non-crop variant — the click-through target.
    pub fn largest(&self) -> Option<&Derivative> {
        self.derivatives.iter().rev().find(|d| !d.crop)
    }

    pub fn is_empty(&self) -> bool {
        self.derivatives.is_empty() && !self.passthrough
    }
}

/// Per-image derivation inputs that vary by call site.
#[derive(Debug, Clone, Default)]
pub struct DeriveOptions {
    /// The image is an authored photograph (watermark instead of link bar).
    pub photo: bool,
    /// External target for linked embeds; drives the link-bar overlay.
    pub link: Option<String>,
    /// Copy verbatim even for resizable formats.
    pub no_resize: bool,
    /// Regenerate outputs that already exist.
    pub force: bool,
}

/// Image derivation engine bound to one backend and one configuration.
pub struct DeriveEngine<'a, B: ImageBackend> {
    backend: &'a B,
    files_root: PathBuf,
    url_prefix: String,
    images: &'a ImagesConfig,
    watermark: Option<PathBuf>,
    overlay_font: Option<PathBuf>,
}

impl<'a, B: ImageBackend> DeriveEngine<'a, B> {
    pub fn new(
        backend: &'a B,
        files_root: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
        images: &'a ImagesConfig,
        watermark: Option<PathBuf>,
        overlay_font: Option<PathBuf>,
    ) -> Self {
        Self {
            backend,
            files_root: files_root.into(),
            url_prefix: url_prefix.into(),
            images,
            watermark,
            overlay_font,
        }
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.url_prefix, name)
    }

    /// Produce the derivative set for `source`.
    pub fn derive(
        &self,
        source: &Path,
        options: &DeriveOptions,
    ) -> Result<DerivativeSet, BackendError> {
        let filename = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = source
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = source
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let resizable = RESIZABLE_EXTENSIONS.contains(&ext.as_str());
        if !resizable || options.no_resize {
            return self.copy_passthrough(source, &filename, &stem);
        }

        let dims = self.backend.identify(source)?;
        let planned = plan_variants((dims.width, dims.height), &self.images.sizes);

        std::fs::create_dir_all(&self.files_root)?;

        let mut set = DerivativeSet {
            stem: stem.clone(),
            ..Default::default()
        };

        for plan in &planned {
            let out_name = format!("{}-{}.{}", stem, plan.bucket.tag, ext);
            let out_path = self.files_root.join(&out_name);

            let derivative = if out_path.exists() && !options.force {
                self.record_existing(plan, &out_path, &out_name)?
            } else {
                let output = self.backend.produce(&VariantParams {
                    source: source.to_path_buf(),
                    output: out_path.clone(),
                    width: plan.width,
                    height: plan.height,
                    crop_to: plan.crop_to,
                    overlay: self.overlay_for(plan, options),
                    quality: Quality::new(self.images.quality),
                    sharpening: Some(Sharpening::light()),
                })?;
                Derivative {
                    max: plan.bucket.max,
                    tag: plan.bucket.tag.clone(),
                    crop: plan.bucket.crop,
                    fallback: plan.bucket.fallback,
                    path: out_path.clone(),
                    url: self.url_for(&out_name),
                    width: output.width,
                    height: output.height,
                    bytes: output.bytes,
                }
            };

            if plan.is_largest {
                let alias = self.files_root.join(&filename);
                if options.force || !alias.exists() {
                    std::fs::copy(&out_path, &alias)?;
                }
                set.original_url = self.url_for(&filename);
            }

            set.derivatives.push(derivative);
        }

        if set.original_url.is_empty() {
            // Tiny source, nothing planned: the original is the only asset.
            return self.copy_passthrough(source, &filename, &stem);
        }

        Ok(set)
    }

    /// A derivative whose output already exists: reuse planned dimensions
    /// and the on-disk size instead of touching pixels.
    fn record_existing(
        &self,
        plan: &PlannedVariant,
        out_path: &Path,
        out_name: &str,
    ) -> Result<Derivative, BackendError> {
        let bytes = std::fs::metadata(out_path)?.len();
        let edge = plan.crop_to;
        Ok(Derivative {
            max: plan.bucket.max,
            tag: plan.bucket.tag.clone(),
            crop: plan.bucket.crop,
            fallback: plan.bucket.fallback,
            path: out_path.to_path_buf(),
            url: self.url_for(out_name),
            width: edge.unwrap_or(plan.width),
            height: edge.unwrap_or(plan.height),
            bytes,
        })
    }

    fn overlay_for(&self, plan: &PlannedVariant, options: &DeriveOptions) -> Overlay {
        if options.photo {
            if plan.bucket.max < self.images.watermark_below {
                if let Some(watermark) = &self.watermark {
                    return Overlay::Watermark {
                        image: watermark.clone(),
                    };
                }
            }
            return Overlay::None;
        }
        if let Some(link) = &options.link {
            return Overlay::LinkBar {
                text: link.clone(),
                font: self.overlay_font.clone(),
            };
        }
        Overlay::None
    }

    fn copy_passthrough(
        &self,
        source: &Path,
        filename: &str,
        stem: &str,
    ) -> Result<DerivativeSet, BackendError> {
        let dst = self.files_root.join(filename);
        if !dst.exists() {
            std::fs::create_dir_all(&self.files_root)?;
            std::fs::copy(source, &dst)?;
        }
        Ok(DerivativeSet {
            stem: stem.to_string(),
            derivatives: Vec::new(),
            original_url: self.url_for(filename),
            passthrough: true,
        })
    }
}

/// Classifies an image as an authored photograph (vs. an arbitrary
/// embedded image) from its extracted metadata.
///
/// A match on either axis wins: the camera model is in the allow-list, or
/// the copyright notice matches one of the configured patterns. The result
/// gates the watermark-vs-link-bar decision and figure captions.
pub struct PhotoClassifier {
    models: Vec<String>,
    patterns: Vec<Regex>,
}

impl PhotoClassifier {
    pub fn from_config(images: &ImagesConfig) -> Self {
        let patterns = images
            .copyright_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(pattern = %p, %err, "ignoring invalid copyright pattern");
                    None
                }
            })
            .collect();
        Self {
            models: images.camera_models.clone(),
            patterns,
        }
    }

    pub fn is_photograph(&self, meta: &MetaFields) -> bool {
        if let Some(model) = meta.first(CAMERA_FIELDS) {
            if self.models.iter().any(|m| m == &model) {
                return true;
            }
        }
        if let Some(copyright) = meta.first(COPYRIGHT_FIELDS) {
            if self.patterns.iter().any(|re| re.is_match(&copyright)) {
                return true;
            }
        }
        false
    }
}
