//! Site configuration module.
//!
//! Handles loading and validating `config.toml` from the content root. The
//! parsed [`SiteConfig`] value is constructed once and passed explicitly to
//! every component — nothing in the pipeline reads ambient global state.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! title = "A Weblog"
//! url = "https://example.com"
//! author = ""
//!
//! [paths]
//! target_root = "public"        # Output directory
//! files_dir = "files"           # Image derivatives land under target/files/
//! cache_dir = ".linotype-cache" # Text-blob cache + index scratch space
//! snippets_dir = "snippets"     # Source files for [snippet:...] shortcodes
//! watermark = ""                # PNG composited onto photographic derivatives
//! overlay_font = ""             # TTF used for the link-bar overlay text
//!
//! [[categories]]
//! name = "journal"              # Directory under the content root
//! front = true                  # Member posts appear on the front page
//! listed = true                 # false: no listing pages, still in "all"
//!
//! [pagination]
//! per_page = 10                 # Posts per listing page
//! rss_per_page = 15             # Entries in feed/index.xml
//!
//! [images]
//! quality = 83                  # JPEG re-encode quality
//! watermark_below = 2000        # Watermark derivatives smaller than this
//! camera_models = []            # "Is a photo" allow-list (exact model match)
//! copyright_patterns = []       # "Is a photo" patterns (regex over copyright)
//!
//! [[images.sizes]]              # Size buckets, ascending
//! max = 90
//! tag = "90c"
//! crop = true
//!
//! [processing]
//! max_workers = 4               # Omit for auto = CPU cores
//!
//! [cache]
//! enabled = true                # false: cache get/set become no-ops
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse — override just the values you want. Unknown
//! keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site identity (title, canonical URL, author).
    pub site: SiteMeta,
    /// Filesystem layout for inputs and outputs.
    pub paths: PathsConfig,
    /// Content categories, one directory each under the content root.
    pub categories: Vec<CategoryConfig>,
    /// Listing-page and feed sizes.
    pub pagination: PaginationConfig,
    /// Image derivation settings (buckets, quality, classification).
    pub images: ImagesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Text-blob cache switch.
    pub cache: CacheConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site: SiteMeta::default(),
            paths: PathsConfig::default(),
            categories: default_categories(),
            pagination: PaginationConfig::default(),
            images: ImagesConfig::default(),
            processing: ProcessingConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 0-100".into(),
            ));
        }
        if self.images.sizes.is_empty() {
            return Err(ConfigError::Validation(
                "images.sizes must not be empty".into(),
            ));
        }
        if !self.images.sizes.windows(2).all(|w| w[0].max < w[1].max) {
            return Err(ConfigError::Validation(
                "images.sizes must be strictly ascending by max".into(),
            ));
        }
        if !self.images.sizes.iter().any(|b| b.fallback) {
            return Err(ConfigError::Validation(
                "images.sizes needs one bucket with fallback = true".into(),
            ));
        }
        if self.pagination.per_page == 0 || self.pagination.rss_per_page == 0 {
            return Err(ConfigError::Validation(
                "pagination values must be non-zero".into(),
            ));
        }
        if self.categories.is_empty() {
            return Err(ConfigError::Validation(
                "at least one [[categories]] entry is required".into(),
            ));
        }
        Ok(())
    }

    /// The directory image derivatives are written to.
    pub fn files_root(&self) -> PathBuf {
        self.paths.target_root.join(&self.paths.files_dir)
    }

    /// Absolute URL for a site-relative path.
    pub fn url_for(&self, rel: &str) -> String {
        format!("{}/{}", self.site.url.trim_end_matches('/'), rel)
    }
}

/// Site identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteMeta {
    pub title: String,
    /// Canonical base URL, no trailing slash.
    pub url: String,
    pub author: String,
}

impl Default for SiteMeta {
    fn default() -> Self {
        Self {
            title: "A Weblog".to_string(),
            url: "https://example.com".to_string(),
            author: String::new(),
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Output directory for the generated site.
    pub target_root: PathBuf,
    /// Subdirectory of the target for image derivatives.
    pub files_dir: String,
    /// Cache directory (text blobs, index scratch space, run lock).
    pub cache_dir: PathBuf,
    /// Directory holding source files referenced by `[snippet:...]`.
    pub snippets_dir: PathBuf,
    /// PNG composited onto photographic derivatives. Empty disables it.
    pub watermark: PathBuf,
    /// TTF for the link-bar overlay text. Empty draws the bar untexted.
    pub overlay_font: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            target_root: PathBuf::from("public"),
            files_dir: "files".to_string(),
            cache_dir: PathBuf::from(".linotype-cache"),
            snippets_dir: PathBuf::from("snippets"),
            watermark: PathBuf::new(),
            overlay_font: PathBuf::new(),
        }
    }
}

/// One content category: a directory of source files under the content root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoryConfig {
    pub name: String,
    /// Member posts also appear in the front-page taxonomy.
    pub front: bool,
    /// When false, the category taxonomy emits no listing pages. Members
    /// still count toward "all" and the sitemap.
    pub listed: bool,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            front: false,
            listed: true,
        }
    }
}

fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig {
            name: "journal".to_string(),
            front: true,
            listed: true,
        },
        CategoryConfig {
            name: "photos".to_string(),
            front: true,
            listed: true,
        },
        CategoryConfig {
            name: "pages".to_string(),
            front: false,
            listed: false,
        },
    ]
}

/// Listing-page and feed sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaginationConfig {
    /// Posts per listing page.
    pub per_page: usize,
    /// Entries in the feed document.
    pub rss_per_page: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            per_page: 10,
            rss_per_page: 15,
        }
    }
}

/// One derivative size bucket.
///
/// `max` is the target on the scale edge (the longer edge, or the shorter
/// one for crop buckets). `tag` lands in the output filename
/// (`stem-360.jpg`). The `fallback` bucket is the `<img>` source in figure
/// fragments; the largest bucket doubles as the click-through target and is
/// aliased under the original basename.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizeBucket {
    pub max: u32,
    pub tag: String,
    pub crop: bool,
    pub fallback: bool,
}

/// Image derivation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Size buckets, ascending by `max`.
    pub sizes: Vec<SizeBucket>,
    /// JPEG re-encode quality (0 = worst, 100 = best).
    pub quality: u32,
    /// Derivatives with `max` below this carry the watermark (photos only).
    pub watermark_below: u32,
    /// Camera models whose images classify as authored photographs.
    pub camera_models: Vec<String>,
    /// Copyright-notice patterns (regex) that also classify as photographs.
    pub copyright_patterns: Vec<String>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            sizes: vec![
                SizeBucket {
                    max: 90,
                    tag: "90c".to_string(),
                    crop: true,
                    fallback: false,
                },
                SizeBucket {
                    max: 360,
                    tag: "360".to_string(),
                    crop: false,
                    fallback: false,
                },
                SizeBucket {
                    max: 720,
                    tag: "720".to_string(),
                    crop: false,
                    fallback: true,
                },
                SizeBucket {
                    max: 1280,
                    tag: "1280".to_string(),
                    crop: false,
                    fallback: false,
                },
            ],
            quality: 83,
            watermark_below: 2000,
            camera_models: Vec::new(),
            copyright_patterns: Vec::new(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel parse/render workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
}

/// Text-blob cache switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Load `config.toml` from the content root, falling back to defaults if
/// the file doesn't exist. A present-but-invalid file is an error.
pub fn load_config(content_root: &Path) -> Result<SiteConfig, ConfigError> {
    let path = content_root.join("config.toml");
    let config = if path.exists() {
        let content = fs::read_to_string(&path)?;
        toml::from_str(&content)?
    } else {
        SiteConfig::default()
    };
    config.validate()?;
    Ok(config)
}

/// A stock `config.toml` with every option present.
pub fn stock_config_toml() -> String {
    let defaults = SiteConfig::default();
    let body = toml::to_string_pretty(&defaults).unwrap_or_default();
    format!(
        "# linotype configuration\n\
         # Every key is optional; the values below are the stock defaults.\n\
         # Unknown keys are rejected to catch typos early.\n\n{body}"
    )
}
