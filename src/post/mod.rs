//! Post entities and variant handlers.
//!
//! One source file becomes one [`Post`]. The three variants — article,
//! photo, page — share a single capability surface (parse, render, write,
//! index) and differ only in how they are parsed and enriched:
//!
//! | Variant | Source | Metadata | Enrichment |
//! |---|---|---|---|
//! | [`article`] | markdown + front matter | header keys | shortcodes, images |
//! | [`photo`] | image file | embedded (extraction tool) | derivatives, GPS |
//! | [`page`] | raw markdown, no header | first heading | images only |
//!
//! Variant selection is a closed sum type ([`PostKind`]), decided by the
//! source file itself: image extensions parse as photos, documents with a
//! metadata header as articles, headerless documents as pages.
//!
//! ## Freshness
//!
//! A post's output is up to date iff it exists and its mtime equals the
//! post's resolved timestamp (`max(published, updated)`) — an exact match,
//! not an inequality. The source file's own mtime is synchronized to the
//! same value at parse time, so every later freshness decision is a pure
//! mtime comparison. `--force-html` bypasses the check unconditionally.

pub mod article;
pub mod frontmatter;
pub mod page;
pub mod photo;

use crate::config::SiteConfig;
use crate::extract::Extractor;
use crate::imaging::operations::{DeriveEngine, DerivativeSet, PhotoClassifier};
use crate::imaging::{BackendError, ImageBackend};
use crate::markdown::{Markdown, MarkdownError};
use crate::naming;
use crate::render::{RenderError, Renderer, redirect_stub};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub use frontmatter::{FrontMatter, ReactionKind, Reactions};

#[derive(Error, Debug)]
pub enum PostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Markdown error: {0}")]
    Markdown(#[from] MarkdownError),
    #[error("Imaging error: {0}")]
    Imaging(#[from] BackendError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("unsupported source file: {0}")]
    Unsupported(PathBuf),
}

/// The closed set of post variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostKind {
    Article,
    Photo,
    Page,
}

/// One discrete content item tracked by the build.
#[derive(Debug, Clone)]
pub struct Post {
    pub kind: PostKind,
    pub slug: String,
    /// Base-36 encoding of the publish epoch; unique across the corpus.
    pub shortslug: String,
    pub title: String,
    pub category: String,
    pub published: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
    pub raw_content: String,
    pub rendered_html: String,
    pub raw_summary: Option<String>,
    pub rendered_summary: Option<String>,
    pub tags: Vec<String>,
    pub reactions: Reactions,
    /// Alias slugs that must resolve to this post.
    pub redirects: Vec<String>,
    /// Bound derivative set for photos and posts with a lead image.
    pub image: Option<DerivativeSet>,
    /// Decimal degrees, photos only.
    pub location: Option<(f64, f64)>,
    pub language: Option<String>,
    pub snippet: String,
    pub source: PathBuf,
}

/// What `write` did for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Fresh,
}

impl Post {
    /// Publish epoch in whole seconds — the taxonomy key.
    pub fn epoch(&self) -> i64 {
        self.published.timestamp()
    }

    /// The single timestamp freshness checks compare against:
    /// whichever of published/updated is latest.
    pub fn resolved_time(&self) -> DateTime<Utc> {
        match self.updated {
            Some(updated) if updated > self.published => updated,
            _ => self.published,
        }
    }

    pub fn resolved_epoch(&self) -> i64 {
        self.resolved_time().timestamp()
    }

    /// Re-key the post after global collision resolution. The bumped epoch
    /// becomes the effective publish time, and the shortslug shifts with
    /// it — insertion order decides which of two same-second posts moves.
    pub fn apply_epoch(&mut self, epoch: i64) {
        if let Some(published) = DateTime::from_timestamp(epoch, 0) {
            self.published = published;
        }
        self.shortslug = naming::shortslug(epoch);
    }

    /// Site-relative URL path, with trailing slash.
    pub fn url_path(&self) -> String {
        format!("{}/{}/", self.category, self.slug)
    }

    pub fn permalink(&self, config: &SiteConfig) -> String {
        config.url_for(&self.url_path())
    }

    /// Primary output file.
    pub fn output_path(&self, config: &SiteConfig) -> PathBuf {
        config
            .paths
            .target_root
            .join(&self.category)
            .join(&self.slug)
            .join("index.html")
    }

    /// Canonical slug-only alias.
    pub fn alias_path(&self, config: &SiteConfig) -> PathBuf {
        config
            .paths
            .target_root
            .join(&self.slug)
            .join("index.html")
    }

    /// A target is up to date iff it exists and its mtime equals the
    /// post's resolved timestamp. Exact match: an older *or* newer output
    /// is stale.
    pub fn is_fresh(&self, output: &Path, force: bool) -> bool {
        if force {
            return false;
        }
        match std::fs::metadata(output) {
            Ok(meta) => {
                FileTime::from_last_modification_time(&meta).unix_seconds()
                    == self.resolved_epoch()
            }
            Err(_) => false,
        }
    }

    /// Render the full page for this post through the templating seam.
    pub fn render(&self, renderer: &dyn Renderer, config: &SiteConfig) -> Result<String, PostError> {
        Ok(crate::render::render_post(renderer, config, self)?)
    }

    /// Write the rendered page, stamp its mtime to the resolved timestamp,
    /// and mirror it at the canonical slug-only alias. Fresh targets are
    /// skipped silently.
    pub fn write(
        &self,
        renderer: &dyn Renderer,
        config: &SiteConfig,
        force: bool,
    ) -> Result<WriteOutcome, PostError> {
        let output = self.output_path(config);
        let alias = self.alias_path(config);
        if self.is_fresh(&output, force) && self.is_fresh(&alias, force) {
            debug!(slug = %self.slug, "post output fresh, skipping");
            return Ok(WriteOutcome::Fresh);
        }

        let html = self.render(renderer, config)?;
        let stamp = FileTime::from_unix_time(self.resolved_epoch(), 0);
        for path in [&output, &alias] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &html)?;
            filetime::set_file_mtime(path, stamp)?;
        }
        Ok(WriteOutcome::Written)
    }

    /// The post's search-index document.
    pub fn index_doc(&self, config: &SiteConfig) -> crate::search::IndexDoc {
        crate::search::IndexDoc::from_post(self, config)
    }

    /// Write redirect stubs for the shortslug and every alias slug.
    /// A stub with the right content already on disk is left untouched.
    pub fn write_redirects(&self, config: &SiteConfig) -> Result<(), PostError> {
        let permalink = self.permalink(config);
        let html = redirect_stub(&permalink).into_string();
        let mut stubs: Vec<String> = vec![format!("s/{}", self.shortslug)];
        stubs.extend(self.redirects.iter().cloned());
        for stub in stubs {
            let path = config.paths.target_root.join(&stub).join("index.html");
            if std::fs::read_to_string(&path).map(|old| old == html).unwrap_or(false) {
                continue;
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &html)?;
        }
        Ok(())
    }
}

/// Shared services handed to every parse worker. All references are to
/// orchestrator-owned values; workers never mutate through them.
pub struct ParseCtx<'a, B: ImageBackend> {
    pub config: &'a SiteConfig,
    pub content_root: &'a Path,
    pub engine: &'a DeriveEngine<'a, B>,
    pub extractor: &'a Extractor<'a>,
    pub classifier: &'a PhotoClassifier,
    pub markdown: &'a dyn Markdown,
    pub force_images: bool,
}

impl<'a, B: ImageBackend> ParseCtx<'a, B> {
    /// Directory article/page shortcode images are resolved against.
    pub fn media_root(&self) -> PathBuf {
        self.content_root.join(&self.config.paths.files_dir)
    }
}

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];

/// Parse one source file into a typed post.
///
/// Image extensions parse as photos. Documents with a metadata header
/// parse as articles, headerless documents as pages.
pub fn parse_source<B: ImageBackend>(
    ctx: &ParseCtx<'_, B>,
    category: &str,
    path: &Path,
) -> Result<Post, PostError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let post = if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
        photo::parse_photo(ctx, category, path)?
    } else if matches!(ext.as_str(), "md" | "txt" | "markdown") {
        let source = std::fs::read_to_string(path)?;
        let (front, body) = frontmatter::parse_document(&source);
        match front {
            Some(front) => article::parse_article(ctx, category, path, front, body)?,
            None => page::parse_page(ctx, category, path, body)?,
        }
    } else {
        return Err(PostError::Unsupported(path.to_path_buf()));
    };

    sync_source_mtime(path, post.resolved_epoch());
    Ok(post)
}

/// Keep the source file's mtime synchronized to the post's resolved
/// timestamp, so freshness checks stay pure mtime comparisons.
fn sync_source_mtime(path: &Path, resolved: i64) {
    let current = crate::cache::mtime_token(path).ok();
    if current != Some(resolved) {
        if let Err(err) = filetime::set_file_mtime(path, FileTime::from_unix_time(resolved, 0)) {
            warn!(path = %path.display(), %err, "cannot sync source mtime");
        }
    }
}

/// Slug for a source path: the filename stem, normalized.
pub fn slug_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    naming::slug_from_stem(&stem)
}

/// Best-effort language detection over raw content.
pub fn detect_language(text: &str) -> Option<String> {
    whatlang::detect(text).map(|info| info.lang().code().to_string())
}

const SNIPPET_LEN: usize = 240;

/// Search snippet: the leading run of the raw content, cut at a word
/// boundary.
pub fn make_snippet(text: &str) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.len() <= SNIPPET_LEN {
        return collapsed;
    }
    let cut = collapsed[..SNIPPET_LEN]
        .rfind(' ')
        .unwrap_or(SNIPPET_LEN);
    format!("{}…", &collapsed[..cut])
}

/// Publish time fallback when a source carries no explicit timestamp:
/// the file's own modification time.
pub fn file_time(path: &Path) -> DateTime<Utc> {
    crate::cache::mtime_token(path)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}
