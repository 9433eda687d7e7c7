//! Taxonomy aggregation and pagination.
//!
//! A taxonomy is a named, time-ordered grouping of posts: a tag, a
//! category, the synthetic "all" group, or the front page. Posts are keyed
//! by publish epoch in a `BTreeMap` and iterated newest-first; an epoch
//! collision bumps the incoming key one second at a time until a slot is
//! free — the same probing rule shortslugs use, deterministic and
//! insertion-order dependent. The bump affects this taxonomy's key only;
//! global identity was already settled when the orchestrator merged the
//! post.
//!
//! ## Freshness
//!
//! Each listing page's output mtime is stamped to the most recent
//! contained post's resolved timestamp, so the up-to-date check for
//! taxonomy pages is "did any member of this page change" — a pure mtime
//! comparison, no content diffing.

use crate::config::SiteConfig;
use crate::post::Post;
use crate::render::{self, RenderError, Renderer, TemplateVars};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TaxonomyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// A named, time-ordered group of posts with paginated output.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    pub name: String,
    /// Site-relative base path: `""` (front page), `"tag/rust"`,
    /// `"journal"`. Never with a trailing slash.
    pub slug: String,
    /// Non-listed taxonomies skip page emission but still count toward
    /// "all" and the sitemap.
    pub listed: bool,
    per_page: usize,
    posts: BTreeMap<i64, Arc<Post>>,
}

/// What `write` did.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaxonomyWriteStats {
    pub pages_written: u32,
    pub pages_fresh: u32,
    pub feed_written: bool,
}

impl Taxonomy {
    pub fn new(
        name: impl Into<String>,
        slug: impl Into<String>,
        per_page: usize,
        listed: bool,
    ) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            listed,
            per_page,
            posts: BTreeMap::new(),
        }
    }

    /// Insert a post keyed by its publish epoch, probing forward one
    /// second at a time on collision.
    pub fn append(&mut self, post: Arc<Post>) {
        let mut epoch = post.epoch();
        while self.posts.contains_key(&epoch) {
            epoch += 1;
        }
        self.posts.insert(epoch, post);
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Members, newest first.
    pub fn iter_desc(&self) -> impl Iterator<Item = &Arc<Post>> {
        self.posts.values().rev()
    }

    /// The key a post ended up under (tests and diagnostics).
    pub fn key_of(&self, slug: &str) -> Option<i64> {
        self.posts
            .iter()
            .find(|(_, p)| p.slug == slug)
            .map(|(k, _)| *k)
    }

    pub fn page_count(&self) -> usize {
        self.len().div_ceil(self.per_page)
    }

    /// Page `n` (1-based), newest first.
    fn page(&self, n: usize) -> Vec<&Post> {
        self.iter_desc()
            .skip((n - 1) * self.per_page)
            .take(self.per_page)
            .map(|p| p.as_ref())
            .collect()
    }

    fn base_dir(&self, config: &SiteConfig) -> PathBuf {
        if self.slug.is_empty() {
            config.paths.target_root.clone()
        } else {
            config.paths.target_root.join(&self.slug)
        }
    }

    fn page_output(&self, config: &SiteConfig, n: usize) -> PathBuf {
        let base = self.base_dir(config);
        if n <= 1 {
            base.join("index.html")
        } else {
            base.join("page").join(n.to_string()).join("index.html")
        }
    }

    /// Site-relative URLs of every listing page, for the sitemap.
    pub fn page_urls(&self) -> Vec<String> {
        let base = if self.slug.is_empty() {
            String::new()
        } else {
            format!("{}/", self.slug)
        };
        (1..=self.page_count())
            .map(|n| {
                if n <= 1 {
                    base.clone()
                } else {
                    format!("{base}page/{n}/")
                }
            })
            .collect()
    }

    /// Emit `ceil(n / per_page)` listing pages plus the feed document.
    ///
    /// Pages whose mtime already equals their newest member's timestamp
    /// are skipped, unless `force`. Non-listed taxonomies emit nothing.
    pub fn write(
        &self,
        renderer: &dyn Renderer,
        config: &SiteConfig,
        force: bool,
    ) -> Result<TaxonomyWriteStats, TaxonomyError> {
        let mut stats = TaxonomyWriteStats::default();
        if !self.listed || self.is_empty() {
            return Ok(stats);
        }

        let page_count = self.page_count();
        for n in 1..=page_count {
            let posts = self.page(n);
            let newest_epoch = posts
                .iter()
                .map(|p| p.resolved_epoch())
                .max()
                .unwrap_or_default();
            let output = self.page_output(config, n);

            if !force && mtime_matches(&output, newest_epoch) {
                debug!(taxonomy = %self.name, page = n, "listing page fresh, skipping");
                stats.pages_fresh += 1;
                continue;
            }

            let content = render::listing_content(&posts, &self.slug, n, page_count);
            let vars = TemplateVars::new()
                .set("title", self.name.clone())
                .set("site_title", config.site.title.clone())
                .set("canonical", config.url_for(&self.page_urls()[n - 1]))
                .set("content", content);
            let html = renderer.render("listing", &vars)?;

            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&output, html)?;
            filetime::set_file_mtime(&output, FileTime::from_unix_time(newest_epoch, 0))?;
            stats.pages_written += 1;
        }

        stats.feed_written = self.write_feed(config, force)?;
        Ok(stats)
    }

    /// The feed document: the newest `rss_per_page` entries.
    fn write_feed(&self, config: &SiteConfig, force: bool) -> Result<bool, TaxonomyError> {
        let newest: Vec<&Post> = self
            .iter_desc()
            .take(config.pagination.rss_per_page)
            .map(|p| p.as_ref())
            .collect();
        let newest_epoch = newest
            .iter()
            .map(|p| p.resolved_epoch())
            .max()
            .unwrap_or_default();
        let built = newest
            .first()
            .map(|p| p.resolved_time())
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        let output = self.base_dir(config).join("feed").join("index.xml");
        if !force && mtime_matches(&output, newest_epoch) {
            return Ok(false);
        }

        let xml = render::feed_xml(config, &self.name, &newest, built);
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&output, xml)?;
        filetime::set_file_mtime(&output, FileTime::from_unix_time(newest_epoch, 0))?;
        Ok(true)
    }
}

fn mtime_matches(path: &std::path::Path, epoch: i64) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => FileTime::from_last_modification_time(&meta).unix_seconds() == epoch,
        Err(_) => false,
    }
}
