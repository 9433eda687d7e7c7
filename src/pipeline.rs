//! Build orchestration.
//!
//! The pipeline owns the run lifecycle:
//!
//! 1. Acquire the run lock (fatal if a build is already running).
//! 2. Discover source files, one directory per configured category.
//! 3. Parse files on a bounded worker pool — each worker reads one file
//!    and returns one [`Post`]; nothing shared is mutated inside a worker.
//! 4. Merge results sequentially: global epoch/shortslug collision
//!    resolution, then insertion into the "all", front-page, per-category,
//!    and per-tag taxonomies. The merge is the synchronization point — all
//!    structural mutation happens here, on this thread.
//! 5. Write posts and redirect stubs (parallel, independent targets),
//!    then the search index, taxonomy pages, feeds, and sitemap
//!    (sequential).
//!
//! A worker failure is caught and logged; that file is simply absent from
//! this build. The lock being present at startup aborts before any output
//! is touched.

use crate::cache::{CacheStats, CacheStore};
use crate::config::{self, SiteConfig};
use crate::extract::Extractor;
use crate::imaging::operations::{DeriveEngine, PhotoClassifier};
use crate::imaging::{ImageBackend, RustBackend};
use crate::lock::{LockError, RunLock};
use crate::markdown::{Markdown, ToolMarkdown};
use crate::naming;
use crate::post::{self, ParseCtx, Post, WriteOutcome};
use crate::render::{BuiltinRenderer, Renderer};
use crate::search::{IndexDoc, SearchError, SearchIndex};
use crate::taxonomy::{Taxonomy, TaxonomyError};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Search error: {0}")]
    Search(#[from] SearchError),
    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),
}

/// Flags from the CLI surface.
#[derive(Debug, Clone, Default)]
pub struct BuildFlags {
    /// Rewrite every post page regardless of freshness.
    pub force_html: bool,
    /// Regenerate every image derivative regardless of existing outputs.
    pub force_images: bool,
    /// Rebuild a single item, `category/filename`. Aggregate outputs
    /// (taxonomies, feed, sitemap, index) are left alone.
    pub only: Option<String>,
    /// Disable the text-blob cache for this run.
    pub no_cache: bool,
}

/// What a build did, for the run summary.
#[derive(Debug, Default, Clone)]
pub struct BuildReport {
    pub parsed: u32,
    pub failed: u32,
    pub posts_written: u32,
    pub posts_fresh: u32,
    pub taxonomy_pages_written: u32,
    pub taxonomy_pages_fresh: u32,
    pub indexed: u32,
    pub extraction_cache: CacheStats,
}

/// Run the full pipeline with the production backend and tools.
pub fn build(
    content_root: &Path,
    config: &SiteConfig,
    flags: &BuildFlags,
) -> Result<BuildReport, BuildError> {
    let backend = RustBackend::new();
    build_with(
        &backend,
        &BuiltinRenderer,
        &ToolMarkdown,
        content_root,
        config,
        flags,
    )
}

/// Run the pipeline against explicit collaborators (tests substitute a
/// mock backend and a pure markdown stand-in).
pub fn build_with<B: ImageBackend>(
    backend: &B,
    renderer: &dyn Renderer,
    markdown: &dyn Markdown,
    content_root: &Path,
    config: &SiteConfig,
    flags: &BuildFlags,
) -> Result<BuildReport, BuildError> {
    // Single-flight guard: fatal before any work if a run is live.
    let _lock = RunLock::acquire(&config.paths.cache_dir)?;

    let store = CacheStore::new(
        &config.paths.cache_dir,
        config.cache.enabled && !flags.no_cache,
    );
    let extractor = Extractor::new(&store);
    let classifier = PhotoClassifier::from_config(&config.images);
    let engine = DeriveEngine::new(
        backend,
        config.files_root(),
        config.paths.files_dir.clone(),
        &config.images,
        optional_path(&config.paths.watermark),
        optional_path(&config.paths.overlay_font),
    );
    let ctx = ParseCtx {
        config,
        content_root,
        engine: &engine,
        extractor: &extractor,
        classifier: &classifier,
        markdown,
        force_images: flags.force_images,
    };

    let files = discover(content_root, config, flags.only.as_deref())?;
    info!(files = files.len(), "discovered source files");

    // Parallel parse: workers produce over a channel, this thread is the
    // single consumer that merges.
    let mut report = BuildReport::default();
    let (tx, rx) = mpsc::channel();
    match rayon::ThreadPoolBuilder::new()
        .num_threads(config::effective_workers(&config.processing))
        .build()
    {
        Ok(pool) => pool.install(|| {
            files.par_iter().for_each_with(tx, |tx, (category, path)| {
                let result = post::parse_source(&ctx, category, path);
                tx.send((path.clone(), result)).ok();
            });
        }),
        Err(err) => {
            warn!(%err, "thread pool unavailable, parsing sequentially");
            for (category, path) in &files {
                let result = post::parse_source(&ctx, category, path);
                tx.send((path.clone(), result)).ok();
            }
            drop(tx);
        }
    }

    let mut posts = Vec::new();
    for (path, result) in rx {
        match result {
            Ok(parsed) => posts.push(parsed),
            Err(err) => {
                error!(path = %path.display(), %err, "parse failed, item dropped");
                report.failed += 1;
            }
        }
    }
    // Deterministic merge order regardless of worker completion order.
    posts.sort_by(|a, b| (a.epoch(), &a.slug).cmp(&(b.epoch(), &b.slug)));
    report.parsed = posts.len() as u32;

    let mut taxonomies = merge(posts, config);

    // Render + write posts and their redirect stubs; targets are
    // independent, so this pass parallelizes freely.
    let all_posts: Vec<Arc<Post>> = taxonomies.all.iter_desc().cloned().collect();
    let outcomes: Vec<Option<WriteOutcome>> = all_posts
        .par_iter()
        .map(|post| {
            let outcome = match post.write(renderer, config, flags.force_html) {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(slug = %post.slug, %err, "write failed, item dropped");
                    return None;
                }
            };
            if let Err(err) = post.write_redirects(config) {
                error!(slug = %post.slug, %err, "redirect stubs failed");
            }
            Some(outcome)
        })
        .collect();
    for outcome in outcomes {
        match outcome {
            Some(WriteOutcome::Written) => report.posts_written += 1,
            Some(WriteOutcome::Fresh) => report.posts_fresh += 1,
            None => report.failed += 1,
        }
    }

    if flags.only.is_some() {
        // Single-item mode regenerates that item only; aggregates would
        // otherwise be rewritten from a one-post view of the corpus.
        debug!("single-item build, skipping taxonomies, index, and sitemap");
        report.extraction_cache = extractor.stats();
        return Ok(report);
    }

    for taxonomy in taxonomies.iter_mut() {
        let stats = taxonomy.write(renderer, config, flags.force_html)?;
        report.taxonomy_pages_written += stats.pages_written;
        report.taxonomy_pages_fresh += stats.pages_fresh;
    }

    // Rebuild the index only when some input actually changed; an
    // untouched rerun leaves every published file, the index included,
    // with its previous mtime.
    let index_current = config.paths.target_root.join("search.db").exists()
        && report.posts_written == 0
        && report.taxonomy_pages_written == 0
        && !flags.force_html;
    if index_current {
        debug!("corpus unchanged, keeping published search index");
    } else {
        index_corpus(&mut report, config, &taxonomies)?;
    }

    write_sitemap(config, &taxonomies)?;

    report.extraction_cache = extractor.stats();
    Ok(report)
}

fn optional_path(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path.to_path_buf())
    }
}

/// Source files per category, in stable order. A missing category
/// directory is logged and skipped — not fatal.
fn discover(
    content_root: &Path,
    config: &SiteConfig,
    only: Option<&str>,
) -> Result<Vec<(String, PathBuf)>, BuildError> {
    let mut files = Vec::new();
    for category in &config.categories {
        let dir = content_root.join(&category.name);
        if !dir.is_dir() {
            warn!(category = %category.name, "missing content category directory, skipping");
            continue;
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .map(|n| !n.to_string_lossy().starts_with('.'))
                        .unwrap_or(false)
            })
            .collect();
        entries.sort();
        for path in entries {
            files.push((category.name.clone(), path));
        }
    }

    if let Some(only) = only {
        files.retain(|(category, path)| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            format!("{category}/{name}") == only
        });
        if files.is_empty() {
            warn!(only, "no source file matches the single-item filter");
        }
    }

    Ok(files)
}

/// The taxonomy family one build maintains.
pub struct Taxonomies {
    /// Every post; never renders pages itself but feeds the sitemap.
    pub all: Taxonomy,
    /// The front page, at the target root.
    pub front: Taxonomy,
    pub categories: Vec<Taxonomy>,
    pub tags: BTreeMap<String, Taxonomy>,
}

impl Taxonomies {
    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Taxonomy> {
        std::iter::once(&mut self.all)
            .chain(std::iter::once(&mut self.front))
            .chain(self.categories.iter_mut())
            .chain(self.tags.values_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Taxonomy> {
        std::iter::once(&self.all)
            .chain(std::iter::once(&self.front))
            .chain(self.categories.iter())
            .chain(self.tags.values())
    }
}

/// Sequential merge: resolve each post's global epoch, then insert it
/// into every taxonomy it belongs to. The only place post identity and
/// shared structures are mutated.
fn merge(posts: Vec<Post>, config: &SiteConfig) -> Taxonomies {
    let per_page = config.pagination.per_page;
    let mut taxonomies = Taxonomies {
        all: Taxonomy::new("All posts", "all", per_page, false),
        front: Taxonomy::new(config.site.title.clone(), "", per_page, true),
        categories: config
            .categories
            .iter()
            .map(|c| Taxonomy::new(c.name.clone(), c.name.clone(), per_page, c.listed))
            .collect(),
        tags: BTreeMap::new(),
    };

    let front_categories: BTreeSet<&str> = config
        .categories
        .iter()
        .filter(|c| c.front)
        .map(|c| c.name.as_str())
        .collect();

    let mut taken = BTreeSet::new();
    for mut post in posts {
        let epoch = naming::probe_epoch(&mut taken, post.epoch());
        if epoch != post.epoch() {
            // The loser of a same-second race shifts: publish time,
            // shortslug, and sort position all move to the probed epoch.
            warn!(slug = %post.slug, epoch, "publish epoch collision, post re-keyed");
            post.apply_epoch(epoch);
        }

        let post = Arc::new(post);
        taxonomies.all.append(post.clone());
        if front_categories.contains(post.category.as_str()) {
            taxonomies.front.append(post.clone());
        }
        if let Some(category) = taxonomies
            .categories
            .iter_mut()
            .find(|t| t.name == post.category)
        {
            category.append(post.clone());
        }
        for tag in &post.tags {
            let slug = naming::slug_from_stem(tag);
            let taxonomy = taxonomies
                .tags
                .entry(slug.clone())
                .or_insert_with(|| {
                    Taxonomy::new(tag.clone(), format!("tag/{slug}"), per_page, true)
                });
            taxonomy.append(post.clone());
        }
    }
    taxonomies
}

/// Build the search index in its scratch location and swap it in.
fn index_corpus(
    report: &mut BuildReport,
    config: &SiteConfig,
    taxonomies: &Taxonomies,
) -> Result<(), BuildError> {
    let mut index = SearchIndex::create(&config.paths.target_root)?;
    for post in taxonomies.all.iter_desc() {
        index.add(&post.index_doc(config))?;
        report.indexed += 1;
    }
    for taxonomy in taxonomies.categories.iter().chain(taxonomies.tags.values()) {
        if taxonomy.is_empty() {
            continue;
        }
        index.add(&IndexDoc::from_taxonomy(taxonomy, config))?;
        report.indexed += 1;
    }
    index.publish()?;
    Ok(())
}

/// Flat sitemap: one canonical URL per line, posts first, then every
/// taxonomy listing page.
fn write_sitemap(config: &SiteConfig, taxonomies: &Taxonomies) -> Result<(), BuildError> {
    let mut urls = BTreeSet::new();
    for post in taxonomies.all.iter_desc() {
        urls.insert(post.permalink(config));
    }
    for taxonomy in taxonomies.iter().filter(|t| t.listed) {
        for page in taxonomy.page_urls() {
            urls.insert(config.url_for(&page));
        }
    }

    let mut body: String = urls.into_iter().collect::<Vec<_>>().join("\n");
    body.push('\n');
    std::fs::create_dir_all(&config.paths.target_root)?;
    let path = config.paths.target_root.join("sitemap.txt");
    // Unchanged content keeps its mtime.
    if std::fs::read_to_string(&path).map(|old| old == body).unwrap_or(false) {
        return Ok(());
    }
    std::fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::Dimensions;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::FakeMarkdown;
    use filetime::FileTime;
    use tempfile::TempDir;

    struct Site {
        tmp: TempDir,
        config: SiteConfig,
    }

    impl Site {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let content = tmp.path().join("content");
            for dir in ["journal", "photos", "pages", "files"] {
                std::fs::create_dir_all(content.join(dir)).unwrap();
            }
            let mut config = SiteConfig::default();
            config.paths.target_root = tmp.path().join("public");
            config.paths.cache_dir = tmp.path().join("cache");
            config.paths.snippets_dir = tmp.path().join("snippets");
            Self { tmp, config }
        }

        fn content_root(&self) -> PathBuf {
            self.tmp.path().join("content")
        }

        fn write_article(&self, name: &str, text: &str) {
            std::fs::write(self.content_root().join("journal").join(name), text).unwrap();
        }

        fn build(&self, flags: &BuildFlags) -> Result<BuildReport, BuildError> {
            self.build_with_dims(flags, vec![])
        }

        fn build_with_dims(
            &self,
            flags: &BuildFlags,
            dims: Vec<Dimensions>,
        ) -> Result<BuildReport, BuildError> {
            let backend = MockBackend::with_dimensions(dims);
            build_with(
                &backend,
                &BuiltinRenderer,
                &FakeMarkdown,
                &self.content_root(),
                &self.config,
                flags,
            )
        }
    }

    // =========================================================================
    // End-to-end build
    // =========================================================================

    #[test]
    fn build_writes_posts_taxonomies_feed_and_sitemap() {
        let site = Site::new();
        site.write_article(
            "first.md",
            "title: First\ntags: rust\npublished: 2024-01-01\n\nHello.\n",
        );
        site.write_article(
            "second.md",
            "title: Second\ntags: rust, builds\npublished: 2024-02-01\n\nAgain.\n",
        );

        let report = site.build(&BuildFlags::default()).unwrap();
        assert_eq!(report.parsed, 2);
        assert_eq!(report.posts_written, 2);
        assert_eq!(report.failed, 0);

        let public = site.tmp.path().join("public");
        assert!(public.join("journal/first/index.html").exists());
        assert!(public.join("first/index.html").exists()); // canonical alias
        assert!(public.join("index.html").exists()); // front page
        assert!(public.join("journal/index.html").exists());
        assert!(public.join("tag/rust/index.html").exists());
        assert!(public.join("feed/index.xml").exists());
        assert!(public.join("sitemap.txt").exists());
        assert!(public.join("search.db").exists());

        let sitemap = std::fs::read_to_string(public.join("sitemap.txt")).unwrap();
        assert!(sitemap.contains("https://example.com/journal/first/"));
        assert!(sitemap.contains("https://example.com/tag/builds/"));
    }

    #[test]
    fn rerun_without_changes_is_idempotent() {
        let site = Site::new();
        site.write_article(
            "steady.md",
            "title: Steady\npublished: 2024-01-01\n\nBody.\n",
        );

        site.build(&BuildFlags::default()).unwrap();
        let public = site.tmp.path().join("public");
        let watched = [
            public.join("journal/steady/index.html"),
            public.join("index.html"),
            public.join("feed/index.xml"),
            public.join("sitemap.txt"),
            public.join("search.db"),
        ];
        let before: Vec<i64> = watched
            .iter()
            .map(|p| crate::cache::mtime_token(p).unwrap())
            .collect();

        let report = site.build(&BuildFlags::default()).unwrap();
        assert_eq!(report.posts_written, 0);
        assert_eq!(report.posts_fresh, 1);
        assert_eq!(report.taxonomy_pages_written, 0);

        let after: Vec<i64> = watched
            .iter()
            .map(|p| crate::cache::mtime_token(p).unwrap())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn force_html_rewrites_everything() {
        let site = Site::new();
        site.write_article(
            "steady.md",
            "title: Steady\npublished: 2024-01-01\n\nBody.\n",
        );
        site.build(&BuildFlags::default()).unwrap();

        let report = site
            .build(&BuildFlags {
                force_html: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(report.posts_written, 1);
        assert!(report.taxonomy_pages_written > 0);
    }

    // =========================================================================
    // Lock semantics
    // =========================================================================

    #[test]
    fn lock_present_fails_before_touching_output() {
        let site = Site::new();
        site.write_article("post.md", "title: T\n\nBody.\n");

        std::fs::create_dir_all(&site.config.paths.cache_dir).unwrap();
        std::fs::write(
            site.config.paths.cache_dir.join(".linotype-lock"),
            "held elsewhere",
        )
        .unwrap();

        let result = site.build(&BuildFlags::default());
        assert!(matches!(result, Err(BuildError::Lock(_))));
        assert!(!site.tmp.path().join("public").exists());
    }

    #[test]
    fn lock_released_after_successful_build() {
        let site = Site::new();
        site.write_article("post.md", "title: T\npublished: 2024-01-01\n\nBody.\n");
        site.build(&BuildFlags::default()).unwrap();
        assert!(!site.config.paths.cache_dir.join(".linotype-lock").exists());
        // A second build acquires cleanly.
        site.build(&BuildFlags::default()).unwrap();
    }

    // =========================================================================
    // Error isolation
    // =========================================================================

    #[test]
    fn broken_file_dropped_siblings_survive() {
        let site = Site::new();
        site.write_article("good.md", "title: Good\npublished: 2024-01-01\n\nFine.\n");
        // An image-extension file in journal parses as a photo; the mock
        // backend has no dimensions queued, so identify fails.
        site.write_article("broken.jpg", "not an image");

        let report = site.build(&BuildFlags::default()).unwrap();
        assert_eq!(report.parsed, 1);
        assert_eq!(report.failed, 1);
        assert!(
            site.tmp
                .path()
                .join("public/journal/good/index.html")
                .exists()
        );
    }

    #[test]
    fn missing_category_directory_skipped_not_fatal() {
        let site = Site::new();
        std::fs::remove_dir_all(site.content_root().join("photos")).unwrap();
        site.write_article("post.md", "title: T\npublished: 2024-01-01\n\nBody.\n");

        let report = site.build(&BuildFlags::default()).unwrap();
        assert_eq!(report.parsed, 1);
    }

    // =========================================================================
    // Collision resolution at merge
    // =========================================================================

    #[test]
    fn collision_bump_shifts_shortslug() {
        let site = Site::new();
        site.write_article(
            "alpha.md",
            "title: Alpha\npublished: 2024-01-01 10:00:00\n\nA.\n",
        );
        site.write_article(
            "beta.md",
            "title: Beta\npublished: 2024-01-01 10:00:00\n\nB.\n",
        );

        site.build(&BuildFlags::default()).unwrap();

        let public = site.tmp.path().join("public");
        let epoch = crate::post::frontmatter::parse_date("2024-01-01 10:00:00")
            .unwrap()
            .timestamp();
        // Merge order sorts by (epoch, slug): alpha keeps the epoch,
        // beta lands one second later — both redirect stubs exist.
        assert!(public.join(format!("s/{}", naming::shortslug(epoch))).exists());
        assert!(
            public
                .join(format!("s/{}", naming::shortslug(epoch + 1)))
                .exists()
        );
    }

    // =========================================================================
    // Single-item mode
    // =========================================================================

    #[test]
    fn only_filter_skips_aggregates() {
        let site = Site::new();
        site.write_article("solo.md", "title: Solo\npublished: 2024-01-01\n\nBody.\n");
        site.write_article("other.md", "title: Other\npublished: 2024-02-01\n\nBody.\n");

        let report = site
            .build(&BuildFlags {
                only: Some("journal/solo.md".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(report.parsed, 1);
        let public = site.tmp.path().join("public");
        assert!(public.join("journal/solo/index.html").exists());
        assert!(!public.join("journal/other/index.html").exists());
        assert!(!public.join("sitemap.txt").exists());
        assert!(!public.join("search.db").exists());
    }

    // =========================================================================
    // Redirects and source mtime sync
    // =========================================================================

    #[test]
    fn redirect_aliases_written() {
        let site = Site::new();
        site.write_article(
            "renamed.md",
            "title: Renamed\npublished: 2024-01-01\nredirect: old-name\n\nBody.\n",
        );
        site.build(&BuildFlags::default()).unwrap();

        let stub = site.tmp.path().join("public/old-name/index.html");
        let html = std::fs::read_to_string(stub).unwrap();
        assert!(html.contains("https://example.com/journal/renamed/"));
    }

    #[test]
    fn source_mtime_synced_to_resolved_timestamp() {
        let site = Site::new();
        site.write_article(
            "dated.md",
            "title: Dated\npublished: 2024-01-01\nupdated: 2024-03-01\n\nBody.\n",
        );
        site.build(&BuildFlags::default()).unwrap();

        let source = site.content_root().join("journal/dated.md");
        let expected = crate::post::frontmatter::parse_date("2024-03-01")
            .unwrap()
            .timestamp();
        assert_eq!(crate::cache::mtime_token(&source).unwrap(), expected);

        // And the output carries the same stamp.
        let output = site.tmp.path().join("public/journal/dated/index.html");
        assert_eq!(crate::cache::mtime_token(&output).unwrap(), expected);
    }

    #[test]
    fn stale_output_mtime_triggers_rewrite() {
        let site = Site::new();
        site.write_article("post.md", "title: T\npublished: 2024-01-01\n\nBody.\n");
        site.build(&BuildFlags::default()).unwrap();

        let output = site.tmp.path().join("public/journal/post/index.html");
        filetime::set_file_mtime(&output, FileTime::from_unix_time(12345, 0)).unwrap();

        let report = site.build(&BuildFlags::default()).unwrap();
        assert_eq!(report.posts_written, 1);
    }
}
