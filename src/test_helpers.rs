//! Shared test utilities.
//!
//! Post construction is verbose — fifteen-odd fields, most irrelevant to
//! any one test. `bare_post` builds a minimal post at a given epoch so
//! taxonomy, render, search, and pipeline tests can focus on the fields
//! they actually exercise.

use crate::cache::CacheStore;
use crate::config::SiteConfig;
use crate::extract::Extractor;
use crate::imaging::backend::Dimensions;
use crate::imaging::backend::tests::MockBackend;
use crate::imaging::operations::{DeriveEngine, PhotoClassifier};
use crate::markdown::{Markdown, MarkdownError};
use crate::naming;
use crate::post::{ParseCtx, Post, PostKind, Reactions};
use chrono::DateTime;
use std::path::PathBuf;
use tempfile::TempDir;

/// Pure markdown stand-in: wraps the raw text in a single paragraph, so
/// handler tests run without the external tool.
pub struct FakeMarkdown;

impl Markdown for FakeMarkdown {
    fn render(&self, raw: &str) -> Result<String, MarkdownError> {
        Ok(format!("<p>{}</p>", raw.trim()))
    }
}

/// Build a full parse context over a temp directory and hand it to `f`.
///
/// Layout created: `content/` (the content root, with a `files/` media
/// dir and a `snippets/` dir) and `public/` as the target. Mock identify
/// results are popped per call — push in reverse order of expected use.
pub fn with_parse_ctx<F>(dims: Vec<Dimensions>, f: F) -> TempDir
where
    F: FnOnce(&ParseCtx<'_, MockBackend>, &TempDir),
{
    let tmp = TempDir::new().unwrap();
    let content_root = tmp.path().join("content");
    std::fs::create_dir_all(content_root.join("files")).unwrap();
    std::fs::create_dir_all(content_root.join("journal")).unwrap();
    std::fs::create_dir_all(content_root.join("photos")).unwrap();
    std::fs::create_dir_all(tmp.path().join("snippets")).unwrap();

    let mut config = SiteConfig::default();
    config.paths.target_root = tmp.path().join("public");
    config.paths.cache_dir = tmp.path().join("cache");
    config.paths.snippets_dir = tmp.path().join("snippets");
    config.images.camera_models = vec!["X100V".to_string()];

    let backend = MockBackend::with_dimensions(dims);
    let store = CacheStore::new(&config.paths.cache_dir, true);
    let extractor = Extractor::new(&store);
    let classifier = PhotoClassifier::from_config(&config.images);
    let engine = DeriveEngine::new(
        &backend,
        config.files_root(),
        config.paths.files_dir.clone(),
        &config.images,
        None,
        None,
    );

    let ctx = ParseCtx {
        config: &config,
        content_root: &content_root,
        engine: &engine,
        extractor: &extractor,
        classifier: &classifier,
        markdown: &FakeMarkdown,
        force_images: false,
    };
    f(&ctx, &tmp);
    tmp
}

/// A minimal post in the `journal` category at the given publish epoch.
pub fn bare_post(kind: PostKind, slug: &str, epoch: i64) -> Post {
    Post {
        kind,
        slug: slug.to_string(),
        shortslug: naming::shortslug(epoch),
        title: slug.to_string(),
        category: "journal".to_string(),
        published: DateTime::from_timestamp(epoch, 0).unwrap(),
        updated: None,
        raw_content: String::new(),
        rendered_html: String::new(),
        raw_summary: None,
        rendered_summary: None,
        tags: Vec::new(),
        reactions: Reactions::new(),
        redirects: Vec::new(),
        image: None,
        location: None,
        language: None,
        snippet: String::new(),
        source: PathBuf::from(format!("/content/journal/{slug}.md")),
    }
}
