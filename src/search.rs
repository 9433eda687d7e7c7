//! Full-text indexing over SQLite FTS5.
//!
//! Every finished post becomes one document in an FTS5 virtual table:
//! slug, title, summary, raw content, a serialized metadata blob, the
//! comma-joined tags, the canonical URL, and a fixed base weight.
//! Taxonomy aggregates are indexed analogously at a higher weight, so a
//! query matching both a tag page and an individual post ranks the tag
//! page first.
//!
//! The index is built in a scratch file next to the published one and
//! atomically renamed into place on successful completion — a failed or
//! interrupted build never corrupts the previously published index.

use crate::config::SiteConfig;
use crate::imaging::figure;
use crate::post::Post;
use crate::taxonomy::Taxonomy;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Base weight for individual posts.
pub const POST_WEIGHT: f64 = 1.0;
/// Taxonomy aggregates rank above posts for identical terms.
pub const TAXONOMY_WEIGHT: f64 = 2.0;

const INDEX_FILENAME: &str = "search.db";
const SCRATCH_FILENAME: &str = ".search.db.tmp";

/// One document headed for the index.
#[derive(Debug, Clone)]
pub struct IndexDoc {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    /// Serialized reaction/metadata blob.
    pub extra: String,
    /// Comma-joined tags.
    pub tags: String,
    pub url: String,
    pub weight: f64,
    /// Rendered figure fragment, when the document has a bound image.
    pub image_html: Option<String>,
}

impl IndexDoc {
    pub fn from_post(post: &Post, config: &SiteConfig) -> Self {
        let extra = serde_json::json!({
            "reactions": post
                .reactions
                .iter()
                .map(|(kind, urls)| (kind.as_str(), urls))
                .collect::<std::collections::BTreeMap<_, _>>(),
            "language": post.language,
            "location": post.location,
            "shortslug": post.shortslug,
        })
        .to_string();

        Self {
            slug: post.slug.clone(),
            title: post.title.clone(),
            summary: post.raw_summary.clone().unwrap_or_default(),
            content: post.raw_content.clone(),
            extra,
            tags: post.tags.join(","),
            url: post.permalink(config),
            weight: POST_WEIGHT,
            image_html: post
                .image
                .as_ref()
                .map(|set| figure::figure_fragment(set, &post.title, None).into_string()),
        }
    }

    pub fn from_taxonomy(taxonomy: &Taxonomy, config: &SiteConfig) -> Self {
        let titles: Vec<String> = taxonomy
            .iter_desc()
            .map(|p| p.title.clone())
            .collect();
        Self {
            slug: taxonomy.slug.clone(),
            title: taxonomy.name.clone(),
            summary: String::new(),
            content: titles.join("\n"),
            extra: String::new(),
            tags: String::new(),
            url: config.url_for(&format!("{}/", taxonomy.slug.trim_end_matches('/'))),
            weight: TAXONOMY_WEIGHT,
            image_html: None,
        }
    }
}

/// A search index under construction.
pub struct SearchIndex {
    conn: Connection,
    scratch: PathBuf,
    published: PathBuf,
}

impl SearchIndex {
    /// Open a fresh scratch index in `target_root`. Any scratch left over
    /// from a dead run is discarded.
    pub fn create(target_root: &Path) -> Result<Self, SearchError> {
        std::fs::create_dir_all(target_root)?;
        let scratch = target_root.join(SCRATCH_FILENAME);
        let published = target_root.join(INDEX_FILENAME);
        if scratch.exists() {
            std::fs::remove_file(&scratch)?;
        }

        let conn = Connection::open(&scratch)?;
        conn.execute_batch(
            "CREATE VIRTUAL TABLE docs USING fts5(
                slug UNINDEXED,
                title,
                summary,
                content,
                extra,
                tags,
                url UNINDEXED,
                weight UNINDEXED,
                image_html UNINDEXED
            );",
        )?;
        Ok(Self {
            conn,
            scratch,
            published,
        })
    }

    /// Commit one document into the index.
    pub fn add(&mut self, doc: &IndexDoc) -> Result<(), SearchError> {
        self.conn.execute(
            "INSERT INTO docs (slug, title, summary, content, extra, tags, url, weight, image_html)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                doc.slug,
                doc.title,
                doc.summary,
                doc.content,
                doc.extra,
                doc.tags,
                doc.url,
                doc.weight,
                doc.image_html,
            ],
        )?;
        Ok(())
    }

    pub fn doc_count(&self) -> Result<i64, SearchError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM docs", [], |row| row.get(0))?)
    }

    /// Swap the finished scratch into place. On failure the previously
    /// published index is untouched.
    pub fn publish(self) -> Result<PathBuf, SearchError> {
        let Self {
            conn,
            scratch,
            published,
        } = self;
        conn.close().map_err(|(_, err)| SearchError::Sqlite(err))?;
        std::fs::rename(&scratch, &published)?;
        Ok(published)
    }
}

/// Query a published index, best matches first. Weight multiplies the
/// BM25 rank (negative-is-better), so heavier documents sort ahead of
/// lighter ones for the same terms.
pub fn query(index_path: &Path, terms: &str) -> Result<Vec<String>, SearchError> {
    let conn = Connection::open(index_path)?;
    let mut stmt = conn.prepare(
        "SELECT slug FROM docs WHERE docs MATCH ?1 ORDER BY bm25(docs) * weight",
    )?;
    let slugs = stmt
        .query_map([terms], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(slugs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::PostKind;
    use crate::test_helpers::bare_post;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn post_doc(slug: &str, content: &str, config: &SiteConfig) -> IndexDoc {
        let mut post = bare_post(PostKind::Article, slug, 1_700_000_000);
        post.raw_content = content.to_string();
        post.tags = vec!["rust".to_string(), "builds".to_string()];
        IndexDoc::from_post(&post, config)
    }

    // =========================================================================
    // Document construction
    // =========================================================================

    #[test]
    fn post_doc_carries_url_tags_and_weight() {
        let config = SiteConfig::default();
        let doc = post_doc("hello", "body text", &config);
        assert_eq!(doc.url, "https://example.com/journal/hello/");
        assert_eq!(doc.tags, "rust,builds");
        assert_eq!(doc.weight, POST_WEIGHT);
        assert!(doc.extra.contains("shortslug"));
    }

    #[test]
    fn taxonomy_doc_is_heavier() {
        let config = SiteConfig::default();
        let mut tax = Taxonomy::new("Rust", "tag/rust", 10, true);
        tax.append(Arc::new(bare_post(PostKind::Article, "a", 1)));
        let doc = IndexDoc::from_taxonomy(&tax, &config);
        assert_eq!(doc.weight, TAXONOMY_WEIGHT);
        assert_eq!(doc.url, "https://example.com/tag/rust/");
    }

    // =========================================================================
    // Build, publish, query
    // =========================================================================

    #[test]
    fn build_and_query_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let config = SiteConfig::default();

        let mut index = SearchIndex::create(tmp.path()).unwrap();
        index
            .add(&post_doc("harbor-fog", "fog rolling over the harbor", &config))
            .unwrap();
        index
            .add(&post_doc("mountain-walk", "a long walk uphill", &config))
            .unwrap();
        assert_eq!(index.doc_count().unwrap(), 2);
        let published = index.publish().unwrap();

        assert!(published.ends_with("search.db"));
        assert!(!tmp.path().join(".search.db.tmp").exists());

        let hits = query(&published, "harbor").unwrap();
        assert_eq!(hits, vec!["harbor-fog"]);
    }

    #[test]
    fn taxonomy_ranks_above_post_for_same_terms() {
        let tmp = TempDir::new().unwrap();
        let config = SiteConfig::default();

        // Identical text columns; only the weight differs.
        let mut post_side = post_doc("about-rust", "notes on rust", &config);
        post_side.tags = String::new();

        let mut tax = Taxonomy::new("about-rust", "tag/rust", 10, true);
        tax.append(Arc::new(bare_post(PostKind::Article, "a", 1)));
        let mut tax_side = IndexDoc::from_taxonomy(&tax, &config);
        tax_side.content = "notes on rust".to_string();

        let mut index = SearchIndex::create(tmp.path()).unwrap();
        index.add(&post_side).unwrap();
        index.add(&tax_side).unwrap();
        let published = index.publish().unwrap();

        let hits = query(&published, "rust").unwrap();
        assert_eq!(hits.first().map(String::as_str), Some("tag/rust"));
    }

    #[test]
    fn unpublished_scratch_leaves_old_index_intact() {
        let tmp = TempDir::new().unwrap();
        let config = SiteConfig::default();

        // First run publishes.
        let mut index = SearchIndex::create(tmp.path()).unwrap();
        index.add(&post_doc("original", "original body", &config)).unwrap();
        let published = index.publish().unwrap();

        // Second run builds a scratch but is dropped before publish.
        {
            let mut aborted = SearchIndex::create(tmp.path()).unwrap();
            aborted
                .add(&post_doc("replacement", "replacement body", &config))
                .unwrap();
            // dropped without publish()
        }

        let hits = query(&published, "original").unwrap();
        assert_eq!(hits, vec!["original"]);
        assert!(query(&published, "replacement").unwrap().is_empty());
    }

    #[test]
    fn stale_scratch_is_discarded_on_create() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(".search.db.tmp"), b"not a database").unwrap();
        // Would fail to open if the leftover were reused.
        let index = SearchIndex::create(tmp.path()).unwrap();
        assert_eq!(index.doc_count().unwrap(), 0);
    }
}
