//! # linotype
//!
//! An incremental build engine for a personal publishing corpus: a
//! directory of source documents (articles, photo posts, static pages)
//! goes in; rendered HTML, resized image derivatives, paginated taxonomy
//! listings, a feed, a sitemap, and a full-text search index come out.
//! Reruns skip every artifact whose inputs have not changed.
//!
//! # Architecture: Parse → Merge → Emit
//!
//! ```text
//! 1. Discover   content/<category>/*        (configured categories)
//! 2. Parse      file → Post                 (parallel workers, no shared state)
//! 3. Merge      Posts → taxonomies          (sequential, the sync point)
//! 4. Emit       pages, derivatives, feeds,  (parallel where independent)
//!               sitemap, search index
//! ```
//!
//! Workers parse independent files and return immutable `Post` values over
//! a channel; the orchestrating thread performs *all* mutation of shared
//! structures (taxonomies, cache, index). That split is what makes the
//! parallelism safe without locks.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Orchestrator — lock, discovery, worker pool, merge, emission |
//! | [`post`] | Post entity + article/photo/page variant handlers |
//! | [`imaging`] | Image derivation: buckets, crops, watermarks, figures |
//! | [`taxonomy`] | Time-ordered aggregation, pagination, feeds |
//! | [`search`] | FTS5 full-text index, scratch-built and atomically swapped |
//! | [`cache`] | Mtime-token text cache for expensive tool output |
//! | [`extract`] | Metadata-extraction tool contract (subprocess, JSON) |
//! | [`markdown`] | Markdown tool contract (subprocess, stdin→stdout) |
//! | [`render`] | Templating seam, redirect stubs, listing/feed fragments |
//! | [`config`] | `config.toml` loading, validation, stock defaults |
//! | [`naming`] | Slug normalization, base-36 shortslugs, epoch probing |
//! | [`lock`] | Single-flight run lock |
//! | [`output`] | End-of-run summary formatting |
//!
//! # Incremental Semantics
//!
//! Freshness is a single mtime comparison everywhere: a post's outputs and
//! its source file are stamped to `max(published, updated)`; a taxonomy
//! page is stamped to its newest member's timestamp; a cache entry is
//! stamped to its source's mtime. An artifact is up to date iff the stamps
//! match *exactly* — an output that is newer than expected is just as
//! stale as one that is older. Force flags bypass the comparison, never
//! the stamping.
//!
//! # External Tools
//!
//! Metadata extraction and markdown rendering are black-box subprocesses
//! with defined contracts ([`extract`], [`markdown`]); their failures
//! degrade the affected item and nothing else. Page templating sits behind
//! [`render::Renderer`] the same way.

pub mod cache;
pub mod config;
pub mod extract;
pub mod imaging;
pub mod lock;
pub mod markdown;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod post;
pub mod render;
pub mod search;
pub mod taxonomy;

#[cfg(test)]
pub(crate) mod test_helpers;
