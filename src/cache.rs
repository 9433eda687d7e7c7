//! Text-blob cache for incremental builds.
//!
//! Metadata extraction shells out to an external tool per image, and that
//! subprocess round-trip dominates photo parsing. This module lets callers
//! skip the subprocess when the source file hasn't changed since the last
//! build.
//!
//! # Design
//!
//! The cache is **freshness-token addressed**: every entry is one file in
//! the cache directory whose *contents* are the cached text and whose
//! *mtime* is the freshness token recorded at write time — typically the
//! source file's own modification time. A read must present the same token:
//!
//! - token == stored mtime → hit, return the text
//! - token  > stored mtime → the source moved on; the entry is deleted
//!   (proactive invalidation) and absence returned
//! - token  < stored mtime → absence, no side effects
//!
//! Matching is exact, not an inequality. A source file touched sideways
//! (file sync, `git checkout`) produces a miss either way, which costs one
//! re-extraction and nothing else.
//!
//! ## Keys
//!
//! Keys are either explicit ids (must be filename-safe) or content
//! addresses from [`path_key`] (SHA-256 of the source path). One file per
//! key, directory created lazily on first write.
//!
//! ## Bypassing the cache
//!
//! `[cache] enabled = false` turns both `get` and `set` into no-ops; every
//! caller then recomputes unconditionally.

use filetime::FileTime;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Freshness-token addressed text cache.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    enabled: bool,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Read the cached text for `key` if the stored freshness token matches
    /// exactly. A strictly newer caller token deletes the stale entry.
    pub fn get(&self, key: &str, token: i64) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let path = self.entry_path(key);
        let meta = std::fs::metadata(&path).ok()?;
        let stored = FileTime::from_last_modification_time(&meta).unix_seconds();
        if stored == token {
            std::fs::read_to_string(&path).ok()
        } else {
            if token > stored {
                // The source outran the entry; it can never hit again.
                let _ = std::fs::remove_file(&path);
            }
            None
        }
    }

    /// Write `text` under `key` and stamp the entry's mtime to `token`, so
    /// a subsequent `get` with the same token succeeds.
    pub fn set(&self, key: &str, text: &str, token: i64) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(key);
        std::fs::write(&path, text)?;
        filetime::set_file_mtime(&path, FileTime::from_unix_time(token, 0))
    }
}

/// Content-address a source path into a filename-safe cache key.
pub fn path_key(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    format!("{:x}", digest)
}

/// The mtime of a file as whole unix seconds — the freshness token used
/// across the engine.
pub fn mtime_token(path: &Path) -> io::Result<i64> {
    let meta = std::fs::metadata(path)?;
    Ok(FileTime::from_last_modification_time(&meta).unix_seconds())
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} extracted ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} extracted", self.misses)
        }
    }
}
