//! Image metadata extraction via the external tool contract.
//!
//! The extraction tool is a black box: invoked once per image, it prints a
//! JSON object keyed by namespaced field names (`EXIF:Model`,
//! `IPTC:Keywords`, `Composite:GPSLatitude`, ...). This module owns that
//! contract — invocation, parsing, caching — and the two normalizations
//! the rest of the engine relies on:
//!
//! - EXIF dates (`YYYY:MM:DD HH:MM:SS`) become ISO 8601 with a UTC offset.
//! - GPS coordinates arrive as formatted degree/minute/second strings
//!   (`103 deg 52' 32.79" W`) and become signed decimal degrees rounded to
//!   six places.
//!
//! Each logical attribute (title, description, keywords, ...) is resolved
//! through a fixed priority list of fields; the first non-empty value wins.
//!
//! Tool output is cached through the [`CacheStore`] keyed by the source
//! path, with the source mtime as the freshness token, so an unchanged
//! image never pays the subprocess round-trip twice. Tool failure degrades
//! to empty metadata with a warning — it is fatal to nothing.

use crate::cache::{self, CacheStats, CacheStore};
use chrono::{NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::process::Command;
use std::sync::{LazyLock, Mutex};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata tool exited with {0}")]
    ToolFailed(String),
    #[error("metadata tool produced invalid JSON: {0}")]
    BadJson(#[from] serde_json::Error),
}

const TOOL: &str = "exiftool";
const TOOL_ARGS: &[&str] = &["-j", "-G"];

/// Field priority lists, first non-empty wins.
pub const TITLE_FIELDS: &[&str] = &["XMP:Title", "IPTC:ObjectName", "EXIF:ImageDescription"];
pub const DESCRIPTION_FIELDS: &[&str] = &[
    "XMP:Description",
    "IPTC:Caption-Abstract",
    "EXIF:UserComment",
];
pub const KEYWORD_FIELDS: &[&str] = &["IPTC:Keywords", "XMP:Subject"];
pub const CAPTURE_FIELDS: &[&str] = &["EXIF:DateTimeOriginal", "EXIF:CreateDate"];
pub const CAMERA_FIELDS: &[&str] = &["EXIF:Model"];
pub const COPYRIGHT_FIELDS: &[&str] = &["EXIF:Copyright", "IPTC:CopyrightNotice"];
pub const GPS_LATITUDE_FIELDS: &[&str] = &["Composite:GPSLatitude", "EXIF:GPSLatitude"];
pub const GPS_LONGITUDE_FIELDS: &[&str] = &["Composite:GPSLongitude", "EXIF:GPSLongitude"];

/// Parsed tool output for one image.
#[derive(Debug, Clone, Default)]
pub struct MetaFields {
    fields: serde_json::Map<String, Value>,
}

impl MetaFields {
    /// First non-empty string value among `keys`, trimmed.
    ///
    /// The same merge rule the engine uses everywhere: priority order,
    /// skip absent and blank values.
    pub fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .filter_map(value_to_string)
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
    }

    /// All string values of the first present list-valued field among `keys`.
    pub fn list(&self, keys: &[&str]) -> Vec<String> {
        for key in keys {
            if let Some(value) = self.fields.get(*key) {
                let items: Vec<String> = match value {
                    Value::Array(arr) => arr.iter().filter_map(value_to_string).collect(),
                    other => value_to_string(other).into_iter().collect(),
                };
                let items: Vec<String> = items
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if !items.is_empty() {
                    return items;
                }
            }
        }
        Vec::new()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse the tool's stdout. The tool wraps its object in a one-element
/// JSON array; a bare object is accepted too.
pub fn parse_tool_output(json: &str) -> Result<MetaFields, ExtractError> {
    let value: Value = serde_json::from_str(json)?;
    let object = match value {
        Value::Array(mut arr) if !arr.is_empty() => arr.remove(0),
        other => other,
    };
    match object {
        Value::Object(fields) => Ok(MetaFields { fields }),
        _ => Ok(MetaFields::default()),
    }
}

/// Metadata extractor with a cache in front of the subprocess.
pub struct Extractor<'a> {
    cache: &'a CacheStore,
    stats: Mutex<CacheStats>,
}

impl<'a> Extractor<'a> {
    pub fn new(cache: &'a CacheStore) -> Self {
        Self {
            cache,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Cache performance so far (for the run summary).
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap()
    }

    /// Extract metadata for `path`, consulting the cache first.
    ///
    /// Degrades to empty fields on any tool or parse failure.
    pub fn extract(&self, path: &Path) -> MetaFields {
        let token = match cache::mtime_token(path) {
            Ok(t) => t,
            Err(err) => {
                warn!(path = %path.display(), %err, "cannot stat image for extraction");
                return MetaFields::default();
            }
        };
        let key = cache::path_key(path);

        if let Some(cached) = self.cache.get(&key, token) {
            if let Ok(fields) = parse_tool_output(&cached) {
                self.stats.lock().unwrap().hit();
                return fields;
            }
        }
        self.stats.lock().unwrap().miss();

        match run_tool(path) {
            Ok(json) => {
                let fields = parse_tool_output(&json).unwrap_or_default();
                if let Err(err) = self.cache.set(&key, &json, token) {
                    warn!(path = %path.display(), %err, "failed to cache extracted metadata");
                }
                fields
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "metadata extraction failed");
                MetaFields::default()
            }
        }
    }
}

fn run_tool(path: &Path) -> Result<String, ExtractError> {
    let output = Command::new(TOOL).args(TOOL_ARGS).arg(path).output()?;
    if !output.status.success() {
        return Err(ExtractError::ToolFailed(output.status.to_string()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Normalize an EXIF-style date (`YYYY:MM:DD HH:MM:SS`) to ISO 8601 with a
/// UTC offset. Already-ISO inputs pass through unchanged.
pub fn normalize_exif_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.to_rfc3339());
    }
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y:%m:%d %H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&naive).to_rfc3339())
}

static GPS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(\d+(?:\.\d+)?)\s+deg\s+(\d+(?:\.\d+)?)'\s+(\d+(?:\.\d+)?)"\s*([NSEW])\s*$"#)
        .unwrap()
});

/// Convert a formatted DMS coordinate (`103 deg 52' 32.79" W`) to signed
/// decimal degrees, rounded to six places. West and South are negative.
pub fn gps_to_decimal(raw: &str) -> Option<f64> {
    let caps = GPS_RE.captures(raw)?;
    let degrees: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    let signed = match &caps[4] {
        "S" | "W" => -value,
        _ => value,
    };
    Some((signed * 1e6).round() / 1e6)
}
