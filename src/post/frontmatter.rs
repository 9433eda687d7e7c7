//! Front matter parsing for article sources.
//!
//! A metadata header is a run of `key: value` lines terminated by the
//! first blank line; everything after is the body. Recognized keys
//! populate typed fields; unknown keys are ignored (a stray `draft:` line
//! from another tool should not break the post). `redirect` repeats,
//! accumulating alias slugs. Reaction keys (`in-reply-to`, `repost-of`,
//! `bookmark-of`, `like-of`) also repeat.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::BTreeMap;

/// A typed relation from a post to an external URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReactionKind {
    InReplyTo,
    RepostOf,
    BookmarkOf,
    LikeOf,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::InReplyTo => "in-reply-to",
            ReactionKind::RepostOf => "repost-of",
            ReactionKind::BookmarkOf => "bookmark-of",
            ReactionKind::LikeOf => "like-of",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "in-reply-to" => Some(ReactionKind::InReplyTo),
            "repost-of" => Some(ReactionKind::RepostOf),
            "bookmark-of" => Some(ReactionKind::BookmarkOf),
            "like-of" => Some(ReactionKind::LikeOf),
            _ => None,
        }
    }
}

/// Reaction map: relation kind → target URLs, in source order.
pub type Reactions = BTreeMap<ReactionKind, Vec<String>>;

/// Parsed metadata header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub redirects: Vec<String>,
    pub reactions: Reactions,
}

/// Split a source document into its front matter and body.
///
/// Returns `None` for the front matter when the document has no header at
/// all (the first line is not a `key: value` pair) — that is how page
/// sources are told apart from articles.
pub fn parse_document(source: &str) -> (Option<FrontMatter>, &str) {
    let mut header_len = 0usize;
    let mut saw_header_line = false;
    let mut front = FrontMatter::default();

    for line in source.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.trim().is_empty() {
            // Blank line ends the header.
            header_len += line.len();
            break;
        }
        let Some((key, value)) = split_header_line(trimmed) else {
            if saw_header_line {
                // A malformed line inside the header: stop, treat the rest
                // as body.
                break;
            }
            // First line already isn't a header: no front matter at all.
            return (None, source);
        };
        apply_key(&mut front, key, value);
        saw_header_line = true;
        header_len += line.len();
    }

    if !saw_header_line {
        return (None, source);
    }
    (Some(front), &source[header_len..])
}

fn split_header_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    // Header keys are short lowercase words; anything else is body text
    // that happens to contain a colon.
    if key.is_empty()
        || key.len() > 24
        || !key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return None;
    }
    Some((key, value.trim()))
}

fn apply_key(front: &mut FrontMatter, key: &str, value: &str) {
    match key {
        "title" => front.title = non_empty(value),
        "tags" => {
            for tag in value.split(',') {
                let tag = tag.trim();
                if !tag.is_empty() && !front.tags.iter().any(|t| t == tag) {
                    front.tags.push(tag.to_string());
                }
            }
        }
        "published" => front.published = parse_date(value),
        "updated" => front.updated = parse_date(value),
        "summary" => front.summary = non_empty(value),
        "redirect" => {
            if let Some(alias) = non_empty(value) {
                front.redirects.push(alias);
            }
        }
        _ => {
            if let Some(kind) = ReactionKind::from_key(key) {
                if let Some(url) = non_empty(value) {
                    front.reactions.entry(kind).or_default().push(url);
                }
            }
            // Unknown keys are ignored.
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a front-matter date. Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`,
/// and bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}
