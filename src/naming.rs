//! Centralized slug and shortslug derivation.
//!
//! Every post derives two identifiers from the same two inputs:
//!
//! - **slug** — the source filename minus its extension, normalized for use
//!   in URLs and directory names. `A Day in Lisbon.md` → `a-day-in-lisbon`.
//! - **shortslug** — the publish epoch encoded in base 36, used as a short
//!   permalink (`/s/<shortslug>/`) and redirect target. Epochs are unique
//!   across the corpus for one build; [`probe_epoch`] resolves collisions by
//!   advancing one second at a time until a free slot is found.

use std::collections::BTreeSet;

const MAX_SLUG_LEN: usize = 80;

/// Normalize a filename stem into a URL-safe slug.
///
/// - Lowercases ASCII letters
/// - Replaces non-alphanumeric characters (except dashes) with dashes
/// - Collapses consecutive dashes into one
/// - Strips leading and trailing dashes
/// - Truncates to `MAX_SLUG_LEN` characters (breaks at last dash before limit)
pub fn slug_from_stem(stem: &str) -> String {
    let raw: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(raw.len());
    let mut prev_dash = false;
    for c in raw.chars() {
        if c == '-' {
            if !prev_dash {
                collapsed.push('-');
            }
            prev_dash = true;
        } else {
            collapsed.push(c);
            prev_dash = false;
        }
    }

    let trimmed = collapsed.trim_matches('-');

    if trimmed.len() <= MAX_SLUG_LEN {
        trimmed.to_string()
    } else {
        let truncated = &trimmed[..MAX_SLUG_LEN];
        match truncated.rfind('-') {
            Some(pos) => truncated[..pos].to_string(),
            None => truncated.to_string(),
        }
    }
}

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Encode a publish epoch as a base-36 shortslug.
pub fn shortslug(epoch: i64) -> String {
    if epoch <= 0 {
        return "0".to_string();
    }
    let mut n = epoch as u64;
    let mut out = Vec::new();
    while n > 0 {
        out.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Decode a base-36 shortslug back to an epoch. Case-insensitive.
pub fn parse_shortslug(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }
    let mut n: i64 = 0;
    for c in s.chars() {
        let d = c.to_ascii_lowercase().to_digit(36)?;
        n = n.checked_mul(36)?.checked_add(d as i64)?;
    }
    Some(n)
}

/// Resolve an epoch against a set of taken epochs, advancing one second at
/// a time until a free slot is found. Marks the winner as taken.
///
/// The probing is deterministic: two posts with the same publish time end
/// up at `t` and `t+1` in insertion order, and the bumped post's shortslug
/// shifts accordingly. Insertion order decides the loser.
pub fn probe_epoch(taken: &mut BTreeSet<i64>, mut epoch: i64) -> i64 {
    while taken.contains(&epoch) {
        epoch += 1;
    }
    taken.insert(epoch);
    epoch
}
