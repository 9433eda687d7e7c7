//! Responsive figure fragments for embedded images.
//!
//! Binds the smallest-acceptable fallback derivative as the `<img>` source,
//! the largest derivative (or an externally supplied link, for reposts) as
//! the click-through target, and a caption — but only when the alt text
//! actually says something the filename doesn't. Alt text that is just the
//! filename with the dashes swapped out produces no caption.

use super::operations::DerivativeSet;
use maud::{Markup, html};

/// Captions appear only below this similarity between alt text and the
/// bare filename stem.
pub const CAPTION_SIMILARITY_THRESHOLD: f64 = 0.5;

/// Character-bigram Dice similarity between two strings, case-insensitive.
/// 1.0 for identical inputs, 0.0 for nothing shared.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_grams = bigrams(a);
    let b_grams = bigrams(b);
    if a_grams.is_empty() && b_grams.is_empty() {
        return 1.0;
    }
    if a_grams.is_empty() || b_grams.is_empty() {
        return 0.0;
    }
    let mut b_pool = b_grams.clone();
    let mut shared = 0usize;
    for gram in &a_grams {
        if let Some(pos) = b_pool.iter().position(|g| g == gram) {
            b_pool.swap_remove(pos);
            shared += 1;
        }
    }
    (2.0 * shared as f64) / (a_grams.len() + b_grams.len()) as f64
}

fn bigrams(s: &str) -> Vec<[char; 2]> {
    let chars: Vec<char> = s
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    chars.windows(2).map(|w| [w[0], w[1]]).collect()
}

/// Caption text for a figure, or `None` when the alt text adds nothing
/// over the filename stem.
pub fn caption_for<'a>(alt: &'a str, stem: &str) -> Option<&'a str> {
    let trimmed = alt.trim();
    if trimmed.is_empty() {
        return None;
    }
    if similarity(trimmed, stem) < CAPTION_SIMILARITY_THRESHOLD {
        Some(trimmed)
    } else {
        None
    }
}

/// Build the figure fragment for a derivative set.
///
/// `link` overrides the click-through target (repost sources point at the
/// original publication, not at our copy).
pub fn figure_fragment(set: &DerivativeSet, alt: &str, link: Option<&str>) -> Markup {
    let img_url = set
        .fallback()
        .map(|d| d.url.as_str())
        .unwrap_or(set.original_url.as_str());
    let img_dims = set.fallback().map(|d| (d.width, d.height));
    let href = link
        .or_else(|| set.largest().map(|d| d.url.as_str()))
        .unwrap_or(set.original_url.as_str());
    let caption = caption_for(alt, &set.stem);

    html! {
        figure {
            a href=(href) {
                @if let Some((w, h)) = img_dims {
                    img src=(img_url) alt=(alt) width=(w) height=(h);
                } @else {
                    img src=(img_url) alt=(alt);
                }
            }
            @if let Some(text) = caption {
                figcaption { (text) }
            }
        }
    }
}
