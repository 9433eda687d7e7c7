//! Page parsing: raw documents with no metadata header.
//!
//! Pages get the smallest treatment of the three variants: image
//! adaptation and rendering. No front matter, no tags, no reactions —
//! the title comes from the first heading (or the filename), the publish
//! time from the file itself.

use super::article::{expand_images, heading_title};
use super::{ParseCtx, Post, PostError, PostKind, detect_language, file_time, make_snippet, slug_for};
use crate::imaging::ImageBackend;
use crate::naming;
use crate::post::frontmatter::Reactions;
use std::path::Path;

pub fn parse_page<B: ImageBackend>(
    ctx: &ParseCtx<'_, B>,
    category: &str,
    path: &Path,
    body: &str,
) -> Result<Post, PostError> {
    let slug = slug_for(path);
    let published = file_time(path);

    let expansion = expand_images(ctx, body, None);
    let rendered_html = ctx.markdown.render(&expansion.text)?;

    let title = heading_title(body).unwrap_or_else(|| slug.replace('-', " "));

    Ok(Post {
        kind: PostKind::Page,
        shortslug: naming::shortslug(published.timestamp()),
        slug,
        title,
        category: category.to_string(),
        published,
        updated: None,
        snippet: make_snippet(body),
        language: detect_language(body),
        raw_content: body.to_string(),
        rendered_html,
        raw_summary: None,
        rendered_summary: None,
        tags: Vec::new(),
        reactions: Reactions::new(),
        redirects: Vec::new(),
        image: expansion.lead_image,
        location: None,
        source: path.to_path_buf(),
    })
}
