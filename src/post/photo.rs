//! Photo parsing: image files with embedded metadata.
//!
//! A photo source carries no header — everything comes from the embedded
//! metadata read through the extraction tool, each attribute through its
//! priority list (first non-empty field wins). Capture time falls back to
//! the file's own mtime when the camera recorded none. GPS coordinates
//! arrive as formatted DMS strings and are stored as signed decimal
//! degrees.

use super::{ParseCtx, Post, PostError, PostKind, detect_language, file_time, make_snippet, slug_for};
use crate::extract::{
    self, CAPTURE_FIELDS, DESCRIPTION_FIELDS, GPS_LATITUDE_FIELDS, GPS_LONGITUDE_FIELDS,
    KEYWORD_FIELDS, TITLE_FIELDS,
};
use crate::imaging::operations::DeriveOptions;
use crate::imaging::{ImageBackend, figure};
use crate::naming;
use crate::post::frontmatter::Reactions;
use chrono::{DateTime, Utc};
use std::path::Path;

pub fn parse_photo<B: ImageBackend>(
    ctx: &ParseCtx<'_, B>,
    category: &str,
    path: &Path,
) -> Result<Post, PostError> {
    let slug = slug_for(path);
    let meta = ctx.extractor.extract(path);

    let title = meta
        .first(TITLE_FIELDS)
        .unwrap_or_else(|| slug.replace('-', " "));
    let description = meta.first(DESCRIPTION_FIELDS);
    let tags = meta.list(KEYWORD_FIELDS);

    let published = meta
        .first(CAPTURE_FIELDS)
        .and_then(|raw| extract::normalize_exif_date(&raw))
        .and_then(|iso| DateTime::parse_from_rfc3339(&iso).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| file_time(path));

    let location = match (
        meta.first(GPS_LATITUDE_FIELDS)
            .and_then(|s| extract::gps_to_decimal(&s)),
        meta.first(GPS_LONGITUDE_FIELDS)
            .and_then(|s| extract::gps_to_decimal(&s)),
    ) {
        (Some(lat), Some(lon)) => Some((lat, lon)),
        _ => None,
    };

    let photo = ctx.classifier.is_photograph(&meta);
    let set = ctx.engine.derive(
        path,
        &DeriveOptions {
            photo,
            link: None,
            no_resize: false,
            force: ctx.force_images,
        },
    )?;

    let alt = description.as_deref().unwrap_or(&title);
    let mut rendered_html = figure::figure_fragment(&set, alt, None).into_string();
    if let Some(text) = &description {
        rendered_html.push_str(&ctx.markdown.render(text)?);
    }
    let rendered_summary = description
        .as_deref()
        .map(|text| ctx.markdown.render(text))
        .transpose()?;

    let raw_content = description.clone().unwrap_or_default();

    Ok(Post {
        kind: PostKind::Photo,
        shortslug: naming::shortslug(published.timestamp()),
        slug,
        title,
        category: category.to_string(),
        published,
        updated: None,
        snippet: make_snippet(&raw_content),
        language: detect_language(&raw_content),
        raw_content,
        rendered_html,
        raw_summary: description,
        rendered_summary,
        tags,
        reactions: Reactions::new(),
        redirects: Vec::new(),
        image: Some(set),
        location,
        source: path.to_path_buf(),
    })
}
