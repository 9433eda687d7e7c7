//! Article parsing: front matter + body + shortcodes.
//!
//! An article body is scanned for three shortcode forms before it reaches
//! the markdown tool (expanded HTML passes through the renderer as raw
//! blocks):
//!
//! - `[img:NAME]` / `[img:NAME|ALT]` — responsive figure via the Image
//!   Derivation Engine. A missing or underivable image logs an error and
//!   leaves the shortcode as-is rather than failing the post.
//! - `[video:NAME]` — HTML5 `<video controls>` over a verbatim copy.
//! - `[snippet:FILE]` — the file inlined as a fenced code block, language
//!   tag from its extension. Configuration-like extensions all map to
//!   `ini` so highlighting stays consistent across unit files, tomls, and
//!   rc files.

use super::{ParseCtx, Post, PostError, PostKind, detect_language, file_time, make_snippet, slug_for};
use crate::imaging::operations::{DeriveOptions, DerivativeSet};
use crate::imaging::{ImageBackend, figure};
use crate::naming;
use crate::post::frontmatter::{FrontMatter, ReactionKind};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;
use tracing::error;

static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[img:([^\]|]+)(?:\|([^\]]*))?\]").unwrap());
static VIDEO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[video:([^\]]+)\]").unwrap());
static SNIPPET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[snippet:([^\]]+)\]").unwrap());

pub fn parse_article<B: ImageBackend>(
    ctx: &ParseCtx<'_, B>,
    category: &str,
    path: &Path,
    front: FrontMatter,
    body: &str,
) -> Result<Post, PostError> {
    let slug = slug_for(path);
    let published = front.published.unwrap_or_else(|| file_time(path));

    let repost = front
        .reactions
        .get(&ReactionKind::RepostOf)
        .and_then(|urls| urls.first())
        .cloned();

    let expansion = expand_shortcodes(ctx, body, repost.as_deref());
    let rendered_html = ctx.markdown.render(&expansion.text)?;
    let rendered_summary = front
        .summary
        .as_deref()
        .map(|s| ctx.markdown.render(s))
        .transpose()?;

    let title = front
        .title
        .clone()
        .or_else(|| heading_title(body))
        .unwrap_or_else(|| slug.replace('-', " "));

    Ok(Post {
        kind: PostKind::Article,
        shortslug: naming::shortslug(published.timestamp()),
        slug,
        title,
        category: category.to_string(),
        published,
        updated: front.updated,
        snippet: make_snippet(body),
        language: detect_language(body),
        raw_content: body.to_string(),
        rendered_html,
        raw_summary: front.summary,
        rendered_summary,
        tags: front.tags,
        reactions: front.reactions,
        redirects: front.redirects,
        image: expansion.lead_image,
        location: None,
        source: path.to_path_buf(),
    })
}

/// First `# heading` line of the body, if any.
pub fn heading_title(body: &str) -> Option<String> {
    body.lines()
        .find(|line| line.starts_with("# "))
        .map(|line| line.trim_start_matches("# ").trim().to_string())
        .filter(|t| !t.is_empty())
}

pub(crate) struct Expansion {
    pub(crate) text: String,
    pub(crate) lead_image: Option<DerivativeSet>,
}

fn expand_shortcodes<B: ImageBackend>(
    ctx: &ParseCtx<'_, B>,
    body: &str,
    repost: Option<&str>,
) -> Expansion {
    let with_snippets = SNIPPET_RE.replace_all(body, |caps: &Captures| {
        expand_snippet(ctx, caps[1].trim()).unwrap_or_else(|| caps[0].to_string())
    });

    let with_videos = VIDEO_RE.replace_all(&with_snippets, |caps: &Captures| {
        expand_video(ctx, caps[1].trim()).unwrap_or_else(|| caps[0].to_string())
    });

    expand_images(ctx, &with_videos, repost)
}

/// The image-shortcode pass alone — pages get this and nothing else.
pub(crate) fn expand_images<B: ImageBackend>(
    ctx: &ParseCtx<'_, B>,
    body: &str,
    repost: Option<&str>,
) -> Expansion {
    let mut lead_image = None;
    let text = IMG_RE
        .replace_all(body, |caps: &Captures| {
            let name = caps[1].trim();
            let alt = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            match expand_image(ctx, name, alt, repost) {
                Some((fragment, set)) => {
                    if lead_image.is_none() {
                        lead_image = Some(set);
                    }
                    fragment
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    Expansion { text, lead_image }
}

fn expand_image<B: ImageBackend>(
    ctx: &ParseCtx<'_, B>,
    name: &str,
    alt: &str,
    repost: Option<&str>,
) -> Option<(String, DerivativeSet)> {
    let source = ctx.media_root().join(name);
    if !source.exists() {
        error!(image = name, "shortcode references a missing image");
        return None;
    }

    let meta = ctx.extractor.extract(&source);
    let photo = ctx.classifier.is_photograph(&meta);
    let options = DeriveOptions {
        photo,
        link: repost.map(str::to_string),
        no_resize: false,
        force: ctx.force_images,
    };
    match ctx.engine.derive(&source, &options) {
        Ok(set) => {
            let fragment = figure::figure_fragment(&set, alt, repost).into_string();
            Some((fragment, set))
        }
        Err(err) => {
            error!(image = name, %err, "image derivation failed");
            None
        }
    }
}

fn expand_video<B: ImageBackend>(ctx: &ParseCtx<'_, B>, name: &str) -> Option<String> {
    let source = ctx.media_root().join(name);
    if !source.exists() {
        error!(video = name, "shortcode references a missing video");
        return None;
    }
    let options = DeriveOptions {
        no_resize: true,
        force: ctx.force_images,
        ..Default::default()
    };
    match ctx.engine.derive(&source, &options) {
        Ok(set) => Some(format!(
            "<video controls preload=\"metadata\" src=\"/{}\"></video>",
            set.original_url
        )),
        Err(err) => {
            error!(video = name, %err, "video copy failed");
            None
        }
    }
}

fn expand_snippet<B: ImageBackend>(ctx: &ParseCtx<'_, B>, file: &str) -> Option<String> {
    let source = ctx.config.paths.snippets_dir.join(file);
    let content = match std::fs::read_to_string(&source) {
        Ok(c) => c,
        Err(err) => {
            error!(snippet = file, %err, "cannot read snippet source");
            return None;
        }
    };
    let ext = Path::new(file)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let lang = snippet_language(&ext);
    Some(format!(
        "```{}\n{}\n```",
        lang,
        content.trim_end_matches('\n')
    ))
}

/// Extensions that are configuration syntax in spirit, whatever their
/// actual dialect; they all highlight as `ini`.
const CONFIG_LIKE: &[&str] = &["conf", "cfg", "ini", "toml", "service", "unit", "rc"];

fn snippet_language(ext: &str) -> &str {
    if CONFIG_LIKE.contains(&ext) {
        return "ini";
    }
    match ext {
        "rs" => "rust",
        "py" => "python",
        "js" => "javascript",
        "ts" => "typescript",
        "sh" | "bash" => "bash",
        "rb" => "ruby",
        "yml" | "yaml" => "yaml",
        "" => "text",
        other => other,
    }
}
