//! Rendering seam and HTML/feed fragments.
//!
//! Page templating is an external collaborator consumed behind the
//! [`Renderer`] trait — an opaque `render(template, variables) → text`
//! call. The engine prepares variables and content fragments; what the
//! final document shell looks like is the renderer's business. The
//! [`BuiltinRenderer`] is a minimal maud shell so the binary works out of
//! the box; tests substitute their own.
//!
//! Everything else in this module is fragment generation the engine *does*
//! own: listing-page bodies, redirect stubs, the RSS feed, the sitemap.

use crate::config::SiteConfig;
use crate::post::Post;
use chrono::{DateTime, Utc};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("missing template variable: {0}")]
    MissingVariable(&'static str),
}

/// Variables handed to the templating service.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars(BTreeMap<String, String>);

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// The opaque templating service: a template name and variables in, final
/// text out.
pub trait Renderer: Sync {
    fn render(&self, template: &str, vars: &TemplateVars) -> Result<String, RenderError>;
}

/// Built-in renderer: a minimal document shell around the prepared
/// `content` variable.
pub struct BuiltinRenderer;

impl Renderer for BuiltinRenderer {
    fn render(&self, template: &str, vars: &TemplateVars) -> Result<String, RenderError> {
        match template {
            "post" | "listing" => {
                let title = vars
                    .get("title")
                    .ok_or(RenderError::MissingVariable("title"))?;
                let content = vars
                    .get("content")
                    .ok_or(RenderError::MissingVariable("content"))?;
                let site_title = vars.get("site_title").unwrap_or("");
                let canonical = vars.get("canonical");
                Ok(document_shell(title, site_title, canonical, content).into_string())
            }
            other => Err(RenderError::UnknownTemplate(other.to_string())),
        }
    }
}

fn document_shell(
    title: &str,
    site_title: &str,
    canonical: Option<&str>,
    content: &str,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title {
                    (title)
                    @if !site_title.is_empty() { " · " (site_title) }
                }
                @if let Some(href) = canonical {
                    link rel="canonical" href=(href);
                }
            }
            body {
                main { (PreEscaped(content.to_string())) }
            }
        }
    }
}

/// Render one post's full page through the templating seam.
pub fn render_post(
    renderer: &dyn Renderer,
    config: &SiteConfig,
    post: &Post,
) -> Result<String, RenderError> {
    let mut content = String::new();
    content.push_str(&article_header(post).into_string());
    content.push_str(&post.rendered_html);
    if !post.reactions.is_empty() {
        content.push_str(&reactions_fragment(post).into_string());
    }

    let vars = TemplateVars::new()
        .set("title", post.title.clone())
        .set("site_title", config.site.title.clone())
        .set("canonical", post.permalink(config))
        .set("content", content);
    renderer.render("post", &vars)
}

fn article_header(post: &Post) -> Markup {
    html! {
        header {
            h1 { (post.title) }
            p.meta {
                time datetime=(post.published.to_rfc3339()) {
                    (post.published.format("%Y-%m-%d"))
                }
                @if !post.tags.is_empty() {
                    " · "
                    @for (i, tag) in post.tags.iter().enumerate() {
                        @if i > 0 { ", " }
                        a href=(format!("/tag/{}/", crate::naming::slug_from_stem(tag))) { (tag) }
                    }
                }
            }
        }
    }
}

fn reactions_fragment(post: &Post) -> Markup {
    html! {
        aside.reactions {
            @for (kind, urls) in &post.reactions {
                @for url in urls {
                    p { a class=(kind.as_str()) rel="nofollow" href=(url) { (kind.as_str()) ": " (url) } }
                }
            }
        }
    }
}

/// The body of one listing page: summaries of the page's posts plus
/// pagination links.
pub fn listing_content(
    posts: &[&Post],
    taxonomy_slug: &str,
    page: usize,
    page_count: usize,
) -> String {
    let markup = html! {
        @for post in posts {
            article {
                h2 { a href=(format!("/{}", post.url_path())) { (post.title) } }
                p.meta {
                    time datetime=(post.published.to_rfc3339()) {
                        (post.published.format("%Y-%m-%d"))
                    }
                }
                @if let Some(summary) = &post.rendered_summary {
                    (PreEscaped(summary.clone()))
                } @else {
                    p { (post.snippet) }
                }
            }
        }
        @if page_count > 1 {
            nav.pagination {
                @if page > 1 {
                    a href=(page_href(taxonomy_slug, page - 1)) { "newer" }
                }
                span { (format!("page {page} of {page_count}")) }
                @if page < page_count {
                    a href=(page_href(taxonomy_slug, page + 1)) { "older" }
                }
            }
        }
    };
    markup.into_string()
}

fn page_href(taxonomy_slug: &str, page: usize) -> String {
    let base = if taxonomy_slug.is_empty() {
        "/".to_string()
    } else {
        format!("/{taxonomy_slug}/")
    };
    if page <= 1 {
        base
    } else {
        format!("{base}page/{page}/")
    }
}

/// Redirect stub pointing an alias at its canonical URL.
pub fn redirect_stub(target: &str) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                meta http-equiv="refresh" content=(format!("0; url={target}"));
                link rel="canonical" href=(target);
            }
            body {
                p { a href=(target) { (target) } }
            }
        }
    }
}

/// RSS 2.0 feed document over the newest entries.
pub fn feed_xml(config: &SiteConfig, title: &str, posts: &[&Post], built: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<rss version=\"2.0\">\n<channel>\n");
    out.push_str(&format!("<title>{}</title>\n", xml_escape(title)));
    out.push_str(&format!(
        "<link>{}</link>\n",
        xml_escape(&config.site.url)
    ));
    out.push_str(&format!(
        "<lastBuildDate>{}</lastBuildDate>\n",
        built.to_rfc2822()
    ));
    for post in posts {
        out.push_str("<item>\n");
        out.push_str(&format!("<title>{}</title>\n", xml_escape(&post.title)));
        out.push_str(&format!(
            "<link>{}</link>\n",
            xml_escape(&post.permalink(config))
        ));
        out.push_str(&format!(
            "<guid isPermaLink=\"true\">{}</guid>\n",
            xml_escape(&post.permalink(config))
        ));
        out.push_str(&format!(
            "<pubDate>{}</pubDate>\n",
            post.published.to_rfc2822()
        ));
        let body = post
            .rendered_summary
            .as_deref()
            .unwrap_or(&post.rendered_html);
        out.push_str(&format!(
            "<description>{}</description>\n",
            xml_escape(body)
        ));
        out.push_str("</item>\n");
    }
    out.push_str("</channel>\n</rss>\n");
    out
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
