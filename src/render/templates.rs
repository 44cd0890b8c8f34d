//! Named page templates.
//!
//! Every generated page goes through [`TemplateEngine::render`] with a JSON
//! context. [`BuiltinTemplates`] ships a minimal theme so a site builds
//! without any template files.
//!
//! # Context shapes
//!
//! All contexts carry `site: { title, description, url }`. Post listings are
//! arrays of `{ title, url, date, summary, tags: [{ name, url }] }`, where
//! `summary` is rendered HTML and is emitted as-is.
//!
//! | Template              | Extra keys                                           |
//! |-----------------------|------------------------------------------------------|
//! | `content_display`     | `doc`, `body`                                        |
//! | `blog/index`          | `page`, `total_pages`, `posts`, `prev`, `next`       |
//! | `blog/archive`        | `years`                                              |
//! | `blog/year_archive`   | `year: { year, count, months }`                      |
//! | `blog/month_archive`  | `month: { year, month, month_name, count, posts }`   |
//! | `tag`                 | `tag: { name, count, url, feed }`, `posts`           |
//! | `tagcloud`            | `tags: [{ name, count, size, url }]`                 |

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template `{0}` not found")]
    NotFound(String),

    #[error("template `{name}` expects an object context")]
    Context { name: String },
}

/// Renders a named template against a JSON context.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, name: &str, ctx: &Value) -> Result<String, TemplateError>;
}

/// The built-in theme.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl TemplateEngine for BuiltinTemplates {
    fn render(&self, name: &str, ctx: &Value) -> Result<String, TemplateError> {
        if !ctx.is_object() {
            return Err(TemplateError::Context { name: name.into() });
        }

        let (title, body) = match name {
            "content_display" => content_display(ctx),
            "blog/index" => blog_index(ctx),
            "blog/archive" => blog_archive(ctx),
            "blog/year_archive" => year_archive(ctx),
            "blog/month_archive" => month_archive(ctx),
            "tag" => tag_page(ctx),
            "tagcloud" => tag_cloud(ctx),
            _ => return Err(TemplateError::NotFound(name.into())),
        };

        Ok(layout(ctx, &title, &body))
    }
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// Field access
// ============================================================================

fn str_of<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn num_of(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or_default()
}

fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

// ============================================================================
// Fragments
// ============================================================================

fn layout(ctx: &Value, title: &str, body: &str) -> String {
    let site = &ctx["site"];
    let site_title = escape_html(str_of(site, "title"));
    let page_title = if title.is_empty() {
        site_title.clone()
    } else {
        format!("{} | {site_title}", escape_html(title))
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{page_title}</title>
<link rel="alternate" type="application/atom+xml" title="{site_title}" href="/feed.atom">
</head>
<body>
<header><a href="/">{site_title}</a> <nav><a href="/archive/">Archive</a> <a href="/tags/">Tags</a></nav></header>
<main>
{body}
</main>
</body>
</html>
"#
    )
}

fn tag_links(post: &Value) -> String {
    items(post, "tags")
        .iter()
        .map(|tag| {
            format!(
                r#"<a href="{}">{}</a>"#,
                escape_html(str_of(tag, "url")),
                escape_html(str_of(tag, "name"))
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn post_list(posts: &[Value]) -> String {
    let mut out = String::from("<ul class=\"posts\">\n");
    for post in posts {
        out.push_str(&format!(
            "<li><time>{}</time> <a href=\"{}\">{}</a>",
            escape_html(str_of(post, "date")),
            escape_html(str_of(post, "url")),
            escape_html(str_of(post, "title")),
        ));
        let summary = str_of(post, "summary");
        if !summary.is_empty() {
            out.push_str(&format!(" <div class=\"summary\">{summary}</div>"));
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ul>");
    out
}

fn month_section(month: &Value) -> String {
    format!(
        "<h3><a href=\"/{}/{}/\">{} {}</a> ({})</h3>\n{}",
        num_of(month, "year"),
        escape_html(str_of(month, "month")),
        escape_html(str_of(month, "month_name")),
        num_of(month, "year"),
        num_of(month, "count"),
        post_list(items(month, "posts")),
    )
}

// ============================================================================
// Templates
// ============================================================================

fn content_display(ctx: &Value) -> (String, String) {
    let doc = &ctx["doc"];
    let title = str_of(doc, "title").to_owned();

    let mut body = format!("<article>\n<h1>{}</h1>\n", escape_html(&title));
    let date = str_of(doc, "date");
    if !date.is_empty() {
        body.push_str(&format!("<p class=\"date\"><time>{}</time></p>\n", escape_html(date)));
    }
    body.push_str(str_of(ctx, "body"));
    let tags = tag_links(doc);
    if !tags.is_empty() {
        body.push_str(&format!("\n<p class=\"tags\">Tags: {tags}</p>"));
    }
    body.push_str("\n</article>");

    (title, body)
}

fn blog_index(ctx: &Value) -> (String, String) {
    let mut body = post_list(items(ctx, "posts"));

    let link = |key: &str, label: &str| {
        ctx.get(key)
            .and_then(Value::as_str)
            .map(|url| format!(r#"<a rel="{key}" href="{}">{label}</a>"#, escape_html(url)))
    };
    let nav: Vec<String> = [link("prev", "Newer"), link("next", "Older")]
        .into_iter()
        .flatten()
        .collect();
    if num_of(ctx, "total_pages") > 1 {
        body.push_str(&format!(
            "\n<nav class=\"pagination\">{} <span>Page {} of {}</span></nav>",
            nav.join(" "),
            num_of(ctx, "page"),
            num_of(ctx, "total_pages"),
        ));
    }

    (String::new(), body)
}

fn blog_archive(ctx: &Value) -> (String, String) {
    let mut body = String::from("<h1>Archive</h1>\n");
    for year in items(ctx, "years") {
        body.push_str(&format!(
            "<h2><a href=\"/{0}/\">{0}</a> ({1})</h2>\n",
            num_of(year, "year"),
            num_of(year, "count"),
        ));
        for month in items(year, "months") {
            body.push_str(&month_section(month));
            body.push('\n');
        }
    }
    ("Archive".into(), body)
}

fn year_archive(ctx: &Value) -> (String, String) {
    let year = &ctx["year"];
    let title = format!("Archive for {}", num_of(year, "year"));

    let mut body = format!("<h1>{title}</h1>\n");
    for month in items(year, "months") {
        body.push_str(&month_section(month));
        body.push('\n');
    }
    (title, body)
}

fn month_archive(ctx: &Value) -> (String, String) {
    let month = &ctx["month"];
    let title = format!(
        "Archive for {} {}",
        str_of(month, "month_name"),
        num_of(month, "year")
    );

    let body = format!(
        "<h1>{}</h1>\n{}",
        escape_html(&title),
        post_list(items(month, "posts"))
    );
    (title, body)
}

fn tag_page(ctx: &Value) -> (String, String) {
    let tag = &ctx["tag"];
    let name = str_of(tag, "name");
    let title = format!("Tag {name}");

    let body = format!(
        "<h1>{}</h1>\n<p>{} entries. <a href=\"{}\">Feed</a></p>\n{}",
        escape_html(&title),
        num_of(tag, "count"),
        escape_html(str_of(tag, "feed")),
        post_list(items(ctx, "posts")),
    );
    (title, body)
}

fn tag_cloud(ctx: &Value) -> (String, String) {
    let mut body = String::from("<h1>Tags</h1>\n<p class=\"tagcloud\">\n");
    for tag in items(ctx, "tags") {
        let size = tag.get("size").and_then(Value::as_f64).unwrap_or(100.0);
        body.push_str(&format!(
            "<a href=\"{}\" style=\"font-size: {size:.0}%\">{}</a> ({})\n",
            escape_html(str_of(tag, "url")),
            escape_html(str_of(tag, "name")),
            num_of(tag, "count"),
        ));
    }
    body.push_str("</p>");
    ("Tags".into(), body)
}
