//! Document templating and keyword slugs.
//!
//! Generated content is stitched into a base HTML document by plain
//! placeholder substitution. The exact byte format of the output is not a
//! contract; the placeholders below are.

use chrono::NaiveDate;

use crate::domain::ContentPayload;

/// Built-in base document used when no template file is configured.
pub const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{TITLE}}</title>
<meta name="description" content="{{META_DESCRIPTION}}">
<meta name="keywords" content="{{KEYWORDS}}">
<link rel="canonical" href="{{CANONICAL_URL}}">
<meta property="og:title" content="{{TITLE}}">
<meta property="og:description" content="{{META_DESCRIPTION}}">
<meta property="og:url" content="{{CANONICAL_URL}}">
</head>
<body>
<header><p>{{SITE_NAME}}</p></header>
<main>
<article>
<h1>{{TITLE}}</h1>
<p><time datetime="{{DATE_ISO}}">{{DATE_ISO}}</time></p>
{{CONTENT}}
</article>
</main>
<footer><p>{{SITE_NAME}}</p></footer>
</body>
</html>
"#;

/// Turn a keyword into a URL slug: lowercase, non-alphanumeric runs
/// collapsed to single dashes, no leading or trailing dash.
pub fn slugify(keyword: &str) -> String {
    let mut slug = String::with_capacity(keyword.len());
    let mut pending_dash = false;
    for ch in keyword.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Relative canonical path for a slug's artifact.
pub fn canonical_path(slug: &str) -> String {
    format!("articles/{slug}.html")
}

/// Merge a content payload into a base document.
///
/// `canonical_url` is the externally reachable URL embedded in the page;
/// callers derive it from the highest-priority configured destination.
pub fn merge_template(
    template: &str,
    payload: &ContentPayload,
    canonical_url: &str,
    site_name: &str,
    date: NaiveDate,
) -> String {
    let title = attr_escape(payload.title.trim());
    let description = attr_escape(payload.description.trim());
    let keywords = attr_escape(&payload.keywords.join(", "));
    let date_iso = date.format("%Y-%m-%d").to_string();

    template
        .replace("{{TITLE}}", &title)
        .replace("{{META_DESCRIPTION}}", &description)
        .replace("{{KEYWORDS}}", &keywords)
        .replace("{{CANONICAL_URL}}", canonical_url)
        .replace("{{CONTENT}}", payload.body_html.trim())
        .replace("{{SITE_NAME}}", site_name)
        .replace("{{DATE_ISO}}", &date_iso)
}

/// Escape characters that would break out of an HTML attribute value.
fn attr_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
