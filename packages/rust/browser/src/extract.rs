//! Page content extraction: HTML → clean Markdown plus outbound links.
//!
//! Readability heuristics find the main content area (`<main>`, `<article>`,
//! `[role="main"]`, `.content`, then `<body>` minus chrome), which `htmd`
//! converts to Markdown.

use scraper::{Html, Selector};
use url::Url;

use conceptscribe_shared::{PageText, Result, ScribeError};

/// Extract the rendered text of a page as Markdown, with its title and
/// resolved outbound links.
///
/// Fails with a `Read` error when the document yields no usable content.
pub fn extract_page_text(html: &str, url: &Url) -> Result<PageText> {
    let doc = Html::parse_document(html);

    let title = extract_title(&doc);
    let links = extract_links(&doc, url);
    let content_html = extract_content_html(&doc);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg"])
        .build();

    let markdown = converter
        .convert(&content_html)
        .map_err(|e| ScribeError::read(url.as_str(), format!("markdown conversion: {e}")))?;

    let markdown = collapse_blank_lines(markdown.trim());

    if markdown.is_empty() {
        return Err(ScribeError::read(url.as_str(), "page yielded no content"));
    }

    Ok(PageText {
        url: url.to_string(),
        title,
        markdown,
        links,
    })
}

/// Find the main content area via readability heuristics.
fn extract_content_html(doc: &Html) -> String {
    let selectors = ["main", "article", r#"[role="main"]"#, ".content"];

    for sel_str in selectors {
        let sel = Selector::parse(sel_str).expect("content selector");
        if let Some(el) = doc.select(&sel).next() {
            return el.inner_html();
        }
    }

    // Last resort: the body, stripping nav/header/footer/script/style/aside
    let body_sel = Selector::parse("body").expect("body selector");
    match doc.select(&body_sel).next() {
        Some(body) => strip_chrome(&body.inner_html()),
        None => String::new(),
    }
}

/// Strip common navigation/chrome elements from HTML content.
fn strip_chrome(html: &str) -> String {
    let doc = Html::parse_fragment(html);
    let chrome_sel =
        Selector::parse("nav, header, footer, aside, script, style, .sidebar, .nav")
            .expect("chrome selector");

    let mut result = html.to_string();
    for el in doc.select(&chrome_sel) {
        let outer = el.html();
        result = result.replace(&outer, "");
    }
    result
}

/// Page title from `<h1>`, falling back to `<title>`.
fn extract_title(doc: &Html) -> Option<String> {
    for sel_str in ["h1", "title"] {
        let sel = Selector::parse(sel_str).expect("title selector");
        if let Some(el) = doc.select(&sel).next() {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Extract all http(s) links from a document, resolved against the base URL.
fn extract_links(doc: &Html, base_url: &Url) -> Vec<String> {
    let link_sel = Selector::parse("a[href]").expect("link selector");
    let mut links = Vec::new();

    for el in doc.select(&link_sel) {
        if let Some(href) = el.value().attr("href") {
            // Skip anchors, javascript:, mailto:
            if href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
            {
                continue;
            }

            if let Ok(mut resolved) = base_url.join(href) {
                resolved.set_fragment(None);
                if resolved.scheme() == "http" || resolved.scheme() == "https" {
                    let s = resolved.to_string();
                    if !links.contains(&s) {
                        links.push(s);
                    }
                }
            }
        }
    }

    links
}

/// Normalize a URL for frontier deduplication (strip fragment, trailing
/// slash except at the root).
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut s = normalized.to_string();
    if s.ends_with('/') && s.matches('/').count() > 3 {
        s.pop();
    }
    s
}

/// Collapse runs of three or more newlines left behind by stripped chrome.
fn collapse_blank_lines(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut blank_run = 0usize;
    for line in markdown.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}
