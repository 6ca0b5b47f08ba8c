//! Small text helpers shared by the crawl, the audit and the rewrite stages.

use regex::Regex;
use std::sync::LazyLock;

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)|@import\s+['"]([^'"]+)['"]"#)
        .expect("css url pattern must compile")
});

/// Split a `srcset` attribute value into its candidate URLs.
///
/// Candidates are comma-separated; each URL runs until whitespace and any
/// width/density descriptor after it is dropped. A URL that ends in a comma
/// closes its candidate immediately, so `a.png,b.png 2x` is one URL while
/// `a.png, b.png 2x` is two.
///
/// ```text
/// "/a.png 600w, /b.png?v=2 1000w"  →  ["/a.png", "/b.png?v=2"]
/// ```
pub fn parse_srcset(value: &str) -> Vec<&str> {
    let mut urls = Vec::new();
    let mut rest = value;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (url, tail) = rest.split_at(end);
        if url.ends_with(',') {
            let url = url.trim_end_matches(',');
            if !url.is_empty() {
                urls.push(url);
            }
            rest = tail;
            continue;
        }
        urls.push(url);
        rest = match tail.find(',') {
            Some(i) => &tail[i + 1..],
            None => "",
        };
    }
    urls
}

/// References from `url(...)` and `@import "..."` in a stylesheet.
pub fn css_urls(css: &str) -> Vec<&str> {
    CSS_URL
        .captures_iter(css)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str())
        .filter(|u| !u.starts_with("data:"))
        .collect()
}

/// True when the document opens with an XML declaration (feeds, sitemaps),
/// whatever its file extension says.
pub fn looks_like_xml(content: &str) -> bool {
    content
        .trim_start_matches('\u{feff}')
        .trim_start()
        .starts_with("<?xml")
}
