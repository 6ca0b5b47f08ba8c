//! Stage 2: mirror fetch.
//!
//! Recursively retrieves every same-origin page reachable from the source root,
//! plus the assets those pages need, into the output directory. The on-disk
//! layout follows the conventions of classic mirroring tools:
//!
//! ```text
//! http://localhost:2368/                          →  index.html
//! http://localhost:2368/about/                    →  about/index.html
//! http://localhost:2368/welcome      (text/html)  →  welcome.html
//! http://localhost:2368/assets/built/screen.css?v=3a  →  assets/built/screen.css?v=3a
//! ```
//!
//! Query strings are deliberately kept in filenames; stage 5 strips them once
//! every fetch stage is done.
//!
//! Nothing here is fatal. Dynamic sites routinely answer 404 for stale or
//! unlinked assets, so every failure is logged and counted, and the run
//! continues with whatever was retrieved.
//!
//! Two backends exist: the builtin crawler (default, no external programs) and
//! `wget`, for operators who already trust its mirroring behaviour.

use crate::config::{MirrorTool, Origins};
use crate::fetch::{FetchOutcome, Fetcher, write_resource};
use crate::markup::{css_urls, parse_srcset};
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    pub tool: MirrorTool,
    /// Files written to the output directory.
    pub saved: usize,
    /// HTML pages among the saved files (builtin only).
    pub pages: usize,
    pub not_found: usize,
    pub failed: usize,
    /// The builtin crawl stopped at `mirror.max_pages`.
    pub truncated: bool,
    /// Exit status of the external tool, if it ran to completion.
    pub exit_code: Option<i32>,
}

impl MirrorReport {
    fn new(tool: MirrorTool) -> Self {
        Self {
            tool,
            saved: 0,
            pages: 0,
            not_found: 0,
            failed: 0,
            truncated: false,
            exit_code: None,
        }
    }
}

/// Run the configured backend.
pub fn mirror(
    tool: MirrorTool,
    fetcher: &impl Fetcher,
    origins: &Origins,
    output_dir: &Path,
    max_pages: usize,
) -> MirrorReport {
    match tool {
        MirrorTool::Builtin => crawl(fetcher, origins, output_dir, max_pages),
        MirrorTool::Wget => run_wget(origins, output_dir),
    }
}

// ============================================================================
// Builtin crawler
// ============================================================================

/// (selector, attribute, is_srcset) triples describing page requisites.
const REQUISITE_ATTRS: &[(&str, &str, bool)] = &[
    ("link[href]", "href", false),
    ("script[src]", "src", false),
    ("img[src]", "src", false),
    ("img[srcset]", "srcset", true),
    ("source[src]", "src", false),
    ("source[srcset]", "srcset", true),
    ("video[src]", "src", false),
    ("video[poster]", "poster", false),
    ("audio[src]", "src", false),
];

static REQUISITE_SELECTORS: LazyLock<Vec<(Selector, &'static str, bool)>> = LazyLock::new(|| {
    REQUISITE_ATTRS
        .iter()
        .map(|(sel, attr, srcset)| {
            (
                Selector::parse(sel).expect("requisite selector must parse"),
                *attr,
                *srcset,
            )
        })
        .collect()
});

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector must parse"));

/// Breadth-first crawl of the source origin through `fetcher`.
pub fn crawl(
    fetcher: &impl Fetcher,
    origins: &Origins,
    output_dir: &Path,
    max_pages: usize,
) -> MirrorReport {
    let mut report = MirrorReport::new(MirrorTool::Builtin);
    let mut queue = VecDeque::new();
    let mut seen = HashSet::new();

    let root = origins.source.join("/").unwrap_or_else(|_| origins.source.clone());
    seen.insert(root.to_string());
    queue.push_back(root);

    let mut fetched = 0;
    while let Some(url) = queue.pop_front() {
        if fetched >= max_pages {
            warn!(max_pages, remaining = queue.len() + 1, "crawl stopped at page cap");
            report.truncated = true;
            break;
        }
        fetched += 1;

        let resource = match fetcher.fetch(&url) {
            FetchOutcome::Found(r) => r,
            FetchOutcome::NotFound(_) => {
                debug!(%url, "not found");
                report.not_found += 1;
                continue;
            }
            FetchOutcome::TransportError(e) => {
                warn!(%url, error = %e, "fetch failed");
                report.failed += 1;
                continue;
            }
        };

        let is_html = resource.is_html();
        let rel = local_path_for(&url, is_html);
        if let Err(e) = write_resource(output_dir, &rel, &resource.body) {
            warn!(%url, path = %rel, error = %e, "could not save resource");
            report.failed += 1;
            continue;
        }
        report.saved += 1;
        debug!(%url, path = %rel, "saved");

        let discovered = if is_html {
            report.pages += 1;
            page_links(&String::from_utf8_lossy(&resource.body), &url)
        } else if resource.is_css() || rel.ends_with(".css") || rel.contains(".css?") {
            stylesheet_links(&String::from_utf8_lossy(&resource.body), &url)
        } else {
            Vec::new()
        };

        for link in discovered {
            if link.origin() != origins.source.origin() {
                continue;
            }
            if seen.insert(link.to_string()) {
                queue.push_back(link);
            }
        }
    }

    report
}

/// Map a URL to its relative path under the output directory.
///
/// Directory-style URLs become `index.html`; HTML responses without an HTML
/// extension get `.html` appended. The path is percent-decoded and the query
/// string, if any, is kept verbatim after a `?`.
pub fn local_path_for(url: &Url, is_html: bool) -> String {
    let raw = url.path();
    let decoded = urlencoding::decode(raw)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| raw.to_string());

    let mut path = decoded.trim_start_matches('/').to_string();
    if path.is_empty() || path.ends_with('/') {
        path.push_str("index.html");
    } else if is_html && !has_html_extension(&path) {
        path.push_str(".html");
    }
    match url.query() {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path,
    }
}

fn has_html_extension(path: &str) -> bool {
    Path::new(path)
        .extension()
        .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        .unwrap_or(false)
}

/// Links and requisites referenced from an HTML page, resolved against it.
pub fn page_links(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut raw: Vec<&str> = document
        .select(&ANCHOR)
        .filter_map(|el| el.value().attr("href"))
        .collect();

    for (selector, attr, is_srcset) in REQUISITE_SELECTORS.iter() {
        for el in document.select(selector) {
            if let Some(value) = el.value().attr(attr) {
                if *is_srcset {
                    raw.extend(parse_srcset(value));
                } else {
                    raw.push(value);
                }
            }
        }
    }

    raw.into_iter().filter_map(|r| resolve(base, r)).collect()
}

/// `url(...)` and `@import` references from a stylesheet, resolved against it.
pub fn stylesheet_links(css: &str, base: &Url) -> Vec<Url> {
    css_urls(css)
        .into_iter()
        .filter_map(|r| resolve(base, r))
        .collect()
}

fn resolve(base: &Url, reference: &str) -> Option<Url> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }
    let mut url = base.join(reference).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

// ============================================================================
// wget backend
// ============================================================================

fn run_wget(origins: &Origins, output_dir: &Path) -> MirrorReport {
    let mut report = MirrorReport::new(MirrorTool::Wget);
    let status = Command::new("wget")
        .args([
            "--recursive",
            "--level=inf",
            "--page-requisites",
            "--no-parent",
            "--no-host-directories",
            "--adjust-extension",
            "--restrict-file-names=unix",
            "--execute=robots=off",
            "--no-verbose",
            "--directory-prefix",
        ])
        .arg(output_dir)
        .arg(origins.source.as_str())
        .status();

    match status {
        Ok(s) if s.success() => report.exit_code = s.code(),
        Ok(s) => {
            // wget exits 8 whenever any single request returned an error
            warn!(status = %s, "wget reported errors, continuing with partial mirror");
            report.exit_code = s.code();
            report.failed += 1;
        }
        Err(e) => {
            warn!(error = %e, "could not run wget, continuing without a mirror");
            report.failed += 1;
        }
    }

    report.saved = WalkDir::new(output_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count();
    report
}
