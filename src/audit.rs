//! Stage 4: image audit.
//!
//! Content-management backends generate responsive image sizes on demand, and
//! only reference most of them from `srcset` candidate lists. A crawler that
//! does not evaluate those lists (or that stopped early) leaves holes. The
//! audit rescans every saved page, collects every image reference, and
//! fetches whatever is not on disk yet.
//!
//! ## Normalization
//!
//! A reference is reduced to a decoded, root-relative path before anything
//! else happens:
//!
//! ```text
//! http://localhost:2368/content/images/size/w600/a.png?v=2  →  /content/images/size/w600/a.png
//! //localhost:2368/content/images/b%20c.png                 →  /content/images/b c.png
//! ../content/images/d.png          (on /post/)              →  /content/images/d.png
//! https://cdn.example.net/content/images/e.png              →  (ignored, foreign host)
//! ```
//!
//! Only paths under the configured asset prefix are kept, and only if their
//! decoded form still names a file inside the output directory (an encoded
//! `..%2F` is dropped, not fetched). The normalized path
//! is the dedup key and maps 1:1 to the file on disk, so auditing a complete
//! mirror a second time fetches nothing.

use crate::config::Origins;
use crate::fetch::{FetchOutcome, Fetcher, stays_inside, write_resource};
use crate::markup::{css_urls, parse_srcset};
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub pages_scanned: usize,
    /// Unique normalized image paths found across all pages.
    pub candidates: usize,
    pub already_present: usize,
    pub downloaded: usize,
    pub failed: usize,
}

static IMAGE_ELEMENTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img, source").expect("image selector must parse"));

static SOCIAL_IMAGES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:image"], meta[name="twitter:image"]"#)
        .expect("meta selector must parse")
});

static STYLED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[style]").expect("style selector must parse"));

pub fn audit(
    fetcher: &impl Fetcher,
    origins: &Origins,
    output_dir: &Path,
    asset_prefix: &str,
) -> AuditReport {
    let mut report = AuditReport::default();
    let mut discovered = BTreeSet::new();

    for page in html_files(output_dir) {
        let content = match fs::read(&page) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(path = %page.display(), error = %e, "could not read page");
                continue;
            }
        };
        report.pages_scanned += 1;
        let rel = relative_path(output_dir, &page);
        let base = match origins.source.join(&rel) {
            Ok(u) => u,
            Err(_) => origins.source.clone(),
        };
        discovered.extend(discover_images(&content, &base, origins, asset_prefix));
    }
    report.candidates = discovered.len();

    for path in &discovered {
        let local = output_dir.join(path.trim_start_matches('/'));
        if local.exists() {
            report.already_present += 1;
            continue;
        }
        let url = match origins.source.join(&encode_path(path)) {
            Ok(u) => u,
            Err(e) => {
                debug!(%path, error = %e, "unjoinable image path");
                report.failed += 1;
                continue;
            }
        };
        match fetcher.fetch(&url) {
            FetchOutcome::Found(resource) => match write_resource(output_dir, path, &resource.body) {
                Ok(()) => {
                    debug!(%url, "downloaded missing image");
                    report.downloaded += 1;
                }
                Err(e) => {
                    warn!(%path, error = %e, "could not save image");
                    report.failed += 1;
                }
            },
            // Sizes the backend only generates on demand may no longer exist
            FetchOutcome::NotFound(_) => {
                debug!(%url, "image not found on source");
                report.failed += 1;
            }
            FetchOutcome::TransportError(e) => {
                debug!(%url, error = %e, "image fetch failed");
                report.failed += 1;
            }
        }
    }

    report
}

/// Every normalized image path referenced by one page.
pub fn discover_images(
    html: &str,
    base: &Url,
    origins: &Origins,
    asset_prefix: &str,
) -> BTreeSet<String> {
    let document = Html::parse_document(html);
    let mut raw: Vec<&str> = Vec::new();

    for el in document.select(&IMAGE_ELEMENTS) {
        let attrs = el.value();
        for attr in ["src", "data-src"] {
            if let Some(v) = attrs.attr(attr) {
                raw.push(v);
            }
        }
        for attr in ["srcset", "data-srcset"] {
            if let Some(v) = attrs.attr(attr) {
                raw.extend(parse_srcset(v));
            }
        }
    }
    for el in document.select(&SOCIAL_IMAGES) {
        if let Some(v) = el.value().attr("content") {
            raw.push(v);
        }
    }
    for el in document.select(&STYLED) {
        if let Some(v) = el.value().attr("style") {
            raw.extend(css_urls(v));
        }
    }

    raw.into_iter()
        .filter_map(|r| normalize_candidate(r, base, origins, asset_prefix))
        .collect()
}

/// Reduce one image reference to a decoded root-relative path under
/// `asset_prefix`, or `None` if it is not an audited asset.
pub fn normalize_candidate(
    raw: &str,
    base: &Url,
    origins: &Origins,
    asset_prefix: &str,
) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return None;
    }
    let url = base.join(raw).ok()?;
    let host = url.host_str()?;
    if Some(host) != origins.source.host_str() && Some(host) != origins.destination.host_str() {
        return None;
    }
    let path = urlencoding::decode(url.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| url.path().to_string());
    (path.starts_with(asset_prefix) && stays_inside(&path)).then_some(path)
}

/// Escape the characters a decoded path cannot carry back into a URL.
fn encode_path(path: &str) -> String {
    path.replace('%', "%25")
        .replace('?', "%3F")
        .replace('#', "%23")
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// `.html`/`.htm` files under `root`, sorted.
pub(crate) fn html_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::MockFetcher;
    use crate::test_helpers::{origins, write_file};
    use tempfile::TempDir;

    const PREFIX: &str = "/content/images/";

    fn base() -> Url {
        Url::parse("http://localhost:2368/post/index.html").unwrap()
    }

    fn normalize(raw: &str) -> Option<String> {
        normalize_candidate(raw, &base(), &origins(), PREFIX)
    }

    #[test]
    fn srcset_example_extracts_exact_set() {
        let html = r#"<img srcset="/content/images/a.png 600w, /content/images/b.png?v=2 1000w">"#;
        let found = discover_images(html, &base(), &origins(), PREFIX);
        let expected: BTreeSet<String> = ["/content/images/a.png", "/content/images/b.png"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn normalize_strips_origin_and_query() {
        assert_eq!(
            normalize("http://localhost:2368/content/images/size/w600/a.png?v=2").as_deref(),
            Some("/content/images/size/w600/a.png")
        );
    }

    #[test]
    fn normalize_protocol_relative_and_decodes() {
        assert_eq!(
            normalize("//localhost:2368/content/images/b%20c.png").as_deref(),
            Some("/content/images/b c.png")
        );
    }

    #[test]
    fn normalize_accepts_destination_host() {
        assert_eq!(
            normalize("https://blog.example.com/content/images/x.jpg").as_deref(),
            Some("/content/images/x.jpg")
        );
    }

    #[test]
    fn normalize_resolves_relative_references() {
        assert_eq!(
            normalize("../content/images/d.png").as_deref(),
            Some("/content/images/d.png")
        );
    }

    #[test]
    fn normalize_rejects_foreign_hosts_and_other_paths() {
        assert_eq!(normalize("https://cdn.example.net/content/images/e.png"), None);
        assert_eq!(normalize("/assets/images/logo.png"), None);
        assert_eq!(normalize("data:image/png;base64,AAAA"), None);
        assert_eq!(normalize("   "), None);
    }

    #[test]
    fn normalize_drops_encoded_parent_segments() {
        assert_eq!(normalize("/content/images/..%2F..%2F..%2Fescaped.png"), None);
        assert_eq!(normalize("/content/images/%2E%2E/%2E%2E/etc/passwd"), None);
        assert_eq!(
            normalize("/content/images/2024%2F01%2Fphoto.jpg").as_deref(),
            Some("/content/images/2024/01/photo.jpg")
        );
    }

    #[test]
    fn encoded_traversal_never_leaves_output_dir() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("static");
        write_file(
            &out,
            "index.html",
            r#"<img src="/content/images/..%2F..%2F..%2Fescaped.png">"#,
        );
        let fetcher = MockFetcher::new().with_body(
            "http://localhost:2368/escaped.png",
            "PNG",
            "image/png",
        );

        let report = audit(&fetcher, &origins(), &out, PREFIX);

        assert_eq!(report.candidates, 0);
        assert!(fetcher.requested().is_empty());
        assert!(!tmp.path().join("escaped.png").exists());
        assert_eq!(crate::test_helpers::all_files(&out), vec!["index.html"]);
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [
            "http://localhost:2368/content/images/size/w600/a.png?v=2",
            "//localhost:2368/content/images/b%20c.png",
            "/content/images/2024/01/photo.jpg#frag",
        ] {
            let once = normalize(raw).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "normalizing {raw} twice changed it");
        }
    }

    #[test]
    fn discovers_lazy_social_and_inline_styles() {
        let html = r#"<html><head>
            <meta property="og:image" content="http://localhost:2368/content/images/og.png">
        </head><body>
            <img data-src="/content/images/lazy.png" data-srcset="/content/images/lazy-2x.png 2x">
            <picture><source srcset="/content/images/w.webp 1x"></picture>
            <div style="background-image: url(/content/images/cover.jpg)"></div>
        </body></html>"#;
        let found = discover_images(html, &base(), &origins(), PREFIX);
        for path in [
            "/content/images/og.png",
            "/content/images/lazy.png",
            "/content/images/lazy-2x.png",
            "/content/images/w.webp",
            "/content/images/cover.jpg",
        ] {
            assert!(found.contains(path), "missing {path}");
        }
    }

    #[test]
    fn fetches_only_missing_and_dedups_across_pages() {
        let tmp = TempDir::new().unwrap();
        let page = r#"<img src="/content/images/a.png" srcset="/content/images/a.png 600w, /content/images/size/w1000/a.png 1000w">"#;
        write_file(tmp.path(), "index.html", page);
        write_file(tmp.path(), "post/index.html", page);
        write_file(tmp.path(), "content/images/a.png", "A");

        let fetcher = MockFetcher::new().with_body(
            "http://localhost:2368/content/images/size/w1000/a.png",
            "W1000",
            "image/png",
        );

        let report = audit(&fetcher, &origins(), tmp.path(), PREFIX);

        assert_eq!(report.pages_scanned, 2);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.already_present, 1);
        assert_eq!(report.downloaded, 1);
        assert_eq!(fetcher.requested().len(), 1);
        assert_eq!(
            fs::read(tmp.path().join("content/images/size/w1000/a.png")).unwrap(),
            b"W1000"
        );
    }

    #[test]
    fn second_audit_makes_no_requests() {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "index.html",
            r#"<img srcset="/content/images/a.png 600w, /content/images/b%20c.png 1000w">"#,
        );
        let fetcher = MockFetcher::new()
            .with_body("http://localhost:2368/content/images/a.png", "A", "image/png")
            .with_body("http://localhost:2368/content/images/b%20c.png", "B", "image/png");

        let first = audit(&fetcher, &origins(), tmp.path(), PREFIX);
        assert_eq!(first.downloaded, 2);
        assert!(tmp.path().join("content/images/b c.png").exists());

        let second_fetcher = MockFetcher::new();
        let second = audit(&second_fetcher, &origins(), tmp.path(), PREFIX);
        assert_eq!(second.already_present, 2);
        assert_eq!(second.downloaded, 0);
        assert!(second_fetcher.requested().is_empty());
    }

    #[test]
    fn missing_images_are_swallowed() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "index.html", r#"<img src="/content/images/gone.png">"#);
        let report = audit(&MockFetcher::new(), &origins(), tmp.path(), PREFIX);
        assert_eq!(report.failed, 1);
        assert!(!tmp.path().join("content/images/gone.png").exists());
    }
}
