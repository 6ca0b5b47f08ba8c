//! Stage 3: supplementary fetch.
//!
//! A handful of well-known resources are not reliably linked from any page
//! (the custom error page, the feed, the sitemap family), so the crawl may
//! miss them. Each is fetched directly and independently. A resource that
//! does not exist leaves nothing behind: no empty file, no placeholder.
//!
//! The custom error page is the exception to "404 means absent": the source
//! serves it with exactly that status, so resources marked `error_page` keep
//! a non-empty 404 body.

use crate::config::{Origins, SupplementaryResource};
use crate::fetch::{FetchOutcome, Fetcher, write_resource};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplementaryReport {
    pub attempted: usize,
    pub found: usize,
    pub missing: usize,
    pub sitemaps_found: usize,
}

pub fn fetch_supplementary(
    fetcher: &impl Fetcher,
    origins: &Origins,
    output_dir: &Path,
    resources: &[SupplementaryResource],
) -> SupplementaryReport {
    let mut report = SupplementaryReport::default();

    for resource in resources {
        report.attempted += 1;
        let url = match origins.source.join(resource.path.trim_start_matches('/')) {
            Ok(u) => u,
            Err(e) => {
                warn!(path = %resource.path, error = %e, "invalid supplementary path");
                report.missing += 1;
                continue;
            }
        };

        let body = match fetcher.fetch(&url) {
            FetchOutcome::Found(r) if !r.body.is_empty() => r.body,
            FetchOutcome::Found(_) => {
                debug!(%url, "empty response, skipping");
                report.missing += 1;
                continue;
            }
            FetchOutcome::NotFound(Some(r)) if resource.error_page && !r.body.is_empty() => {
                debug!(%url, "keeping error page body");
                r.body
            }
            FetchOutcome::NotFound(_) => {
                debug!(%url, "not present on source");
                report.missing += 1;
                continue;
            }
            FetchOutcome::TransportError(e) => {
                debug!(%url, error = %e, "fetch failed, skipping");
                report.missing += 1;
                continue;
            }
        };

        if let Err(e) = write_resource(output_dir, &resource.file, &body) {
            warn!(file = %resource.file, error = %e, "could not save supplementary resource");
            report.missing += 1;
            continue;
        }
        report.found += 1;
        if resource.is_sitemap() {
            report.sitemaps_found += 1;
        }
    }

    report
}
