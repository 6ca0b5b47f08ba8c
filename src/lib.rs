//! # sitefreeze
//!
//! Turns a dynamically-served blog (a Ghost-style CMS running at
//! `http://localhost:2368`) into a static snapshot that any file host can
//! serve, then publishes it.
//!
//! # Architecture: Ten-Stage Pipeline
//!
//! Every stage reads and mutates one output directory in place, strictly in
//! order:
//!
//! ```text
//!  1. Reset            static/  →  empty static/
//!  2. Mirror           source   →  pages + requisites   (query strings kept)
//!  3. Supplementary    source   →  404, feed, sitemaps
//!  4. Audit            pages    →  missing images downloaded
//!  5. Sanitize         files    →  no '?' or '#' in any filename
//!  6. Fixup            404/index.html  →  404.html
//!  7. Rewrite          source origin   →  destination origin
//!  8. Cleanup          pages    →  backend-only elements removed
//!  9. Publish metadata          CNAME, .nojekyll
//! 10. Publish          external command
//! ```
//!
//! The output directory is the only state. A failed run leaves a partial
//! directory behind, and the next run's reset discards it.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Stage enum, presets, and the driver that runs stages in order |
//! | [`fetch`] | `Fetcher` trait: the only way any stage touches the network |
//! | [`workspace`] | Stage 1: empties the output directory |
//! | [`mirror`] | Stage 2: builtin breadth-first crawler, or external `wget` |
//! | [`supplementary`] | Stage 3: fetches well-known resources pages don't link to |
//! | [`audit`] | Stage 4: finds image references the crawl missed and downloads them |
//! | [`sanitize`] | Stage 5: strips query strings out of filenames |
//! | [`fixup`] | Stage 6: moves files to where the static host expects them |
//! | [`rewrite`] | Stage 7: origin replacement, cache-buster stripping, widget removal |
//! | [`cleanup`] | Stage 8: removes elements matching configured CSS selectors |
//! | [`publish`] | Stages 9 and 10: host metadata and the publish command |
//! | [`config`] | `sitefreeze.toml` loading, layering, validation |
//! | [`markup`] | Small HTML/CSS reference parsers shared by the fetch stages |
//! | [`output`] | CLI output formatting for stage events and reports |
//!
//! # Design Decisions
//!
//! ## Soft vs. Fatal
//!
//! Dynamic sites routinely 404 on stale assets, forget to generate a sitemap,
//! or lack a feed. None of that should stop a deploy. The fetch stages
//! therefore have no error type at all: they count failures in their reports
//! and log them. Only I/O errors on the output directory, bad configuration,
//! and a required publish command failing end a run.
//!
//! ## Builtin Crawler by Default
//!
//! The mirror stage can shell out to `wget`, but the default is an in-process
//! crawler behind the same [`fetch::Fetcher`] seam every other stage uses. No
//! system dependency to install, and the whole pipeline runs under test
//! against an in-memory site.
//!
//! ## Query Strings Survive Until Stage 5
//!
//! Mirrored files keep their query string in the filename
//! (`screen.css?v=3a`), so the fetch stages never have to agree on a naming
//! scheme. Stage 5 cleans every filename once all fetching is over, and
//! stage 7 strips the matching references from content.
//!
//! ## Idempotent Rewriting
//!
//! A destination origin that contains the source origin would make the
//! rewrite stage grow content on every run, so [`config::Origins`] rejects it.
//! With that ruled out, running stages 5 to 8 twice is a no-op the second time.

pub mod audit;
pub mod cleanup;
pub mod config;
pub mod fetch;
pub mod fixup;
pub mod markup;
pub mod mirror;
pub mod output;
pub mod pipeline;
pub mod publish;
pub mod rewrite;
pub mod sanitize;
pub mod supplementary;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_helpers;
