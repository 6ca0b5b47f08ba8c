//! Stage 8: HTML cleanup.
//!
//! Removes configured structural elements (sign-up forms, member menus,
//! search buttons: anything that needs a live backend) from every page.
//! Each page is parsed into a DOM with `scraper`, every element matching any
//! selector is detached, and the tree is serialized back in place.
//!
//! Pages where nothing matched are never re-serialized, so they stay
//! byte-identical. Selectors are independent: the final tree does not depend
//! on their order.

use crate::audit::html_files;
use crate::markup::looks_like_xml;
use scraper::{Html, Selector};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub pages_scanned: usize,
    pub pages_changed: usize,
    pub elements_removed: usize,
    pub invalid_selectors: Vec<String>,
}

/// A selector that parsed, kept with its source text for logging.
pub struct CompiledSelector {
    pub source: String,
    selector: Selector,
}

/// Parse every selector, warning about (and dropping) the invalid ones.
pub fn compile_selectors(selectors: &[String]) -> (Vec<CompiledSelector>, Vec<String>) {
    let mut compiled = Vec::new();
    let mut invalid = Vec::new();
    for source in selectors {
        match Selector::parse(source) {
            Ok(selector) => compiled.push(CompiledSelector {
                source: source.clone(),
                selector,
            }),
            Err(e) => {
                warn!(selector = %source, error = ?e, "invalid cleanup selector, skipping");
                invalid.push(source.clone());
            }
        }
    }
    (compiled, invalid)
}

/// Remove all matches from one page.
///
/// Returns the new markup and the number of removed elements, or `None` when
/// no selector matched.
pub fn clean_page(html: &str, selectors: &[CompiledSelector]) -> Option<(String, usize)> {
    let mut document = Html::parse_document(html);
    let mut removed = 0;

    for compiled in selectors {
        let ids: Vec<_> = document.select(&compiled.selector).map(|el| el.id()).collect();
        if ids.is_empty() {
            continue;
        }
        debug!(selector = %compiled.source, count = ids.len(), "removing elements");
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
                removed += 1;
            }
        }
    }

    (removed > 0).then(|| (document.html(), removed))
}

pub fn cleanup_dir(output_dir: &Path, selectors: &[String]) -> Result<CleanupReport, CleanupError> {
    let (compiled, invalid_selectors) = compile_selectors(selectors);
    let mut report = CleanupReport {
        invalid_selectors,
        ..CleanupReport::default()
    };
    if compiled.is_empty() {
        return Ok(report);
    }

    for path in html_files(output_dir) {
        let io_err = |source| CleanupError::Io {
            path: path.clone(),
            source,
        };
        let bytes = fs::read(&path).map_err(io_err)?;
        let Ok(content) = String::from_utf8(bytes) else {
            warn!(path = %path.display(), "not valid UTF-8, skipping cleanup");
            continue;
        };
        if looks_like_xml(&content) {
            continue;
        }
        report.pages_scanned += 1;

        if let Some((cleaned, removed)) = clean_page(&content, &compiled) {
            fs::write(&path, cleaned).map_err(io_err)?;
            report.pages_changed += 1;
            report.elements_removed += removed;
        }
    }

    Ok(report)
}
