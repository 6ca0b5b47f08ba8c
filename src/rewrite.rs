//! Stage 7: content rewrite.
//!
//! Every textual file is passed through an ordered list of regex rules chosen
//! by its [`FileKind`]:
//!
//! | Rule | Markup | Xml | Text |
//! |------|:------:|:---:|:----:|
//! | source origin → destination origin | ✓ | ✓ | ✓ |
//! | strip `?v=...` after static-asset extensions | ✓ | ✓ | ✓ |
//! | drop `<script>` elements of live-backend widgets | ✓ | | |
//! | `//source-host` → `//destination-host` | | ✓ | |
//! | drop `<?xml-stylesheet ...?>` | | ✓ | |
//!
//! Origin replacement is a plain substring match: the source origin is a full
//! URL, so there is nothing to anchor. Cache-buster stripping matches only
//! `name.ext?query` and never touches an origin, so the two rules commute.
//!
//! Every rule is idempotent and no rule produces text another rule matches
//! (the config layer rejects destinations that contain the source origin),
//! so rewriting an already-rewritten tree changes nothing. Files are only
//! written back when their content actually changed.

use crate::config::{Origins, RewriteConfig};
use crate::markup::looks_like_xml;
use regex::{NoExpand, Regex};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// How a file is treated by the rewrite stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Markup,
    Xml,
    Text,
}

impl FileKind {
    /// Classify by extension, sniffing `.html` files for an XML declaration
    /// (feeds are saved as `rss/index.html`). `None` means "not text, skip".
    pub fn classify(path: &Path, content: &str, text_extensions: &[String]) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        match ext.as_str() {
            "html" | "htm" if looks_like_xml(content) => Some(Self::Xml),
            "html" | "htm" => Some(Self::Markup),
            "xml" | "xsl" | "rss" | "atom" => Some(Self::Xml),
            e if text_extensions.iter().any(|t| t.eq_ignore_ascii_case(e)) => Some(Self::Text),
            _ => None,
        }
    }
}

/// One rewrite operation.
#[derive(Debug, Clone)]
pub enum RewriteRule {
    /// Literal replacement of every match.
    Replace { pattern: Regex, replacement: String },
    /// `name.ext?query` → `name.ext`. Group 1 is the kept part.
    StripCacheBuster(Regex),
    /// Remove whole `<script>` elements whose text mentions any marker.
    RemoveScripts { element: Regex, markers: Vec<String> },
}

impl RewriteRule {
    fn literal(from: &str, to: &str) -> Self {
        Self::Replace {
            pattern: Regex::new(&regex::escape(from)).expect("escaped literal must compile"),
            replacement: to.to_string(),
        }
    }

    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match self {
            Self::Replace {
                pattern,
                replacement,
            } => pattern.replace_all(text, NoExpand(replacement)),
            Self::StripCacheBuster(pattern) => pattern.replace_all(text, "${1}"),
            Self::RemoveScripts { element, markers } => {
                element.replace_all(text, |caps: &regex::Captures| {
                    let script = &caps[0];
                    if markers.iter().any(|m| script.contains(m.as_str())) {
                        String::new()
                    } else {
                        script.to_string()
                    }
                })
            }
        }
    }
}

/// The three rule lists, built once per run from the origins and config.
#[derive(Debug, Clone)]
pub struct Rewriter {
    markup: Vec<RewriteRule>,
    xml: Vec<RewriteRule>,
    text: Vec<RewriteRule>,
}

impl Rewriter {
    pub fn new(origins: &Origins, config: &RewriteConfig) -> Result<Self, RewriteError> {
        let origin = RewriteRule::literal(origins.source_prefix(), origins.destination_prefix());
        let cache_buster = cache_buster_rule(&config.cache_bust_extensions)?;

        let mut markup = vec![origin.clone()];
        markup.extend(cache_buster.clone());
        if !config.widget_markers.is_empty() {
            markup.push(RewriteRule::RemoveScripts {
                element: Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>")?,
                markers: config.widget_markers.clone(),
            });
        }

        let mut xml = vec![origin.clone()];
        xml.extend(cache_buster.clone());
        xml.push(RewriteRule::literal(
            &format!("//{}", origins.source_authority()),
            &format!("//{}", origins.destination_authority()),
        ));
        xml.push(RewriteRule::Replace {
            pattern: Regex::new(r"(?s)<\?xml-stylesheet\b.*?\?>[ \t]*\r?\n?")?,
            replacement: String::new(),
        });

        let mut text = vec![origin];
        text.extend(cache_buster);

        Ok(Self { markup, xml, text })
    }

    pub fn rules(&self, kind: FileKind) -> &[RewriteRule] {
        match kind {
            FileKind::Markup => &self.markup,
            FileKind::Xml => &self.xml,
            FileKind::Text => &self.text,
        }
    }

    /// Apply every rule for `kind` in order.
    pub fn rewrite(&self, kind: FileKind, content: &str) -> String {
        self.rules(kind)
            .iter()
            .fold(content.to_string(), |acc, rule| rule.apply(&acc).into_owned())
    }
}

fn cache_buster_rule(extensions: &[String]) -> Result<Option<RewriteRule>, regex::Error> {
    if extensions.is_empty() {
        return Ok(None);
    }
    let alternation = extensions
        .iter()
        .map(|e| regex::escape(e.trim_start_matches('.')))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = Regex::new(&format!(
        r#"(?i)([\w-]\.(?:{alternation}))\?[^"'\s<>(),]+"#
    ))?;
    Ok(Some(RewriteRule::StripCacheBuster(pattern)))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub files_scanned: usize,
    pub markup_changed: usize,
    pub xml_changed: usize,
    pub text_changed: usize,
    /// Files that were not valid UTF-8 and were left alone.
    pub skipped: usize,
}

impl RewriteReport {
    pub fn changed(&self) -> usize {
        self.markup_changed + self.xml_changed + self.text_changed
    }
}

/// Rewrite every textual file under `output_dir` in place.
pub fn rewrite_dir(
    output_dir: &Path,
    rewriter: &Rewriter,
    text_extensions: &[String],
) -> Result<RewriteReport, RewriteError> {
    let mut report = RewriteReport::default();

    let mut files: Vec<PathBuf> = WalkDir::new(output_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();

    for path in files {
        if FileKind::classify(&path, "", text_extensions).is_none() {
            continue;
        }
        let io_err = |source| RewriteError::Io {
            path: path.clone(),
            source,
        };
        let bytes = fs::read(&path).map_err(io_err)?;
        let Ok(content) = String::from_utf8(bytes) else {
            warn!(path = %path.display(), "not valid UTF-8, leaving untouched");
            report.skipped += 1;
            continue;
        };
        let Some(kind) = FileKind::classify(&path, &content, text_extensions) else {
            continue;
        };
        report.files_scanned += 1;

        let rewritten = rewriter.rewrite(kind, &content);
        if rewritten == content {
            continue;
        }
        fs::write(&path, rewritten).map_err(io_err)?;
        debug!(path = %path.display(), ?kind, "rewritten");
        match kind {
            FileKind::Markup => report.markup_changed += 1,
            FileKind::Xml => report.xml_changed += 1,
            FileKind::Text => report.text_changed += 1,
        }
    }

    Ok(report)
}
