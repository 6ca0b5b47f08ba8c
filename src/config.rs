//! Run configuration.
//!
//! Handles loading, validating, and merging `sitefreeze.toml`. Configuration is
//! layered: stock defaults are overridden by the user's config file, which is in
//! turn overridden by CLI flags and environment variables.
//!
//! ```text
//! stock defaults  ←  sitefreeze.toml  ←  --flags / SOURCE_URL, DESTINATION_URL, BUILD_ONLY
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! source_url = "http://localhost:2368"      # Site to mirror
//! destination_url = "https://blog.example.com"  # Required, no default
//! output_dir = "static"
//! build_only = false                        # Skip the publish stage
//!
//! [mirror]
//! tool = "builtin"          # or "wget"
//! max_pages = 10000
//!
//! [audit]
//! asset_prefix = "/content/images/"
//!
//! [sanitize]
//! disallowed = "?#"
//!
//! [publish]
//! command = ["npx", "gh-pages", "--dotfiles", "-d", "{output}"]
//! required = true
//! ```
//!
//! Unknown keys are rejected to catch typos early. Run `sitefreeze gen-config`
//! for the complete documented file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Everything one run needs to know, loaded from `sitefreeze.toml`.
///
/// All fields except `destination_url` have defaults. User config files need
/// only specify the values they want to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Origin of the live site to mirror.
    pub source_url: String,
    /// Origin the snapshot will be served from. Required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_url: Option<String>,
    /// Directory the snapshot is built in. Emptied at the start of every run.
    pub output_dir: String,
    /// Stop after writing publish metadata, never run the publish command.
    pub build_only: bool,
    pub mirror: MirrorConfig,
    pub supplementary: SupplementaryConfig,
    pub audit: AuditConfig,
    pub sanitize: SanitizeConfig,
    pub fixup: FixupConfig,
    pub rewrite: RewriteConfig,
    pub cleanup: CleanupConfig,
    pub publish: PublishConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source_url: "http://localhost:2368".to_string(),
            destination_url: None,
            output_dir: "static".to_string(),
            build_only: false,
            mirror: MirrorConfig::default(),
            supplementary: SupplementaryConfig::default(),
            audit: AuditConfig::default(),
            sanitize: SanitizeConfig::default(),
            fixup: FixupConfig::default(),
            rewrite: RewriteConfig::default(),
            cleanup: CleanupConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate values and resolve the origin pair.
    ///
    /// A missing destination is the one configuration error every pipeline
    /// command hits before any stage touches the filesystem.
    pub fn validate(&self) -> Result<Origins, ConfigError> {
        let destination = self.destination_url.as_deref().ok_or_else(|| {
            ConfigError::Validation(
                "destination_url is required (set DESTINATION_URL or --destination-url)".into(),
            )
        })?;
        let origins = Origins::new(&self.source_url, destination)?;
        if self.mirror.max_pages == 0 {
            return Err(ConfigError::Validation(
                "mirror.max_pages must be greater than zero".into(),
            ));
        }
        if self.sanitize.disallowed.is_empty() {
            return Err(ConfigError::Validation(
                "sanitize.disallowed must not be empty".into(),
            ));
        }
        if self.publish.command.is_empty() {
            return Err(ConfigError::Validation(
                "publish.command must not be empty".into(),
            ));
        }
        if !self.audit.asset_prefix.starts_with('/') {
            return Err(ConfigError::Validation(
                "audit.asset_prefix must start with '/'".into(),
            ));
        }
        Ok(origins)
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }
}

/// Which retrieval backend performs the recursive mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorTool {
    /// In-process breadth-first crawl over HTTP.
    Builtin,
    /// Shell out to GNU wget.
    Wget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    pub tool: MirrorTool,
    /// Upper bound on resources fetched by the builtin crawler.
    pub max_pages: usize,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            tool: MirrorTool::Builtin,
            max_pages: 10_000,
            user_agent: concat!("sitefreeze/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// One well-known resource the crawl does not reliably discover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupplementaryResource {
    /// Path on the source origin, e.g. `rss/`.
    pub path: String,
    /// Relative file under the output directory, e.g. `rss/index.html`.
    pub file: String,
    /// The source serves this page with a 404 status; keep its body anyway.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error_page: bool,
}

impl SupplementaryResource {
    fn new(path: &str, file: &str) -> Self {
        Self {
            path: path.to_string(),
            file: file.to_string(),
            error_page: false,
        }
    }

    fn keeping_error_body(path: &str, file: &str) -> Self {
        Self {
            error_page: true,
            ..Self::new(path, file)
        }
    }

    pub fn is_sitemap(&self) -> bool {
        Path::new(&self.file)
            .file_name()
            .map(|n| n.to_string_lossy().starts_with("sitemap"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupplementaryConfig {
    pub resources: Vec<SupplementaryResource>,
}

impl Default for SupplementaryConfig {
    fn default() -> Self {
        Self {
            resources: vec![
                SupplementaryResource::keeping_error_body("404/", "404/index.html"),
                SupplementaryResource::new("rss/", "rss/index.html"),
                SupplementaryResource::new("sitemap.xml", "sitemap.xml"),
                SupplementaryResource::new("sitemap-pages.xml", "sitemap-pages.xml"),
                SupplementaryResource::new("sitemap-posts.xml", "sitemap-posts.xml"),
                SupplementaryResource::new("sitemap-authors.xml", "sitemap-authors.xml"),
                SupplementaryResource::new("sitemap-tags.xml", "sitemap-tags.xml"),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Only image references under this path are audited.
    pub asset_prefix: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            asset_prefix: "/content/images/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SanitizeConfig {
    /// Every character in this string is a filename truncation point.
    pub disallowed: String,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            disallowed: "?#".to_string(),
        }
    }
}

/// A relative `from → to` move under the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileMove {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixupConfig {
    pub moves: Vec<FileMove>,
}

impl Default for FixupConfig {
    fn default() -> Self {
        Self {
            moves: vec![FileMove {
                from: "404/index.html".to_string(),
                to: "404.html".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    /// Asset extensions whose `?v=...` suffixes are stripped from references.
    pub cache_bust_extensions: Vec<String>,
    /// Script elements mentioning any of these strings are removed from pages.
    pub widget_markers: Vec<String>,
    /// Non-markup, non-XML files that still get origin replacement.
    pub text_extensions: Vec<String>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            cache_bust_extensions: [
                "css", "js", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2",
                "ttf",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            widget_markers: vec![
                "portal.min.js".to_string(),
                "sodo-search".to_string(),
                "data-ghost-portal".to_string(),
            ],
            text_extensions: ["css", "js", "json", "txt", "webmanifest"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanupConfig {
    /// CSS selectors whose matches are removed from every page.
    pub selectors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Program and arguments. `{output}` is replaced with the output directory.
    pub command: Vec<String>,
    /// A failing publish command aborts the run when true, warns otherwise.
    pub required: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            command: ["npx", "gh-pages", "--dotfiles", "-d", "{output}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            required: true,
        }
    }
}

// =============================================================================
// Origins
// =============================================================================

/// The validated source/destination pair every rewriting stage works from.
#[derive(Debug, Clone, PartialEq)]
pub struct Origins {
    pub source: Url,
    pub destination: Url,
    source_prefix: String,
    destination_prefix: String,
}

impl Origins {
    pub fn new(source: &str, destination: &str) -> Result<Self, ConfigError> {
        let source_url = parse_http_url("source_url", source)?;
        let destination_url = parse_http_url("destination_url", destination)?;
        let origins = Self {
            source: source_url,
            destination: destination_url,
            source_prefix: source.trim().trim_end_matches('/').to_string(),
            destination_prefix: destination.trim().trim_end_matches('/').to_string(),
        };
        let source_authority = format!("//{}", origins.source_authority());
        if origins.destination_prefix.contains(&origins.source_prefix)
            || origins.destination_prefix.contains(&source_authority)
        {
            return Err(ConfigError::Validation(format!(
                "destination_url '{}' must not contain the source origin '{}'",
                origins.destination_prefix, origins.source_prefix
            )));
        }
        Ok(origins)
    }

    /// Source origin as written in pages, without a trailing slash.
    pub fn source_prefix(&self) -> &str {
        &self.source_prefix
    }

    /// Destination origin as it should appear in rewritten pages.
    pub fn destination_prefix(&self) -> &str {
        &self.destination_prefix
    }

    /// `host[:port]` of the source, as used in protocol-relative references.
    pub fn source_authority(&self) -> String {
        authority(&self.source)
    }

    pub fn destination_authority(&self) -> String {
        authority(&self.destination)
    }
}

fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn parse_http_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::Validation(format!("{key} '{value}' is not a URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::Validation(format!(
            "{key} '{value}' must be an http(s) URL with a host"
        )));
    }
    Ok(url)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Values supplied on the command line or through the environment.
///
/// Applied as the last overlay, so they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source_url: Option<String>,
    pub destination_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub build_only: bool,
}

impl ConfigOverrides {
    fn to_toml(&self) -> toml::Value {
        let mut table = toml::map::Map::new();
        if let Some(ref source) = self.source_url {
            table.insert("source_url".into(), toml::Value::String(source.clone()));
        }
        if let Some(ref destination) = self.destination_url {
            table.insert(
                "destination_url".into(),
                toml::Value::String(destination.clone()),
            );
        }
        if let Some(ref output) = self.output_dir {
            table.insert(
                "output_dir".into(),
                toml::Value::String(output.to_string_lossy().into_owned()),
            );
        }
        // An absent flag must not reset a `build_only = true` from the file.
        if self.build_only {
            table.insert("build_only".into(), toml::Value::Boolean(true));
        }
        toml::Value::Table(table)
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer every overlay is merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, arrays included.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load the config file (if any), then apply CLI/env overrides on top.
///
/// Only the shape is checked here; [`SiteConfig::validate`] checks values.
pub fn load_config(path: &Path, overrides: &ConfigOverrides) -> Result<SiteConfig, ConfigError> {
    let mut merged = stock_defaults_value();
    if let Some(file) = load_raw_config(path)? {
        merged = merge_toml(merged, file);
    }
    merged = merge_toml(merged, overrides.to_toml());
    let config: SiteConfig = merged.try_into()?;
    Ok(config)
}

/// Returns a fully-commented stock `sitefreeze.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sitefreeze configuration
# ========================
# All settings are optional except destination_url, which may instead come
# from the DESTINATION_URL environment variable or --destination-url.
# Values shown below are the defaults. Unknown keys cause an error.

# Live site to mirror (SOURCE_URL / --source-url).
source_url = "http://localhost:2368"

# Where the snapshot will be served from (DESTINATION_URL / --destination-url).
# destination_url = "https://blog.example.com"

# Build directory. Emptied at the start of every run.
output_dir = "static"

# Stop before the publish command runs (BUILD_ONLY / --build-only).
build_only = false

# ---------------------------------------------------------------------------
# Mirror fetch
# ---------------------------------------------------------------------------
[mirror]
# "builtin" crawls in-process; "wget" shells out to GNU wget.
tool = "builtin"

# Upper bound on resources fetched by the builtin crawler.
max_pages = 10000

# user_agent = "sitefreeze/<version>"

# ---------------------------------------------------------------------------
# Resources the crawl does not reliably find on its own
# ---------------------------------------------------------------------------
# error_page = true keeps the body even though the source answers 404.
[[supplementary.resources]]
path = "404/"
file = "404/index.html"
error_page = true

[[supplementary.resources]]
path = "rss/"
file = "rss/index.html"

[[supplementary.resources]]
path = "sitemap.xml"
file = "sitemap.xml"

[[supplementary.resources]]
path = "sitemap-pages.xml"
file = "sitemap-pages.xml"

[[supplementary.resources]]
path = "sitemap-posts.xml"
file = "sitemap-posts.xml"

[[supplementary.resources]]
path = "sitemap-authors.xml"
file = "sitemap-authors.xml"

[[supplementary.resources]]
path = "sitemap-tags.xml"
file = "sitemap-tags.xml"

# ---------------------------------------------------------------------------
# Image audit (responsive sizes the crawl missed)
# ---------------------------------------------------------------------------
[audit]
asset_prefix = "/content/images/"

# ---------------------------------------------------------------------------
# Filename sanitation
# ---------------------------------------------------------------------------
[sanitize]
# Filenames are truncated at the first of these characters.
disallowed = "?#"

# ---------------------------------------------------------------------------
# Files moved to where the static host expects them
# ---------------------------------------------------------------------------
[[fixup.moves]]
from = "404/index.html"
to = "404.html"

# ---------------------------------------------------------------------------
# Content rewrite
# ---------------------------------------------------------------------------
[rewrite]
cache_bust_extensions = ["css", "js", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2", "ttf"]
widget_markers = ["portal.min.js", "sodo-search", "data-ghost-portal"]
text_extensions = ["css", "js", "json", "txt", "webmanifest"]

# ---------------------------------------------------------------------------
# HTML cleanup
# ---------------------------------------------------------------------------
[cleanup]
# CSS selectors removed from every page, e.g.
# selectors = [".gh-head-members", "[data-portal]"]
selectors = []

# ---------------------------------------------------------------------------
# Publish
# ---------------------------------------------------------------------------
[publish]
command = ["npx", "gh-pages", "--dotfiles", "-d", "{output}"]
# When false a failing publish command only logs a warning.
required = true
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_with_destination(dest: &str) -> SiteConfig {
        SiteConfig {
            destination_url: Some(dest.to_string()),
            ..SiteConfig::default()
        }
    }

    #[test]
    fn default_config_points_at_local_ghost() {
        let config = SiteConfig::default();
        assert_eq!(config.source_url, "http://localhost:2368");
        assert_eq!(config.destination_url, None);
        assert_eq!(config.output_dir, "static");
        assert_eq!(config.mirror.tool, MirrorTool::Builtin);
    }

    #[test]
    fn missing_destination_is_validation_error() {
        let err = SiteConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("destination_url"));
    }

    #[test]
    fn validate_returns_origins() {
        let origins = config_with_destination("https://blog.example.com/")
            .validate()
            .unwrap();
        assert_eq!(origins.source_prefix(), "http://localhost:2368");
        assert_eq!(origins.destination_prefix(), "https://blog.example.com");
        assert_eq!(origins.source_authority(), "localhost:2368");
        assert_eq!(origins.destination_authority(), "blog.example.com");
    }

    #[test]
    fn destination_containing_source_is_rejected() {
        let err = Origins::new("http://blog.com", "http://blog.com.mirror.net").unwrap_err();
        assert!(err.to_string().contains("must not contain"));
    }

    #[test]
    fn destination_containing_source_authority_is_rejected() {
        assert!(Origins::new("http://localhost", "https://localhost.example.com").is_err());
    }

    #[test]
    fn non_http_origin_is_rejected() {
        assert!(Origins::new("ftp://localhost", "https://blog.example.com").is_err());
        assert!(Origins::new("not a url", "https://blog.example.com").is_err());
    }

    #[test]
    fn validate_rejects_empty_publish_command() {
        let mut config = config_with_destination("https://blog.example.com");
        config.publish.command.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_max_pages() {
        let mut config = config_with_destination("https://blog.example.com");
        config.mirror.max_pages = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_relative_asset_prefix() {
        let mut config = config_with_destination("https://blog.example.com");
        config.audit.asset_prefix = "content/images/".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn sitemap_resources_are_recognised() {
        let config = SiteConfig::default();
        let sitemaps = config
            .supplementary
            .resources
            .iter()
            .filter(|r| r.is_sitemap())
            .count();
        assert_eq!(sitemaps, 5);
    }

    #[test]
    fn only_the_404_page_keeps_error_bodies_by_default() {
        let config = SiteConfig::default();
        let error_pages: Vec<&str> = config
            .supplementary
            .resources
            .iter()
            .filter(|r| r.error_page)
            .map(|r| r.path.as_str())
            .collect();
        assert_eq!(error_pages, vec!["404/"]);
    }

    #[test]
    fn error_page_flag_defaults_to_false() {
        let config: SupplementaryConfig = toml::from_str(
            r#"
[[resources]]
path = "rss/"
file = "rss/index.html"
"#,
        )
        .unwrap();
        assert!(!config.resources[0].error_page);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_without_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(
            &tmp.path().join("sitefreeze.toml"),
            &ConfigOverrides::default(),
        )
        .unwrap();
        assert_eq!(config.source_url, "http://localhost:2368");
        assert_eq!(config.fixup.moves.len(), 1);
    }

    #[test]
    fn load_config_reads_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sitefreeze.toml");
        fs::write(
            &path,
            r#"
destination_url = "https://blog.example.com"

[cleanup]
selectors = [".gh-head-members"]
"#,
        )
        .unwrap();

        let config = load_config(&path, &ConfigOverrides::default()).unwrap();
        assert_eq!(
            config.destination_url.as_deref(),
            Some("https://blog.example.com")
        );
        assert_eq!(config.cleanup.selectors, vec![".gh-head-members"]);
        // Untouched sections keep their defaults
        assert_eq!(config.audit.asset_prefix, "/content/images/");
    }

    #[test]
    fn overrides_win_over_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sitefreeze.toml");
        fs::write(
            &path,
            r#"
destination_url = "https://old.example.com"
build_only = true
"#,
        )
        .unwrap();

        let overrides = ConfigOverrides {
            destination_url: Some("https://new.example.com".into()),
            output_dir: Some(PathBuf::from("public")),
            ..ConfigOverrides::default()
        };
        let config = load_config(&path, &overrides).unwrap();
        assert_eq!(
            config.destination_url.as_deref(),
            Some("https://new.example.com")
        );
        assert_eq!(config.output_dir, "public");
        // Flag not given on the command line: file value survives
        assert!(config.build_only);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sitefreeze.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        let result = load_config(&path, &ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("[mirror]\nmax_pagez = 3\n");
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }

    #[test]
    fn mirror_tool_parses_lowercase() {
        let config: SiteConfig = toml::from_str("[mirror]\ntool = \"wget\"\n").unwrap();
        assert_eq!(config.mirror.tool, MirrorTool::Wget);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[publish]\nrequired = true\ncommand = [\"a\"]\n")
            .unwrap();
        let overlay: toml::Value = toml::from_str("[publish]\nrequired = false\n").unwrap();
        let merged = merge_toml(base, overlay);
        let publish = merged.get("publish").unwrap();
        assert_eq!(publish.get("required").unwrap().as_bool(), Some(false));
        assert_eq!(publish.get("command").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("selectors = [\"a\", \"b\"]").unwrap();
        let overlay: toml::Value = toml::from_str("selectors = [\"c\"]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("selectors").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(config.source_url, defaults.source_url);
        assert_eq!(config.output_dir, defaults.output_dir);
        assert_eq!(config.supplementary.resources, defaults.supplementary.resources);
        assert_eq!(config.fixup.moves, defaults.fixup.moves);
        assert_eq!(
            config.rewrite.cache_bust_extensions,
            defaults.rewrite.cache_bust_extensions
        );
        assert_eq!(config.rewrite.widget_markers, defaults.rewrite.widget_markers);
        assert_eq!(config.sanitize.disallowed, defaults.sanitize.disallowed);
        assert_eq!(config.publish.command, defaults.publish.command);
        assert!(config.cleanup.selectors.is_empty());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        for section in [
            "mirror",
            "supplementary",
            "audit",
            "sanitize",
            "fixup",
            "rewrite",
            "cleanup",
            "publish",
        ] {
            assert!(val.get(section).is_some(), "missing section {section}");
        }
        assert!(val.get("destination_url").is_none());
    }
}
