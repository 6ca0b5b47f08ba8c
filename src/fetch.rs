//! Network transport seam.
//!
//! Every stage that talks to the source site goes through the [`Fetcher`]
//! trait, so the rest of the crate never sees an HTTP error type. A fetch
//! either produced a resource, proved the resource does not exist, or failed
//! for some other reason; callers decide which of those are worth a warning.
//!
//! The production implementation is [`HttpFetcher`], a blocking `reqwest`
//! client. Tests use an in-memory fetcher that records every URL requested.

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::fs;
use std::io;
use std::path::{Component, Path};
use url::Url;

/// A retrieved resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl Resource {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false)
    }

    pub fn is_css(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().starts_with("text/css"))
            .unwrap_or(false)
    }
}

/// Outcome of a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(Resource),
    /// The server answered 404 or 410. A non-empty error body is kept:
    /// custom error pages are served with exactly this status.
    NotFound(Option<Resource>),
    /// Any other failure: connection errors, timeouts, 5xx, unreadable body.
    TransportError(String),
}

pub trait Fetcher {
    fn fetch(&self, url: &Url) -> FetchOutcome;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn fetch(&self, url: &Url) -> FetchOutcome {
        (**self).fetch(url)
    }
}

/// Blocking HTTP fetcher. Uses the transport's default timeout and follows
/// redirects.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> FetchOutcome {
        let response = match self.client.get(url.clone()).send() {
            Ok(r) => r,
            Err(e) => return FetchOutcome::TransportError(e.to_string()),
        };
        let status = response.status();
        let missing = status == StatusCode::NOT_FOUND || status == StatusCode::GONE;
        if !missing && !status.is_success() {
            return FetchOutcome::TransportError(format!("HTTP {status}"));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = match response.bytes() {
            Ok(body) => body.to_vec(),
            // An unreadable error body is still a definite miss
            Err(_) if missing => return FetchOutcome::NotFound(None),
            Err(e) => return FetchOutcome::TransportError(e.to_string()),
        };
        let resource = Resource { body, content_type };
        if !missing {
            FetchOutcome::Found(resource)
        } else if resource.body.is_empty() {
            FetchOutcome::NotFound(None)
        } else {
            FetchOutcome::NotFound(Some(resource))
        }
    }
}

/// True when `rel_path` names something strictly inside its root: only
/// plain components, no `..`, no drive or root prefix.
pub fn stays_inside(rel_path: &str) -> bool {
    let rel = Path::new(rel_path.trim_start_matches('/'));
    rel.components().next().is_some()
        && rel.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Write `body` to `root/rel_path`, creating intermediate directories.
///
/// Paths come from percent-decoded URLs, so anything that would resolve
/// outside `root` is refused.
pub fn write_resource(root: &Path, rel_path: &str, body: &[u8]) -> io::Result<()> {
    if !stays_inside(rel_path) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to write outside the output directory: {rel_path}"),
        ));
    }
    let path = root.join(rel_path.trim_start_matches('/'));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)
}
