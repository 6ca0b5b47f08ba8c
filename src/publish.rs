//! Stages 9 and 10: publish metadata and publish.
//!
//! Static hosts of the GitHub Pages family read two marker files from the
//! root of the published tree:
//!
//! - `CNAME`: the bare domain the site is served on;
//! - `.nojekyll`: empty, turns off the host's own preprocessing (which would
//!   otherwise hide underscore-prefixed paths).
//!
//! Publishing itself is an external command run against the output
//! directory, `npx gh-pages --dotfiles -d static` by default.

use crate::config::{Origins, PublishConfig};
use std::fs;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Publish command could not be started ({program}): {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Publish command failed with {0}")]
    Failed(std::process::ExitStatus),
    #[error("Publish command is empty")]
    NoCommand,
}

pub const DOMAIN_FILE: &str = "CNAME";
pub const NO_PREPROCESS_MARKER: &str = ".nojekyll";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataReport {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishReport {
    Published,
    /// The command failed but publishing was not required.
    FailedSoft(String),
}

/// The destination origin without its scheme: `https://blog.example.com` →
/// `blog.example.com`.
pub fn domain_of(origins: &Origins) -> String {
    origins
        .destination
        .host_str()
        .unwrap_or_default()
        .to_string()
}

pub fn write_metadata(output_dir: &Path, origins: &Origins) -> Result<MetadataReport, PublishError> {
    let domain = domain_of(origins);
    fs::create_dir_all(output_dir)?;
    fs::write(output_dir.join(DOMAIN_FILE), format!("{domain}\n"))?;
    fs::write(output_dir.join(NO_PREPROCESS_MARKER), "")?;
    Ok(MetadataReport { domain })
}

/// Substitute `{output}` in every argument.
pub fn expand_command(command: &[String], output_dir: &Path) -> Vec<String> {
    let output = output_dir.to_string_lossy();
    command
        .iter()
        .map(|arg| arg.replace("{output}", &output))
        .collect()
}

pub fn publish(output_dir: &Path, config: &PublishConfig) -> Result<PublishReport, PublishError> {
    match run_command(output_dir, &config.command) {
        Ok(()) => Ok(PublishReport::Published),
        Err(e) if !config.required => {
            warn!(error = %e, "publish failed, continuing because publishing is optional");
            Ok(PublishReport::FailedSoft(e.to_string()))
        }
        Err(e) => Err(e),
    }
}

fn run_command(output_dir: &Path, command: &[String]) -> Result<(), PublishError> {
    let argv = expand_command(command, output_dir);
    let (program, args) = argv.split_first().ok_or(PublishError::NoCommand)?;
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|source| PublishError::Spawn {
            program: program.clone(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(PublishError::Failed(status))
    }
}
