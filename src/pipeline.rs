//! Stage driver.
//!
//! Runs a list of stages strictly in order against one output directory,
//! reporting progress through a callback and halting on the first fatal
//! error. Soft failures never reach this level: each stage absorbs them into
//! its own report.
//!
//! ```text
//!  1 reset → 2 mirror → 3 supplementary → 4 audit → 5 sanitize
//!  → 6 fixup → 7 rewrite → 8 cleanup → 9 publish metadata → 10 publish
//! ```
//!
//! Subcommands map onto contiguous presets of this sequence; see
//! [`Stage::FETCH`] and friends.

use crate::audit::{self, AuditReport};
use crate::cleanup::{self, CleanupError, CleanupReport};
use crate::config::{ConfigError, Origins, SiteConfig};
use crate::fetch::Fetcher;
use crate::fixup::{self, FixupError, FixupReport};
use crate::mirror::{self, MirrorReport};
use crate::publish::{self, MetadataReport, PublishError, PublishReport};
use crate::rewrite::{self, RewriteError, RewriteReport, Rewriter};
use crate::sanitize::{self, SanitizeError, SanitizeReport};
use crate::supplementary::{self, SupplementaryReport};
use crate::workspace::{self, ResetReport, WorkspaceError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Workspace reset failed: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("Filename sanitation failed: {0}")]
    Sanitize(#[from] SanitizeError),
    #[error("Structural fixup failed: {0}")]
    Fixup(#[from] FixupError),
    #[error("Content rewrite failed: {0}")]
    Rewrite(#[from] RewriteError),
    #[error("HTML cleanup failed: {0}")]
    Cleanup(#[from] CleanupError),
    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Reset,
    Mirror,
    Supplementary,
    Audit,
    Sanitize,
    Fixup,
    Rewrite,
    Cleanup,
    PublishMetadata,
    Publish,
}

impl Stage {
    pub const ALL: [Stage; 10] = [
        Stage::Reset,
        Stage::Mirror,
        Stage::Supplementary,
        Stage::Audit,
        Stage::Sanitize,
        Stage::Fixup,
        Stage::Rewrite,
        Stage::Cleanup,
        Stage::PublishMetadata,
        Stage::Publish,
    ];

    /// Retrieve the site into a fresh output directory.
    pub const FETCH: &'static [Stage] = &[
        Stage::Reset,
        Stage::Mirror,
        Stage::Supplementary,
        Stage::Audit,
    ];

    /// Make an already-fetched directory servable.
    pub const CLEAN: &'static [Stage] = &[
        Stage::Sanitize,
        Stage::Fixup,
        Stage::Rewrite,
        Stage::Cleanup,
    ];

    /// Everything except the publish command.
    pub const BUILD: &'static [Stage] = &[
        Stage::Reset,
        Stage::Mirror,
        Stage::Supplementary,
        Stage::Audit,
        Stage::Sanitize,
        Stage::Fixup,
        Stage::Rewrite,
        Stage::Cleanup,
        Stage::PublishMetadata,
    ];

    pub const DEPLOY: &'static [Stage] = &Stage::ALL;

    /// Publish an already-built directory.
    pub const PUBLISH: &'static [Stage] = &[Stage::PublishMetadata, Stage::Publish];

    /// 1-based position in the full sequence.
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Reset => "Resetting workspace",
            Stage::Mirror => "Mirroring site",
            Stage::Supplementary => "Fetching supplementary resources",
            Stage::Audit => "Auditing images",
            Stage::Sanitize => "Sanitizing filenames",
            Stage::Fixup => "Fixing structure",
            Stage::Rewrite => "Rewriting content",
            Stage::Cleanup => "Cleaning up HTML",
            Stage::PublishMetadata => "Writing publish metadata",
            Stage::Publish => "Publishing",
        }
    }
}

/// What one stage did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageReport {
    Reset(ResetReport),
    Mirror(MirrorReport),
    Supplementary(SupplementaryReport),
    Audit(AuditReport),
    Sanitize(SanitizeReport),
    Fixup(FixupReport),
    Rewrite(RewriteReport),
    Cleanup(CleanupReport),
    PublishMetadata(MetadataReport),
    Publish(PublishReport),
}

impl StageReport {
    pub fn stage(&self) -> Stage {
        match self {
            StageReport::Reset(_) => Stage::Reset,
            StageReport::Mirror(_) => Stage::Mirror,
            StageReport::Supplementary(_) => Stage::Supplementary,
            StageReport::Audit(_) => Stage::Audit,
            StageReport::Sanitize(_) => Stage::Sanitize,
            StageReport::Fixup(_) => Stage::Fixup,
            StageReport::Rewrite(_) => Stage::Rewrite,
            StageReport::Cleanup(_) => Stage::Cleanup,
            StageReport::PublishMetadata(_) => Stage::PublishMetadata,
            StageReport::Publish(_) => Stage::Publish,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Started(Stage),
    Finished(StageReport),
    /// The stage was requested but not run (publish in build-only mode).
    Skipped(Stage),
}

pub struct Pipeline<F: Fetcher> {
    config: SiteConfig,
    origins: Origins,
    rewriter: Rewriter,
    fetcher: F,
}

impl<F: Fetcher> Pipeline<F> {
    /// Validate `config` up front, so a bad destination is fatal before any
    /// stage touches the output directory.
    pub fn new(config: SiteConfig, fetcher: F) -> Result<Self, PipelineError> {
        let origins = config.validate()?;
        let rewriter = Rewriter::new(&origins, &config.rewrite)?;
        Ok(Self {
            config,
            origins,
            rewriter,
            fetcher,
        })
    }

    pub fn origins(&self) -> &Origins {
        &self.origins
    }

    pub fn output_dir(&self) -> PathBuf {
        self.config.output_path()
    }

    /// Run `stages` in the order given.
    pub fn run(
        &self,
        stages: &[Stage],
        mut on_event: impl FnMut(&PipelineEvent),
    ) -> Result<Vec<StageReport>, PipelineError> {
        let output_dir = self.output_dir();
        let mut reports = Vec::with_capacity(stages.len());

        for &stage in stages {
            if stage == Stage::Publish && self.config.build_only {
                info!("build-only mode, not publishing");
                on_event(&PipelineEvent::Skipped(stage));
                continue;
            }
            on_event(&PipelineEvent::Started(stage));
            let report = self.run_stage(stage, &output_dir)?;
            on_event(&PipelineEvent::Finished(report.clone()));
            reports.push(report);
        }

        Ok(reports)
    }

    fn run_stage(&self, stage: Stage, output_dir: &Path) -> Result<StageReport, PipelineError> {
        let config = &self.config;
        let report = match stage {
            Stage::Reset => StageReport::Reset(workspace::reset(output_dir)?),
            Stage::Mirror => StageReport::Mirror(mirror::mirror(
                config.mirror.tool,
                &self.fetcher,
                &self.origins,
                output_dir,
                config.mirror.max_pages,
            )),
            Stage::Supplementary => StageReport::Supplementary(supplementary::fetch_supplementary(
                &self.fetcher,
                &self.origins,
                output_dir,
                &config.supplementary.resources,
            )),
            Stage::Audit => StageReport::Audit(audit::audit(
                &self.fetcher,
                &self.origins,
                output_dir,
                &config.audit.asset_prefix,
            )),
            Stage::Sanitize => {
                StageReport::Sanitize(sanitize::sanitize(output_dir, &config.sanitize.disallowed)?)
            }
            Stage::Fixup => StageReport::Fixup(fixup::apply_moves(output_dir, &config.fixup.moves)?),
            Stage::Rewrite => StageReport::Rewrite(rewrite::rewrite_dir(
                output_dir,
                &self.rewriter,
                &config.rewrite.text_extensions,
            )?),
            Stage::Cleanup => {
                StageReport::Cleanup(cleanup::cleanup_dir(output_dir, &config.cleanup.selectors)?)
            }
            Stage::PublishMetadata => {
                StageReport::PublishMetadata(publish::write_metadata(output_dir, &self.origins)?)
            }
            Stage::Publish => StageReport::Publish(publish::publish(output_dir, &config.publish)?),
        };
        Ok(report)
    }
}
