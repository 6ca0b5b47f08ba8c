//! CLI output formatting for all pipeline stages.
//!
//! Logs (`tracing`) are for diagnosing single files and requests; this module
//! prints the operator summary: one header per stage, followed by that
//! stage's counters as indented context lines.
//!
//! # Output Format
//!
//! ```text
//! ==> Stage 1: Resetting workspace
//!     Removed 12 entries
//! ==> Stage 2: Mirroring site
//!     Saved 148 files (41 pages) with builtin
//!     Not found: 3
//! ==> Stage 3: Fetching supplementary resources
//!     Found 5 of 7 (3 sitemaps)
//! ==> Stage 4: Auditing images
//!     41 pages, 212 images referenced
//!     209 present, 2 downloaded, 1 failed
//! ...
//! ==> Stage 9: Writing publish metadata
//!     CNAME: blog.example.com
//! ==> Stage 10: Publishing (skipped: build only)
//! ```
//!
//! Counters that are zero and carry no information (no failures, nothing
//! skipped) are omitted.
//!
//! # Architecture
//!
//! Each event has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::MirrorTool;
use crate::pipeline::{PipelineEvent, Stage, StageReport};
use crate::publish::PublishReport;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 page`, `2 pages`.
fn plural(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

pub fn format_stage_header(stage: Stage) -> String {
    format!("==> Stage {}: {}", stage.number(), stage.label())
}

pub fn format_pipeline_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::Started(stage) => vec![format_stage_header(*stage)],
        PipelineEvent::Finished(report) => format_stage_report(report),
        PipelineEvent::Skipped(stage) => {
            vec![format!("{} (skipped: build only)", format_stage_header(*stage))]
        }
    }
}

/// Counter lines for one finished stage, already indented.
pub fn format_stage_report(report: &StageReport) -> Vec<String> {
    let ctx = indent(1);
    let mut lines = Vec::new();

    match report {
        StageReport::Reset(r) if r.created => lines.push(format!("{ctx}Created output directory")),
        StageReport::Reset(r) => {
            lines.push(format!("{ctx}Removed {}", plural(r.entries_removed, "entry", "entries")))
        }
        StageReport::Mirror(r) => {
            // wget does not tell pages from assets
            lines.push(match r.tool {
                MirrorTool::Builtin => format!(
                    "{ctx}Saved {} ({}) with builtin",
                    plural(r.saved, "file", "files"),
                    plural(r.pages, "page", "pages")
                ),
                MirrorTool::Wget => format!("{ctx}Saved {} with wget", plural(r.saved, "file", "files")),
            });
            if r.not_found > 0 {
                lines.push(format!("{ctx}Not found: {}", r.not_found));
            }
            if r.failed > 0 {
                lines.push(format!("{ctx}Failed: {}", r.failed));
            }
            if r.truncated {
                lines.push(format!("{ctx}Stopped at page cap"));
            }
            if let Some(code) = r.exit_code.filter(|c| *c != 0) {
                lines.push(format!("{ctx}Exit status: {code}"));
            }
        }
        StageReport::Supplementary(r) => lines.push(format!(
            "{ctx}Found {} of {} ({})",
            r.found,
            r.attempted,
            plural(r.sitemaps_found, "sitemap", "sitemaps")
        )),
        StageReport::Audit(r) => {
            lines.push(format!(
                "{ctx}{}, {} referenced",
                plural(r.pages_scanned, "page", "pages"),
                plural(r.candidates, "image", "images")
            ));
            let mut detail = format!("{ctx}{} present, {} downloaded", r.already_present, r.downloaded);
            if r.failed > 0 {
                detail.push_str(&format!(", {} failed", r.failed));
            }
            lines.push(detail);
        }
        StageReport::Sanitize(r) => lines.push(format!(
            "{ctx}{} scanned, {} renamed, {} removed",
            plural(r.files_scanned, "file", "files"),
            r.renamed,
            plural(r.duplicates_removed, "duplicate", "duplicates")
        )),
        StageReport::Fixup(r) => {
            for mv in &r.applied {
                lines.push(format!("{ctx}{} → {}", mv.from, mv.to));
            }
            if r.skipped > 0 {
                lines.push(format!("{ctx}Skipped {} (source missing)", plural(r.skipped, "move", "moves")));
            }
        }
        StageReport::Rewrite(r) => {
            lines.push(format!(
                "{ctx}{} scanned, {} changed",
                plural(r.files_scanned, "file", "files"),
                r.changed()
            ));
            if r.changed() > 0 {
                lines.push(format!(
                    "{}markup: {}, xml: {}, text: {}",
                    indent(2),
                    r.markup_changed,
                    r.xml_changed,
                    r.text_changed
                ));
            }
            if r.skipped > 0 {
                lines.push(format!("{ctx}Skipped {} (not UTF-8)", plural(r.skipped, "file", "files")));
            }
        }
        StageReport::Cleanup(r) => {
            lines.push(format!(
                "{ctx}{} scanned, {} changed, {} removed",
                plural(r.pages_scanned, "page", "pages"),
                r.pages_changed,
                plural(r.elements_removed, "element", "elements")
            ));
            for selector in &r.invalid_selectors {
                lines.push(format!("{ctx}Invalid selector: {selector}"));
            }
        }
        StageReport::PublishMetadata(r) => lines.push(format!("{ctx}CNAME: {}", r.domain)),
        StageReport::Publish(PublishReport::Published) => lines.push(format!("{ctx}Published")),
        StageReport::Publish(PublishReport::FailedSoft(reason)) => {
            lines.push(format!("{ctx}Not published: {reason}"))
        }
    }

    lines
}

pub fn format_completion(command: &str, output_dir: &Path) -> String {
    format!("==> {command} complete: {}", output_dir.display())
}

pub fn print_pipeline_event(event: &PipelineEvent) {
    for line in format_pipeline_event(event) {
        println!("{line}");
    }
}

pub fn print_completion(command: &str, output_dir: &Path) {
    println!("{}", format_completion(command, output_dir));
}
