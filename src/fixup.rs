//! Stage 6: structural fixup.
//!
//! Relocates files that the mirroring convention puts somewhere other than
//! where the static host looks for them. The canonical case is the error
//! page: mirrored as `404/index.html`, served by the host only as `404.html`.

use crate::config::FileMove;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FixupError {
    #[error("IO error moving {from} to {to}: {source}")]
    Move {
        from: String,
        to: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixupReport {
    pub applied: Vec<FileMove>,
    pub skipped: usize,
}

pub fn apply_moves(output_dir: &Path, moves: &[FileMove]) -> Result<FixupReport, FixupError> {
    let mut report = FixupReport::default();

    for mv in moves {
        let from = output_dir.join(mv.from.trim_start_matches('/'));
        let to = output_dir.join(mv.to.trim_start_matches('/'));
        if !from.is_file() {
            debug!(from = %mv.from, "source missing, skipping move");
            report.skipped += 1;
            continue;
        }

        let io_err = |source| FixupError::Move {
            from: mv.from.clone(),
            to: mv.to.clone(),
            source,
        };

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        if to.is_file() {
            fs::remove_file(&to).map_err(io_err)?;
        }
        fs::rename(&from, &to).map_err(io_err)?;

        // Only prune when the move left its directory, and only if now empty
        let from_parent = from.parent();
        if from_parent != to.parent() {
            if let Some(dir) = from_parent.filter(|d| *d != output_dir) {
                let empty = fs::read_dir(dir)
                    .map(|mut entries| entries.next().is_none())
                    .unwrap_or(false);
                if empty {
                    fs::remove_dir(dir).map_err(io_err)?;
                }
            }
        }
        report.applied.push(mv.clone());
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixupConfig;
    use crate::test_helpers::write_file;
    use tempfile::TempDir;

    #[test]
    fn error_page_becomes_sibling_file() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "404/index.html", "<h1>Lost</h1>");

        let report = apply_moves(tmp.path(), &FixupConfig::default().moves).unwrap();

        assert_eq!(report.applied.len(), 1);
        assert_eq!(
            fs::read_to_string(tmp.path().join("404.html")).unwrap(),
            "<h1>Lost</h1>"
        );
        assert!(!tmp.path().join("404").exists());
    }

    #[test]
    fn overwrites_existing_destination() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "404/index.html", "new");
        write_file(tmp.path(), "404.html", "old");

        apply_moves(tmp.path(), &FixupConfig::default().moves).unwrap();

        assert_eq!(fs::read_to_string(tmp.path().join("404.html")).unwrap(), "new");
    }

    #[test]
    fn keeps_non_empty_source_directory() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "404/index.html", "x");
        write_file(tmp.path(), "404/extra.css", "y");

        apply_moves(tmp.path(), &FixupConfig::default().moves).unwrap();

        assert!(tmp.path().join("404/extra.css").exists());
    }

    #[test]
    fn missing_source_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let report = apply_moves(tmp.path(), &FixupConfig::default().moves).unwrap();
        assert_eq!(report.skipped, 1);
        assert!(!tmp.path().join("404.html").exists());
    }

    #[test]
    fn same_directory_move_keeps_directory() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "feeds/rss.html", "<rss/>");
        let moves = vec![FileMove {
            from: "feeds/rss.html".into(),
            to: "feeds/index.xml".into(),
        }];

        apply_moves(tmp.path(), &moves).unwrap();

        assert!(tmp.path().join("feeds/index.xml").exists());
        assert!(tmp.path().join("feeds").is_dir());
    }
}
