//! Stage 5: filename sanitation.
//!
//! Static hosts do not interpret query strings, so a file saved as
//! `screen.css?v=3a` can never be served. Every filename containing a
//! disallowed character is truncated at the first such character. When the
//! clean name is already taken the dirty copy is deleted, which makes this
//! stage destructive: it must run after every fetch stage.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SanitizeError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub files_scanned: usize,
    pub renamed: usize,
    pub duplicates_removed: usize,
}

/// The part of `name` before the first disallowed character.
///
/// Returns `None` when `name` is already clean.
pub fn clean_name<'a>(name: &'a str, disallowed: &str) -> Option<&'a str> {
    name.find(|c: char| disallowed.contains(c))
        .map(|idx| &name[..idx])
}

pub fn sanitize(output_dir: &Path, disallowed: &str) -> Result<SanitizeReport, SanitizeError> {
    let mut report = SanitizeReport::default();

    let mut files: Vec<PathBuf> = WalkDir::new(output_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    // Sorted so "first seen" is stable: `a.css` sorts before `a.css?v=1`
    files.sort();
    report.files_scanned = files.len();

    let mut claimed: HashSet<PathBuf> = HashSet::new();
    for path in files {
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => continue,
        };
        let Some(clean) = clean_name(&name, disallowed) else {
            continue;
        };

        if clean.is_empty() {
            warn!(path = %path.display(), "filename is entirely query string, removing");
            remove(&path)?;
            report.duplicates_removed += 1;
            continue;
        }

        let target = path.with_file_name(clean);
        if target.exists() || claimed.contains(&target) {
            debug!(path = %path.display(), "clean name already taken, removing duplicate");
            remove(&path)?;
            report.duplicates_removed += 1;
        } else {
            debug!(from = %path.display(), to = %target.display(), "renaming");
            fs::rename(&path, &target).map_err(|source| SanitizeError::Io {
                path: path.clone(),
                source,
            })?;
            claimed.insert(target);
            report.renamed += 1;
        }
    }

    Ok(report)
}

fn remove(path: &Path) -> Result<(), SanitizeError> {
    fs::remove_file(path).map_err(|source| SanitizeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{all_files, write_file};
    use tempfile::TempDir;

    #[test]
    fn clean_name_truncates_at_first_disallowed() {
        assert_eq!(clean_name("screen.css?v=3a", "?#"), Some("screen.css"));
        assert_eq!(clean_name("a.js#x?y", "?#"), Some("a.js"));
        assert_eq!(clean_name("index.html", "?#"), None);
        assert_eq!(clean_name("?v=1", "?#"), Some(""));
    }

    #[test]
    fn renames_dirty_files() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "assets/built/screen.css?v=3a", "css");
        write_file(tmp.path(), "index.html", "<html>");

        let report = sanitize(tmp.path(), "?#").unwrap();

        assert_eq!(report.renamed, 1);
        assert_eq!(
            fs::read_to_string(tmp.path().join("assets/built/screen.css")).unwrap(),
            "css"
        );
        assert!(!tmp.path().join("assets/built/screen.css?v=3a").exists());
    }

    #[test]
    fn existing_clean_file_wins_over_dirty_duplicate() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "a.png", "original");
        write_file(tmp.path(), "a.png?v=2", "duplicate");

        let report = sanitize(tmp.path(), "?#").unwrap();

        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.renamed, 0);
        assert_eq!(fs::read_to_string(tmp.path().join("a.png")).unwrap(), "original");
    }

    #[test]
    fn first_dirty_file_survives_collision() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "index.html?page=2", "two");
        write_file(tmp.path(), "index.html?page=3", "three");

        let report = sanitize(tmp.path(), "?#").unwrap();

        assert_eq!(report.renamed, 1);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(fs::read_to_string(tmp.path().join("index.html")).unwrap(), "two");
    }

    #[test]
    fn no_disallowed_character_remains() {
        let tmp = TempDir::new().unwrap();
        for name in [
            "a.css?v=1",
            "b/c.js?ver=2&x=3",
            "b/d.woff2#iefix",
            "e/f.png",
            "g?only",
        ] {
            write_file(tmp.path(), name, name);
        }

        sanitize(tmp.path(), "?#").unwrap();

        let files = all_files(tmp.path());
        assert!(!files.is_empty());
        for file in &files {
            assert!(!file.contains('?') && !file.contains('#'), "dirty name left: {file}");
        }
        assert!(files.contains(&"b/c.js".to_string()));
        assert!(files.contains(&"b/d.woff2".to_string()));
        assert!(files.contains(&"g".to_string()));
    }

    #[test]
    fn entirely_query_filename_is_removed() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "dir/?v=1", "x");
        let report = sanitize(tmp.path(), "?").unwrap();
        assert_eq!(report.duplicates_removed, 1);
        assert!(all_files(tmp.path()).is_empty());
    }
}
