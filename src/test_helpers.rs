//! Shared test utilities for the sitefreeze test suite.
//!
//! Output directories are built by hand in a `TempDir`, so every helper here
//! works on a root path plus `/`-separated relative paths.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_file(tmp.path(), "assets/built/screen.css?v=3a", "body{}");
//! sanitize(tmp.path(), "?#").unwrap();
//! assert_eq!(all_files(tmp.path()), vec!["assets/built/screen.css"]);
//! ```

use crate::config::Origins;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// The origin pair used throughout the tests.
pub fn origins() -> Origins {
    Origins::new("http://localhost:2368", "https://blog.example.com").unwrap()
}

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Every file under `root` as a sorted list of `/`-separated relative paths.
pub fn all_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    files.sort();
    files
}
