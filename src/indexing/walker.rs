//! File discovery for the source indexer (4.D).
//!
//! Built on the `ignore` crate's `WalkBuilder` for parallel-friendly,
//! symlink-safe directory traversal — but, unlike the teacher's walker,
//! deliberately *not* gitignore-aware: the indexer must see every
//! recognized-extension file regardless of `.gitignore`, since a file a
//! branch's diff touches but the mainline's `.gitignore` hides would
//! otherwise silently drop out of the call graph.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::vcs::has_recognized_extension;

/// Repo-relative, POSIX-separated paths of every recognized-extension
/// file under `root`, sorted ascending. Sorting (rather than walk order)
/// is what makes ID assignment in 4.E reproducible across runs and
/// platforms.
pub fn discover_files(root: &Path) -> Vec<String> {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .require_git(false);

    let mut paths: Vec<String> = builder
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter_map(|entry| {
            let path = entry.path();
            if !has_recognized_extension(path) {
                return None;
            }
            to_repo_relative_posix(root, path)
        })
        .collect();

    paths.sort_unstable();
    paths.dedup();
    paths
}

fn to_repo_relative_posix(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let posix: Vec<&str> = relative.iter().map(|c| c.to_str()).collect::<Option<_>>()?;
    Some(posix.join("/"))
}

pub fn absolute_path(root: &Path, repo_relative: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in repo_relative.split('/') {
        path.push(segment);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn discovers_only_recognized_extensions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.cpp"), "").unwrap();
        fs::write(dir.path().join("b.h"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();

        let files = discover_files(dir.path());
        assert_eq!(files, vec!["a.cpp".to_string(), "b.h".to_string()]);
    }

    #[test]
    fn sees_gitignored_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".gitignore"), "ignored.cpp\n").unwrap();
        fs::write(dir.path().join("ignored.cpp"), "").unwrap();

        let files = discover_files(dir.path());
        assert!(files.contains(&"ignored.cpp".to_string()));
    }

    #[test]
    fn walks_nested_directories_with_posix_separators() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("src/nested/unit.cpp"), "").unwrap();

        let files = discover_files(dir.path());
        assert_eq!(files, vec!["src/nested/unit.cpp".to_string()]);
    }

    #[test]
    fn round_trips_with_absolute_path() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.cpp"), "").unwrap();

        let files = discover_files(dir.path());
        let abs = absolute_path(dir.path(), &files[0]);
        assert!(abs.is_file());
    }
}
