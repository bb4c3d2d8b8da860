//! Drives `GitAdapter` against a real throwaway repository, covering the
//! hunk-parsing and checkout-ordering contracts of spec.md §4.B/§4.F.

use std::fs;
use std::process::Command;

use tempfile::TempDir;

use semconflict::vcs::{GitAdapter, VcsAdapter};

fn git(repo: &std::path::Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .status()
        .expect("git must be installed to run this test");
    assert!(status.success(), "git {args:?} failed");
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "-q", "-b", "master"]);
    git(dir.path(), &["config", "user.email", "test@example.com"]);
    git(dir.path(), &["config", "user.name", "Test"]);
    dir
}

#[test]
fn checkout_switches_the_working_tree_before_diffing() {
    let dir = init_repo();
    let repo = dir.path();

    fs::write(repo.join("a.cpp"), "int caller() { return 0; }\n").unwrap();
    git(repo, &["add", "."]);
    git(repo, &["commit", "-q", "-m", "mainline"]);
    git(repo, &["branch", "feature"]);

    git(repo, &["checkout", "-q", "feature"]);
    fs::write(repo.join("a.cpp"), "int caller() { return 1; }\n").unwrap();
    git(repo, &["commit", "-q", "-am", "feature change"]);
    git(repo, &["checkout", "-q", "master"]);

    let adapter = GitAdapter::new(repo, "git");
    adapter.checkout("feature").unwrap();

    let content = fs::read_to_string(repo.join("a.cpp")).unwrap();
    assert!(content.contains("return 1"));
}

#[test]
fn diff_hunks_reports_added_line_ranges_for_recognized_extensions_only() {
    let dir = init_repo();
    let repo = dir.path();

    fs::write(repo.join("a.cpp"), "int caller() {\n    return 0;\n}\n").unwrap();
    fs::write(repo.join("README.md"), "hello\n").unwrap();
    git(repo, &["add", "."]);
    git(repo, &["commit", "-q", "-m", "mainline"]);
    git(repo, &["branch", "feature"]);

    git(repo, &["checkout", "-q", "feature"]);
    fs::write(repo.join("a.cpp"), "int caller() {\n    return 0;\n}\n\nint helper() { return 1; }\n").unwrap();
    fs::write(repo.join("README.md"), "hello\nworld\n").unwrap();
    git(repo, &["commit", "-q", "-am", "feature change"]);

    let adapter = GitAdapter::new(repo, "git");
    let hunks = adapter.diff_hunks("master", "feature").unwrap();

    assert!(hunks.contains_key("a.cpp"));
    assert!(!hunks.contains_key("README.md"));
    assert!(!hunks["a.cpp"].is_empty());
}

#[test]
fn perform_merge_then_abort_restores_mainline() {
    let dir = init_repo();
    let repo = dir.path();

    fs::write(repo.join("a.cpp"), "int caller() { return 0; }\n").unwrap();
    git(repo, &["add", "."]);
    git(repo, &["commit", "-q", "-m", "mainline"]);
    git(repo, &["branch", "feature"]);

    git(repo, &["checkout", "-q", "feature"]);
    fs::write(repo.join("b.cpp"), "int helper() { return 0; }\n").unwrap();
    git(repo, &["add", "."]);
    git(repo, &["commit", "-q", "-m", "feature adds b.cpp"]);
    git(repo, &["checkout", "-q", "master"]);

    let adapter = GitAdapter::new(repo, "git");
    adapter.perform_merge("master", &["feature".to_string()]).unwrap();
    assert!(repo.join("b.cpp").is_file());

    adapter.abort_merge().unwrap();
    assert!(!repo.join("b.cpp").is_file());
}
