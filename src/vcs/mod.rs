//! VCS adapter (4.B): a thin wrapper over `git`, invoked as a subprocess the
//! way `jj`'s `lib/src/git_subprocess.rs` wraps its own `git` child
//! processes — one `command()` constructor fixing the repository, argv
//! logged at `debug` before spawning, stderr captured for the error
//! message.
//!
//! File extensions recognized across the whole crate (4.B/4.D/4.F).

use crate::error::{VcsError, VcsResult};
use crate::types::LineRange;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::LazyLock;

pub const RECOGNIZED_EXTENSIONS: &[&str] = &[
    "C", "H", "c", "h", "cpp", "hpp", "cxx", "hxx", "c++", "h++", "cc", "hh", "inl", "inc",
];

pub fn has_recognized_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| RECOGNIZED_EXTENSIONS.contains(&ext))
}

/// Seam for the conflict detector's VCS needs, so unit tests can substitute
/// a fixture over in-memory state without spawning real `git` processes.
/// `GitAdapter` is the only production implementation.
pub trait VcsAdapter {
    fn checkout(&self, rev: &str) -> VcsResult<()>;

    /// Check out `mainline`, then merge every branch head without commit
    /// and without fast-forward, producing an in-tree union of all
    /// branches' changes.
    fn perform_merge(&self, mainline: &str, heads: &[String]) -> VcsResult<()>;

    fn abort_merge(&self) -> VcsResult<()>;

    /// Repo-relative, recognized-extension paths touched since `rev`.
    fn changed_files_since(&self, rev: &str) -> VcsResult<Vec<String>>;

    fn diff_name_only(&self, a: &str, b: &str) -> VcsResult<Vec<String>>;

    /// Added/modified line ranges per path for the three-dot diff
    /// `a...b` (branch-since-merge-base semantics).
    fn diff_hunks(&self, a: &str, b: &str) -> VcsResult<HashMap<String, Vec<LineRange>>>;
}

pub struct GitAdapter {
    repo: PathBuf,
    git_bin: String,
}

impl GitAdapter {
    pub fn new(repo: impl Into<PathBuf>, git_bin: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            git_bin: git_bin.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.git_bin);
        cmd.arg("-C").arg(&self.repo).args(args);
        cmd
    }

    fn run(&self, subcommand: &str, args: &[&str]) -> VcsResult<Output> {
        let mut full_args = vec![subcommand];
        full_args.extend_from_slice(args);
        tracing::debug!(git_bin = %self.git_bin, repo = %self.repo.display(), args = ?full_args, "spawning git");

        let output = self
            .command(&full_args)
            .output()
            .map_err(|source| VcsError::Spawn {
                program: self.git_bin.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(VcsError::NonZeroExit {
                subcommand: subcommand.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output)
    }

    fn run_lines(&self, subcommand: &str, args: &[&str]) -> VcsResult<Vec<String>> {
        let output = self.run(subcommand, args)?;
        let text = String::from_utf8(output.stdout).map_err(|_| VcsError::InvalidUtf8 {
            subcommand: subcommand.to_string(),
        })?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn filter_recognized(&self, paths: Vec<String>) -> Vec<String> {
        paths
            .into_iter()
            .filter(|p| has_recognized_extension(Path::new(p)))
            .collect()
    }
}

impl VcsAdapter for GitAdapter {
    fn checkout(&self, rev: &str) -> VcsResult<()> {
        tracing::info!(rev, "checking out revision");
        self.run("checkout", &[rev])?;
        Ok(())
    }

    fn perform_merge(&self, mainline: &str, heads: &[String]) -> VcsResult<()> {
        self.checkout(mainline)?;
        tracing::info!(?heads, "performing speculative octopus merge");
        let head_refs: Vec<&str> = heads.iter().map(String::as_str).collect();
        let mut args = vec!["--no-commit", "--no-ff"];
        args.extend(head_refs.iter().copied());
        self.run("merge", &args).map_err(|_| VcsError::MergeFailed {
            mainline: mainline.to_string(),
            heads: heads.to_vec(),
        })?;
        Ok(())
    }

    fn abort_merge(&self) -> VcsResult<()> {
        tracing::info!("reverting speculative merge");
        self.run("merge", &["--abort"])?;
        Ok(())
    }

    fn changed_files_since(&self, rev: &str) -> VcsResult<Vec<String>> {
        let paths = self.run_lines("diff", &["--name-only", rev])?;
        Ok(self.filter_recognized(paths))
    }

    fn diff_name_only(&self, a: &str, b: &str) -> VcsResult<Vec<String>> {
        let spec = format!("{a}..{b}");
        let paths = self.run_lines("diff", &["--name-only", &spec])?;
        Ok(self.filter_recognized(paths))
    }

    fn diff_hunks(&self, a: &str, b: &str) -> VcsResult<HashMap<String, Vec<LineRange>>> {
        let spec = format!("{a}...{b}");
        let output = self.run("diff", &["-U0", &spec])?;
        let text = String::from_utf8(output.stdout).map_err(|_| VcsError::InvalidUtf8 {
            subcommand: "diff".to_string(),
        })?;
        Ok(parse_unified_diff_hunks(&text))
    }
}

static FILE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+\+\+ b/(.+)$").expect("valid regex"));
static HUNK_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@").expect("valid regex"));

/// Parse `git diff -U0 a...b` output into added-line ranges per path,
/// restricted to recognized extensions, mirroring the original's regex
/// scan over `@@ ... @@` and `+++ b/...` lines.
fn parse_unified_diff_hunks(diff_text: &str) -> HashMap<String, Vec<LineRange>> {
    let mut result: HashMap<String, Vec<LineRange>> = HashMap::new();
    let mut current_file: Option<String> = None;

    for line in diff_text.lines() {
        if let Some(caps) = FILE_HEADER.captures(line) {
            let path = caps[1].to_string();
            current_file = if has_recognized_extension(Path::new(&path)) {
                result.entry(path.clone()).or_default();
                Some(path)
            } else {
                None
            };
            continue;
        }

        if let (Some(path), Some(caps)) = (&current_file, HUNK_HEADER.captures(line)) {
            let start: u32 = caps[1].parse().unwrap_or(0);
            let count: u32 = caps
                .get(2)
                .map(|m| m.as_str().parse().unwrap_or(1))
                .unwrap_or(1);
            // A zero added-count (e.g. a pure-deletion hunk) still
            // normalizes to a single-line range at `start`, per spec.md
            // §4.F: `LineRange::new`'s `count.max(1)` does that.
            result
                .entry(path.clone())
                .or_default()
                .push(LineRange::new(start, count));
        }
    }

    result
}
