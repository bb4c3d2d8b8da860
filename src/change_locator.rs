//! Change locator (4.F): for a single branch, extract the set of named
//! units whose lexical extent intersects an added-line range in that
//! branch's diff against the mainline.
//!
//! Resolves spec.md §9's first Open Question explicitly: `checkout(head)`
//! is called immediately before `diff_hunks` for *this* branch, inside the
//! same call — never once up front for all branches — so the working tree
//! `srcml` parses always matches the branch whose change set is being
//! computed, not a stale mainline or a previous branch's checkout.

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;

use crate::config::Settings;
use crate::error::VcsResult;
use crate::indexing::walker;
use crate::types::LineRange;
use crate::vcs::{has_recognized_extension, VcsAdapter};
use std::path::{Path, PathBuf};

/// Per-path sets of changed unit-names for one branch.
pub type ChangeSet = IndexMap<String, IndexSet<String>>;

/// Locate the units changed on `head` relative to `base` (spec.md §4.F).
/// Checks out `head` before diffing, per the Open Question resolution
/// above.
pub fn locate_changes(
    vcs: &dyn VcsAdapter,
    settings: &Settings,
    root: &Path,
    base: &str,
    head: &str,
) -> VcsResult<ChangeSet> {
    vcs.checkout(head)?;
    let hunks = vcs.diff_hunks(base, head)?;

    let entries: Vec<(String, Vec<LineRange>)> = hunks
        .into_iter()
        .filter(|(path, _)| has_recognized_extension(Path::new(path)))
        .map(|(path, ranges)| {
            let ranges = collapse_if_too_many(&path, ranges, settings.limits.max_file_changes);
            (path, ranges)
        })
        .collect();

    let results: Vec<(String, Option<IndexSet<String>>)> = entries
        .par_iter()
        .map(|(path, ranges)| {
            let absolute: PathBuf = walker::absolute_path(root, path);
            if !absolute.is_file() {
                return (path.clone(), None);
            }
            match crate::srcml::extract_changed_units(&settings.subprocess, &absolute, ranges) {
                Ok(names) => (path.clone(), names),
                Err(error) => {
                    tracing::warn!(%path, %error, "failed to extract changed units, dropping file");
                    (path.clone(), None)
                }
            }
        })
        .collect();

    let mut changes = ChangeSet::new();
    for (path, names) in results {
        if let Some(names) = names {
            if !names.is_empty() {
                changes.insert(path, names);
            }
        }
    }
    Ok(changes)
}

/// Above `max_file_changes` hunks, collapse to the single enclosing range
/// `[first.start, last.end)` rather than querying per-hunk, per spec.md
/// §4.F / §8 scenario 6.
fn collapse_if_too_many(path: &str, mut ranges: Vec<LineRange>, max_file_changes: usize) -> Vec<LineRange> {
    if ranges.len() <= max_file_changes {
        return ranges;
    }
    ranges.sort_unstable_by_key(|r| r.start);
    let first = *ranges.first().expect("non-empty after length check");
    let last = *ranges.last().expect("non-empty after length check");
    tracing::warn!(%path, count = ranges.len(), "too many hunks, collapsing to pessimistic enclosing range");
    vec![LineRange {
        start: first.start,
        end: last.end,
    }]
}
