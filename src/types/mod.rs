//! Shared ID and range types.

use serde::{Deserialize, Serialize};

/// A dense, zero-based ID for a named unit, assigned in a single
/// deterministic pass over the persisted path list (4.E). Zero is a valid
/// ID here, unlike the `NonZeroU32`-backed IDs elsewhere in this crate's
/// ancestry — the spec's "IDs are dense from 0 to N-1" invariant requires
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u32);

impl UnitId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inclusive line range, as reported by a `git diff -U0` hunk header.
/// A hunk with an omitted count (`+42` rather than `+42,3`) is normalized
/// to a single-line range at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    /// Exclusive end, i.e. the range is `[start, end)`.
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, count: u32) -> Self {
        let count = count.max(1);
        Self {
            start,
            end: start + count,
        }
    }

    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.start && line < self.end
    }
}

/// A branch argument as packed on the command line: `<base>-<head>`, where
/// `head` is the branch tip and `base` is the mainline revision it is
/// diffed against (spec.md §6). Branches are otherwise referenced
/// elsewhere by their position in the CLI's branch list and rendered in
/// output by `head`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSpec {
    pub base: String,
    pub head: String,
}

impl BranchSpec {
    /// Splits on the *first* `-`, so a hyphenated head revision (e.g. a
    /// branch name with dashes) still parses correctly, unlike the
    /// original reference implementation's unbounded `str.split('-')`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.split_once('-') {
            Some((base, head)) if !base.is_empty() && !head.is_empty() => Ok(Self {
                base: base.to_string(),
                head: head.to_string(),
            }),
            _ => Err(format!("invalid branch argument '{raw}', expected '<base>-<head>'")),
        }
    }
}

impl std::str::FromStr for BranchSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
