//! The per-file record produced by the source indexer (4.D) from the
//! XML-unit extractor (4.C): a file's `#include` set and a mapping from
//! each named unit to the names it references.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// `includes` and `calls_naive` from spec.md §3. `IndexSet`/`IndexMap` give
/// deterministic insertion-order iteration, which the ID-assignment pass in
/// `indexing::graph_builder` depends on.
///
/// Invariant: every key of `calls_naive` is a non-empty, trimmed string,
/// and is always present in its own referenced-names set (the
/// self-reference sentinel from 4.C's body-reference rule).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileRecord {
    /// Header paths as they appear between quotes in `#include "…"`,
    /// plus this file's own repository-relative path.
    pub includes: IndexSet<String>,
    /// Unit name -> set of names referenced from its signature and body.
    pub calls_naive: IndexMap<String, IndexSet<String>>,
}

impl FileRecord {
    pub fn new(own_path: &str) -> Self {
        let mut includes = IndexSet::new();
        includes.insert(own_path.to_string());
        Self {
            includes,
            calls_naive: IndexMap::new(),
        }
    }

    /// Record that `unit` references `referenced` (and itself).
    pub fn add_unit(&mut self, unit: String, mut referenced: IndexSet<String>) {
        referenced.insert(unit.clone());
        self.calls_naive
            .entry(unit)
            .and_modify(|existing| existing.extend(referenced.iter().cloned()))
            .or_insert(referenced);
    }
}
