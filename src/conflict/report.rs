//! JSON export for the conflict detector (4.G), matching the
//! `potential_conflicts_transitive_<K>[_minimal].json` contract of
//! spec.md §6.

use indexmap::IndexMap;
use serde::Serialize;

use super::detector::Conflict;
use crate::storage::IdTable;
use crate::types::UnitId;

/// `(path, unit name)`, the JSON-serializable form of a `UnitId`.
pub type NamedUnit = (String, String);

#[derive(Debug, Clone, Serialize)]
pub struct ConflictEntry {
    #[serde(rename = "conflicting units")]
    pub conflicting_units: (NamedUnit, NamedUnit),
    #[serde(rename = "branch revisions")]
    pub branch_revisions: (Vec<String>, Vec<String>),
    #[serde(rename = "call paths")]
    pub call_paths: Vec<(Vec<NamedUnit>, Vec<NamedUnit>)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinimalConflictEntry {
    #[serde(rename = "conflicting units")]
    pub conflicting_units: (NamedUnit, NamedUnit),
    #[serde(rename = "branch revisions")]
    pub branch_revisions: (Vec<String>, Vec<String>),
    #[serde(rename = "shortest path")]
    pub shortest_path: (Vec<NamedUnit>, Vec<NamedUnit>),
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub number_of_conflicts: usize,
    pub conflicting_branches: IndexMap<String, IndexMap<String, usize>>,
    pub ranking: Vec<(NamedUnit, usize)>,
    pub conflicts: Vec<ConflictEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinimalReport {
    pub number_of_conflicts: usize,
    pub conflicting_branches: IndexMap<String, IndexMap<String, usize>>,
    pub ranking: Vec<(NamedUnit, usize)>,
    pub conflicts: Vec<MinimalConflictEntry>,
}

fn named(id_table: &IdTable, id: UnitId) -> NamedUnit {
    id_table
        .name_of(id)
        .cloned()
        .unwrap_or_else(|| (String::new(), String::new()))
}

fn named_path(id_table: &IdTable, path: &[UnitId]) -> Vec<NamedUnit> {
    path.iter().map(|&id| named(id_table, id)).collect()
}

/// Build the full report and its reduced-detail counterpart together,
/// since both share the same ranking and branch-pair counts.
pub fn build_report(conflicts: &[Conflict], id_table: &IdTable) -> (Report, MinimalReport) {
    let (ranking, conflicting_branches) = rank_and_pair_counts(conflicts, id_table);

    let entries: Vec<ConflictEntry> = conflicts
        .iter()
        .map(|conflict| ConflictEntry {
            conflicting_units: (named(id_table, conflict.unit_a), named(id_table, conflict.unit_b)),
            branch_revisions: (
                conflict.branches_a.iter().cloned().collect(),
                conflict.branches_b.iter().cloned().collect(),
            ),
            call_paths: conflict
                .call_paths
                .iter()
                .map(|(a, b)| (named_path(id_table, a), named_path(id_table, b)))
                .collect(),
        })
        .collect();

    let minimal_entries: Vec<MinimalConflictEntry> = conflicts
        .iter()
        .map(|conflict| {
            let (first_a, first_b) = conflict
                .call_paths
                .first()
                .cloned()
                .unwrap_or_default();
            MinimalConflictEntry {
                conflicting_units: (named(id_table, conflict.unit_a), named(id_table, conflict.unit_b)),
                branch_revisions: (
                    conflict.branches_a.iter().cloned().collect(),
                    conflict.branches_b.iter().cloned().collect(),
                ),
                shortest_path: (named_path(id_table, &first_a), named_path(id_table, &first_b)),
            }
        })
        .collect();

    let report = Report {
        number_of_conflicts: conflicts.len(),
        conflicting_branches: conflicting_branches.clone(),
        ranking: ranking.clone(),
        conflicts: entries,
    };
    let minimal = MinimalReport {
        number_of_conflicts: conflicts.len(),
        conflicting_branches,
        ranking,
        conflicts: minimal_entries,
    };
    (report, minimal)
}

/// Ranking (unit -> conflict-mention count, descending) and
/// `conflicting_branches` (symmetric branch -> branch -> count, self-pairs
/// skipped), per spec.md §4.G.
fn rank_and_pair_counts(
    conflicts: &[Conflict],
    id_table: &IdTable,
) -> (Vec<(NamedUnit, usize)>, IndexMap<String, IndexMap<String, usize>>) {
    let mut ranking: IndexMap<UnitId, usize> = IndexMap::new();
    let mut pairs: IndexMap<String, IndexMap<String, usize>> = IndexMap::new();

    for conflict in conflicts {
        for &id in [conflict.unit_a, conflict.unit_b].iter() {
            *ranking.entry(id).or_insert(0) += 1;
        }

        for branch_a in &conflict.branches_a {
            for branch_b in &conflict.branches_b {
                if branch_a == branch_b {
                    continue;
                }
                *pairs
                    .entry(branch_a.clone())
                    .or_default()
                    .entry(branch_b.clone())
                    .or_insert(0) += 1;
                *pairs
                    .entry(branch_b.clone())
                    .or_default()
                    .entry(branch_a.clone())
                    .or_insert(0) += 1;
            }
        }
    }

    let mut ranking: Vec<(NamedUnit, usize)> = ranking
        .into_iter()
        .map(|(id, count)| (named(id_table, id), count))
        .collect();
    ranking.sort_by(|(unit_a, count_a), (unit_b, count_b)| count_b.cmp(count_a).then_with(|| unit_a.cmp(unit_b)));

    (ranking, pairs)
}
