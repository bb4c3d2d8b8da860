//! Bounded reverse reachability and pairwise earliest-common-caller
//! detection (4.G), grounded on `find_conflicts.py`'s
//! `find_earliest_caller`/`find_path_to_unit`/`pairs` trio.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;

use crate::config::Limits;
use crate::storage::{BoundedSearch, SparseGraph};
use crate::types::UnitId;

/// A candidate cross-branch conflict: two changed units with at least one
/// earliest common caller, and the branches on which each was changed.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub unit_a: UnitId,
    pub unit_b: UnitId,
    pub branches_a: IndexSet<String>,
    pub branches_b: IndexSet<String>,
    /// `(path_a, path_b)`, each running from a common caller down to the
    /// respective changed unit, sorted by the path-length key (shortest,
    /// tie-broken toward paths that originate directly from a changed
    /// unit, first).
    pub call_paths: Vec<(Vec<UnitId>, Vec<UnitId>)>,
}

pub struct Detector<'a> {
    called_by_graph: &'a SparseGraph,
    limits: Limits,
}

impl<'a> Detector<'a> {
    pub fn new(called_by_graph: &'a SparseGraph, limits: Limits) -> Self {
        Self {
            called_by_graph,
            limits,
        }
    }

    /// `branch_changed_ids`: per branch head revision, the set of changed
    /// unit IDs resolved from 4.F's output via the ID table. Returns
    /// conflicts sorted ascending by the minimum path-length key across
    /// their path pairs (spec.md §4.G's output sort).
    pub fn detect(&self, branch_changed_ids: &IndexMap<String, IndexSet<UnitId>>) -> Vec<Conflict> {
        let mut unit_to_branches: HashMap<UnitId, IndexSet<String>> = HashMap::new();
        for (branch, ids) in branch_changed_ids {
            for &id in ids {
                unit_to_branches.entry(id).or_default().insert(branch.clone());
            }
        }

        let all_changed: Vec<UnitId> = unit_to_branches.keys().copied().collect();
        let searches: HashMap<UnitId, BoundedSearch> = all_changed
            .par_iter()
            .map(|&id| (id, self.called_by_graph.bounded_search(id, self.limits.max_path_length)))
            .collect();

        let id_sets: Vec<&IndexSet<UnitId>> = branch_changed_ids.values().collect();
        let mut scanned: HashSet<(UnitId, UnitId)> = HashSet::new();
        let mut conflicts = Vec::new();

        for i in 0..id_sets.len() {
            for j in (i + 1)..id_sets.len() {
                for &a in id_sets[i] {
                    for &b in id_sets[j] {
                        if !scanned.insert((a, b)) {
                            continue;
                        }
                        if let Some(conflict) = self.pairwise(a, b, &searches, &unit_to_branches) {
                            conflicts.push(conflict);
                        }
                    }
                }
            }
        }

        conflicts.sort_by_key(min_path_length_key);
        conflicts
    }

    /// Earliest-common-caller search for one cross-branch pair of changed
    /// units (spec.md §4.G steps 1-4).
    fn pairwise(
        &self,
        a: UnitId,
        b: UnitId,
        searches: &HashMap<UnitId, BoundedSearch>,
        unit_to_branches: &HashMap<UnitId, IndexSet<String>>,
    ) -> Option<Conflict> {
        let search_a = searches.get(&a)?;
        let search_b = searches.get(&b)?;

        let overlap: Vec<UnitId> = search_a.reachable.intersection(&search_b.reachable).copied().collect();
        if overlap.is_empty() {
            return None;
        }

        let mut path_pairs = Vec::new();
        for caller in overlap {
            let Some(mut path_a) = search_a.path_to(caller, self.limits.max_path_length) else {
                continue;
            };
            let Some(mut path_b) = search_b.path_to(caller, self.limits.max_path_length) else {
                continue;
            };
            // `path_to` runs source -> ... -> target (i.e. a -> ... ->
            // caller); reverse to the spec's "common caller down to the
            // changed unit" orientation.
            path_a.reverse();
            path_b.reverse();

            let set_a: HashSet<UnitId> = path_a.iter().copied().collect();
            let set_b: HashSet<UnitId> = path_b.iter().copied().collect();
            if set_a.intersection(&set_b).count() <= 1 {
                path_pairs.push((path_a, path_b));
            }
        }

        if path_pairs.is_empty() {
            return None;
        }
        path_pairs.sort_by_key(|(path_a, path_b)| path_length_key(path_a, path_b));

        Some(Conflict {
            unit_a: a,
            unit_b: b,
            branches_a: unit_to_branches.get(&a).cloned().unwrap_or_default(),
            branches_b: unit_to_branches.get(&b).cloned().unwrap_or_default(),
            call_paths: path_pairs,
        })
    }
}

/// `len(path_a) + len(path_b)`, minus 0.5 if either path has length 1, per
/// spec.md §4.G step 4 — represented doubled as an integer so it sorts
/// identically without floating point.
fn path_length_key(path_a: &[UnitId], path_b: &[UnitId]) -> i64 {
    let doubled_len = 2 * (path_a.len() as i64 + path_b.len() as i64);
    let tie_break = i64::from(path_a.len() == 1 || path_b.len() == 1);
    doubled_len - tie_break
}

fn min_path_length_key(conflict: &Conflict) -> i64 {
    conflict
        .call_paths
        .iter()
        .map(|(path_a, path_b)| path_length_key(path_a, path_b))
        .min()
        .unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(id_table: usize) -> UnitId {
        UnitId::new(id_table as u32)
    }

    #[test]
    fn direct_common_caller_scenario() {
        // caller(0) -> helper(1), worker(2); branch X changes helper, Y
        // changes worker. called_by edges: 1->0, 2->0.
        let called_by = SparseGraph::from_triples(3, &[(1, 0), (2, 0)]);
        let detector = Detector::new(&called_by, Limits::default());

        let mut branches = IndexMap::new();
        let mut x = IndexSet::new();
        x.insert(ids(1));
        branches.insert("X".to_string(), x);
        let mut y = IndexSet::new();
        y.insert(ids(2));
        branches.insert("Y".to_string(), y);

        let conflicts = detector.detect(&branches);
        assert_eq!(conflicts.len(), 1);
        let conflict = &conflicts[0];
        assert_eq!(conflict.call_paths.len(), 1);
        let (path_a, path_b) = &conflict.call_paths[0];
        assert_eq!(path_a, &vec![ids(0), ids(1)]);
        assert_eq!(path_b, &vec![ids(0), ids(2)]);
    }

    #[test]
    fn changed_unit_is_the_common_point_ranks_above_direct_caller() {
        // Scenario 1: caller(0) -> helper(1), worker(2), branches change
        // helper and worker.
        let called_by_1 = SparseGraph::from_triples(3, &[(1, 0), (2, 0)]);
        let detector_1 = Detector::new(&called_by_1, Limits::default());
        let mut branches_1 = IndexMap::new();
        let mut x = IndexSet::new();
        x.insert(ids(1));
        branches_1.insert("X".to_string(), x);
        let mut y = IndexSet::new();
        y.insert(ids(2));
        branches_1.insert("Y".to_string(), y);
        let scenario_1 = detector_1.detect(&branches_1);

        // Scenario 2: caller(0) -> worker(1); branch X changes caller(0),
        // branch Y changes worker(1).
        let called_by_2 = SparseGraph::from_triples(2, &[(1, 0)]);
        let detector_2 = Detector::new(&called_by_2, Limits::default());
        let mut branches_2 = IndexMap::new();
        let mut x2 = IndexSet::new();
        x2.insert(ids(0));
        branches_2.insert("X".to_string(), x2);
        let mut y2 = IndexSet::new();
        y2.insert(ids(1));
        branches_2.insert("Y".to_string(), y2);
        let scenario_2 = detector_2.detect(&branches_2);

        let key_1 = min_path_length_key(&scenario_1[0]);
        let key_2 = min_path_length_key(&scenario_2[0]);
        assert!(key_2 < key_1, "scenario 2 (changed unit is the common point) should rank above scenario 1");
    }

    #[test]
    fn beyond_max_path_length_yields_no_conflict() {
        // caller(0) -> mid(1) -> helper(2) and caller(0) -> mid2(3) -> worker(4).
        // Only common caller (0) is two hops away from helper/worker.
        let called_by = SparseGraph::from_triples(5, &[(1, 0), (2, 1), (3, 0), (4, 3)]);
        let detector = Detector::new(&called_by, Limits { max_path_length: 1, ..Limits::default() });

        let mut branches = IndexMap::new();
        let mut x = IndexSet::new();
        x.insert(ids(2));
        branches.insert("X".to_string(), x);
        let mut y = IndexSet::new();
        y.insert(ids(4));
        branches.insert("Y".to_string(), y);

        let conflicts = detector.detect(&branches);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn earliest_caller_discipline_holds() {
        let called_by = SparseGraph::from_triples(3, &[(1, 0), (2, 0)]);
        let detector = Detector::new(&called_by, Limits::default());
        let mut branches = IndexMap::new();
        let mut x = IndexSet::new();
        x.insert(ids(1));
        branches.insert("X".to_string(), x);
        let mut y = IndexSet::new();
        y.insert(ids(2));
        branches.insert("Y".to_string(), y);

        let conflicts = detector.detect(&branches);
        for conflict in &conflicts {
            for (path_a, path_b) in &conflict.call_paths {
                let set_a: HashSet<_> = path_a.iter().collect();
                let set_b: HashSet<_> = path_b.iter().collect();
                let intersection: Vec<_> = set_a.intersection(&set_b).collect();
                assert!(intersection.len() <= 1);
                if let Some(&&only) = intersection.first() {
                    assert_eq!(only, path_a[0]);
                }
            }
        }
    }
}
