//! Read/write side of the persistence layer (4.A).
//!
//! Every artifact is `serde_json`, written atomically (temp file + rename)
//! following the teacher's `IndexPersistence::save` pattern. Missing files
//! are *absent*, never an error; a JSON parse failure is treated the same
//! way spec.md §4.A treats a corrupt record — equivalent to absent, logged
//! at `debug` rather than surfaced.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};
use crate::record::FileRecord;
use crate::types::UnitId;

use super::graph::SparseGraph;

const RECORDS_DIR: &str = "preprocessed_files/json";
const PATHS_FILE: &str = "preprocessed_files_paths.json";
const REVISION_FILE: &str = "preprocessed_files/last_scanned_revision.txt";
const ID_TABLE_FILE: &str = "id_to_named_unit.json";

/// A handle onto the state directory. Cheap to construct; all operations
/// resolve paths relative to `state_dir` on every call.
#[derive(Debug, Clone)]
pub struct Store {
    state_dir: PathBuf,
}

impl Store {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    fn record_path(&self, repo_path: &str) -> PathBuf {
        self.state_dir.join(RECORDS_DIR).join(format!("{repo_path}.json"))
    }

    fn paths_path(&self) -> PathBuf {
        self.state_dir.join(PATHS_FILE)
    }

    fn revision_path(&self) -> PathBuf {
        self.state_dir.join(REVISION_FILE)
    }

    fn id_table_path(&self) -> PathBuf {
        self.state_dir.join(ID_TABLE_FILE)
    }

    /// `<name>.json`, e.g. `call_graph.json` / `called_by_graph.json`. The
    /// `.npz` name in spec.md §6 names scipy's binary sparse format; this
    /// crate has no numeric dependency that reads/writes it, so the same
    /// row/col/value-triple *contract* is carried over JSON instead (see
    /// DESIGN.md).
    fn graph_path(&self, name: &str) -> PathBuf {
        self.state_dir.join(format!("{name}.json"))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> IndexResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| IndexError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|source| IndexError::FileWrite {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| IndexError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and deserialize `path` as JSON. A missing file or corrupt JSON
    /// are both reported as `Ok(None)`.
    fn read_json<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> Option<T> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::debug!(?path, %error, "discarding corrupt persisted JSON, treating as absent");
                None
            }
        }
    }

    // -- file records ----------------------------------------------------

    pub fn save_record(&self, repo_path: &str, record: &FileRecord) -> IndexResult<()> {
        let path = self.record_path(repo_path);
        let bytes = serde_json::to_vec(record).map_err(|source| IndexError::Serialize {
            path: path.clone(),
            source,
        })?;
        self.write_atomic(&path, &bytes)
    }

    pub fn load_record(&self, repo_path: &str) -> Option<FileRecord> {
        self.read_json(&self.record_path(repo_path))
    }

    /// Delete the record for `repo_path`. Used for dirty-record
    /// invalidation after the speculative octopus merge (4.D). Missing
    /// files are not an error.
    pub fn delete_record(&self, repo_path: &str) {
        let path = self.record_path(repo_path);
        if let Err(error) = fs::remove_file(&path) {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(?path, %error, "failed to delete dirty record");
            }
        }
    }

    // -- path list ---------------------------------------------------------

    pub fn save_paths(&self, paths: &IndexSet<String>) -> IndexResult<()> {
        let path = self.paths_path();
        let ordered: Vec<&String> = paths.iter().collect();
        let bytes = serde_json::to_vec(&ordered).map_err(|source| IndexError::Serialize {
            path: path.clone(),
            source,
        })?;
        self.write_atomic(&path, &bytes)
    }

    pub fn load_paths(&self) -> IndexSet<String> {
        self.read_json::<Vec<String>>(&self.paths_path())
            .map(IndexSet::from_iter)
            .unwrap_or_default()
    }

    // -- last-scanned revision --------------------------------------------

    pub fn save_revision(&self, revision: &str) -> IndexResult<()> {
        let path = self.revision_path();
        self.write_atomic(&path, revision.as_bytes())
    }

    pub fn load_revision(&self) -> Option<String> {
        fs::read_to_string(self.revision_path()).ok()
    }

    // -- unit-ID table -----------------------------------------------------

    /// Persist the inverse table: `id -> (path, name)`, indexed by
    /// position (`table[id.value()] == (path, name)`).
    pub fn save_id_table(&self, table: &[(String, String)]) -> IndexResult<()> {
        let path = self.id_table_path();
        let as_object: HashMap<String, (&str, &str)> = table
            .iter()
            .enumerate()
            .map(|(id, (file, name))| (id.to_string(), (file.as_str(), name.as_str())))
            .collect();
        let bytes = serde_json::to_vec(&as_object).map_err(|source| IndexError::Serialize {
            path: path.clone(),
            source,
        })?;
        self.write_atomic(&path, &bytes)
    }

    /// Reconstruct both directions of the ID table, coercing the
    /// stringified keys produced by `save_id_table` back into integers.
    pub fn load_id_table(&self) -> Option<IdTable> {
        let raw: HashMap<String, (String, String)> = self.read_json(&self.id_table_path())?;
        let mut id_to_unit = vec![(String::new(), String::new()); raw.len()];
        let mut unit_to_id = HashMap::with_capacity(raw.len());
        for (key, (file, name)) in raw {
            let id: u32 = key.parse().ok()?;
            if (id as usize) >= id_to_unit.len() {
                return None;
            }
            unit_to_id.insert((file.clone(), name.clone()), UnitId::new(id));
            id_to_unit[id as usize] = (file, name);
        }
        Some(IdTable {
            id_to_unit,
            unit_to_id,
        })
    }

    // -- sparse graphs -------------------------------------------------------

    pub fn save_graph(&self, name: &str, graph: &SparseGraph) -> IndexResult<()> {
        let path = self.graph_path(name);
        let bytes = serde_json::to_vec(&graph.to_triples()).map_err(|source| IndexError::Serialize {
            path: path.clone(),
            source,
        })?;
        self.write_atomic(&path, &bytes)
    }

    pub fn load_graph(&self, name: &str, num_units: usize) -> Option<SparseGraph> {
        let triples: Vec<(u32, u32)> = self.read_json(&self.graph_path(name))?;
        Some(SparseGraph::from_triples(num_units, &triples))
    }
}

/// Both directions of the unit-ID table (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct IdTable {
    pub id_to_unit: Vec<(String, String)>,
    pub unit_to_id: HashMap<(String, String), UnitId>,
}

impl IdTable {
    pub fn len(&self) -> usize {
        self.id_to_unit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_unit.is_empty()
    }

    pub fn name_of(&self, id: UnitId) -> Option<&(String, String)> {
        self.id_to_unit.get(id.value() as usize)
    }

    pub fn id_of(&self, file: &str, name: &str) -> Option<UnitId> {
        self.unit_to_id
            .get(&(file.to_string(), name.to_string()))
            .copied()
    }
}
