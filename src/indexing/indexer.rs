//! Source indexer (4.D): walks the tree, re-extracts dirty-or-absent
//! records via the XML-unit extractor (4.C), reuses everything else, and
//! persists the scanned-path list.

use std::path::Path;

use indexmap::IndexSet;
use rayon::prelude::*;

use crate::config::Settings;
use crate::indexing::walker;
use crate::record::FileRecord;
use crate::storage::Store;

pub struct Indexer<'a> {
    settings: &'a Settings,
    store: &'a Store,
}

impl<'a> Indexer<'a> {
    pub fn new(settings: &'a Settings, store: &'a Store) -> Self {
        Self { settings, store }
    }

    /// Walk `root`, re-extracting any file in `changed_since` or lacking a
    /// persisted record; persist the full scanned-path set afterward.
    /// Returns the sorted path list, matching what was persisted.
    pub fn index(&self, root: &Path, changed_since: &IndexSet<String>) -> Vec<String> {
        let paths = walker::discover_files(root);

        let to_extract: Vec<&String> = paths
            .iter()
            .filter(|path| changed_since.contains(*path) || self.store.load_record(path).is_none())
            .collect();

        tracing::info!(
            total = paths.len(),
            re_extracting = to_extract.len(),
            "indexing source tree"
        );

        let extracted: Vec<(String, Option<FileRecord>)> = to_extract
            .par_iter()
            .map(|repo_path| {
                let absolute = walker::absolute_path(root, repo_path);
                let result = crate::srcml::extract_file(&self.settings.subprocess, repo_path, &absolute);
                match result {
                    Ok(record) => ((*repo_path).clone(), record),
                    Err(error) => {
                        tracing::warn!(path = %repo_path, %error, "failed to extract file, skipping");
                        ((*repo_path).clone(), None)
                    }
                }
            })
            .collect();

        for (repo_path, record) in extracted {
            match record {
                Some(record) => {
                    if let Err(error) = self.store.save_record(&repo_path, &record) {
                        tracing::warn!(path = %repo_path, %error, "failed to persist record");
                    }
                }
                None => tracing::warn!(path = %repo_path, "no record produced, file will contribute no units"),
            }
        }

        let ordered: IndexSet<String> = paths.iter().cloned().collect();
        if let Err(error) = self.store.save_paths(&ordered) {
            tracing::warn!(%error, "failed to persist scanned path list");
        }

        paths
    }

    /// Dirty-record invalidation (4.D): delete the persisted record for
    /// every path that differs from the mainline after the speculative
    /// octopus merge, so the next `index()` call re-extracts from
    /// mainline content rather than the merged union.
    pub fn invalidate_dirty(&self, dirty_paths: &IndexSet<String>) {
        for path in dirty_paths {
            self.store.delete_record(path);
        }
    }
}
