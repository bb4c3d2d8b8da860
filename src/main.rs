use std::path::Path;

use anyhow::Context;
use clap::Parser;
use indexmap::{IndexMap, IndexSet};

use semconflict::cli::{Cli, Commands};
use semconflict::config::{Limits, Settings};
use semconflict::indexing::{self, Indexer};
use semconflict::storage::Store;
use semconflict::vcs::{GitAdapter, VcsAdapter};
use semconflict::{change_locator, conflict, logging};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().context("failed to load configuration")?;
    logging::init_with_config(&settings.logging);

    rayon::ThreadPoolBuilder::new()
        .num_threads(settings.subprocess.parallel_threads)
        .build_global()
        .context("failed to size the rayon worker pool")?;

    match cli.command {
        Commands::Init { force } => run_init(force),
        Commands::Config => run_config(&settings),
        Commands::Detect {
            source_path,
            mainline_rev,
            branches,
        } => run_detect(&settings, &source_path, &mainline_rev, &branches),
    }
}

fn run_init(force: bool) -> anyhow::Result<()> {
    let path = Settings::init_config_file(force).map_err(|error| anyhow::anyhow!(error.to_string()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn run_config(settings: &Settings) -> anyhow::Result<()> {
    let toml_string = toml::to_string_pretty(settings).context("failed to render configuration")?;
    println!("{toml_string}");
    Ok(())
}

/// Orchestrates the full pipeline (spec.md §4, §6): speculative octopus
/// merge, incremental indexing, dirty-record invalidation, call-graph
/// construction, per-branch change location, and pairwise cross-branch
/// conflict detection.
///
/// The ordering below — abort the merge and save the revision *before*
/// rebuilding the call graph, deleting dirty records *before* that rebuild
/// — mirrors the reference tool's control flow: graph E is always built
/// from mainline-accurate records, never from the speculative merge's
/// content, and a changed file only becomes a fresh call-graph node on the
/// run after its record was invalidated.
fn run_detect(
    settings: &Settings,
    source_path: &Path,
    mainline_rev: &str,
    branches: &[semconflict::BranchSpec],
) -> anyhow::Result<()> {
    let vcs = GitAdapter::new(source_path, settings.subprocess.git_bin.clone());
    let store = Store::new(settings.state_dir.clone());

    let heads: Vec<String> = branches.iter().map(|b| b.head.clone()).collect();

    vcs.perform_merge(mainline_rev, &heads)
        .context("speculative octopus merge failed")?;

    let changed_since: IndexSet<String> = match store.load_revision() {
        Some(revision) => vcs
            .changed_files_since(&revision)
            .context("failed to diff against the last scanned revision")?
            .into_iter()
            .collect(),
        None => IndexSet::new(),
    };

    let indexer = Indexer::new(settings, &store);
    let paths = indexer.index(source_path, &changed_since);

    let dirty: IndexSet<String> = vcs
        .changed_files_since(mainline_rev)
        .context("failed to diff the speculative merge against the mainline")?
        .into_iter()
        .collect();
    indexer.invalidate_dirty(&dirty);

    vcs.abort_merge().context("failed to revert the speculative merge")?;
    store
        .save_revision(mainline_rev)
        .context("failed to persist the last-scanned revision")?;

    let (id_table, graph_pair) = indexing::build_call_graph(&store, &paths, settings.limits.max_transitive_include_level);
    store
        .save_id_table(&id_table.id_to_unit)
        .context("failed to persist the unit-ID table")?;
    store
        .save_graph("call_graph", &graph_pair.call_graph)
        .context("failed to persist the call graph")?;
    store
        .save_graph("called_by_graph", &graph_pair.called_by_graph)
        .context("failed to persist the called-by graph")?;

    let mut branch_changed_ids: IndexMap<String, IndexSet<semconflict::UnitId>> = IndexMap::new();
    for branch in branches {
        let changes = change_locator::locate_changes(&vcs, settings, source_path, &branch.base, &branch.head)
            .with_context(|| format!("failed to locate changes for branch '{}'", branch.head))?;

        let mut ids = IndexSet::new();
        for (path, names) in &changes {
            for name in names {
                match id_table.id_of(path, name) {
                    Some(id) => {
                        ids.insert(id);
                    }
                    None => tracing::debug!(%path, %name, "changed unit has no graph entry, dropping"),
                }
            }
        }
        branch_changed_ids.insert(branch.head.clone(), ids);
    }

    vcs.checkout(mainline_rev)
        .context("failed to return the working tree to the mainline revision")?;

    let detector = conflict::Detector::new(&graph_pair.called_by_graph, settings.limits);
    let conflicts = detector.detect(&branch_changed_ids);
    let (report, minimal) = conflict::build_report(&conflicts, &id_table);

    write_reports(&settings.limits, &report, &minimal)?;

    println!("{} potential conflict(s) found", conflicts.len());
    Ok(())
}

fn write_reports(
    limits: &Limits,
    report: &conflict::Report,
    minimal: &conflict::report::MinimalReport,
) -> anyhow::Result<()> {
    let level = limits.max_transitive_include_level;

    let full_path = format!("potential_conflicts_transitive_{level}.json");
    let full_json = serde_json::to_vec_pretty(report).context("failed to serialize the full conflict report")?;
    std::fs::write(&full_path, full_json).with_context(|| format!("failed to write {full_path}"))?;

    let minimal_path = format!("potential_conflicts_transitive_{level}_minimal.json");
    let minimal_json = serde_json::to_vec_pretty(minimal).context("failed to serialize the minimal conflict report")?;
    std::fs::write(&minimal_path, minimal_json).with_context(|| format!("failed to write {minimal_path}"))?;

    Ok(())
}
