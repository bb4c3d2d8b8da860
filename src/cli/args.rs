//! CLI argument parsing using clap.
//!
//! Invocation contract (spec.md §6): `detect <source_path> <mainline_rev>
//! <base>-<head> [<base>-<head> ...]`, plus the `init`/`config` pair the
//! teacher ships alongside its main subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::types::BranchSpec;

#[derive(Parser)]
#[command(name = "semconflict")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Predicts cross-branch merge conflicts that never show up as textual overlaps")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Speculatively merge every branch onto the mainline, build the call
    /// graph, and report cross-branch call-path conflicts.
    Detect {
        /// Path to the C/C++ source tree (a git working copy).
        source_path: PathBuf,

        /// The revision branches are diffed against and the merge is
        /// eventually reverted to.
        mainline_rev: String,

        /// One or more `<base>-<head>` branch arguments.
        #[arg(required = true, num_args = 1.., value_parser = BranchSpec::parse)]
        branches: Vec<BranchSpec>,
    },

    /// Write a default `conflicts.toml` in the current directory.
    Init {
        /// Overwrite an existing `conflicts.toml`.
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective, layered configuration as TOML.
    Config,
}
