//! Configuration for the conflict detector.
//!
//! Layered the way the teacher crate layers its settings:
//! - Built-in defaults
//! - `conflicts.toml` in the working directory (or an ancestor)
//! - `CONFLICTS_`-prefixed environment variables, double underscore for
//!   nested levels (e.g. `CONFLICTS_LIMITS__MAX_PATH_LENGTH=2`)
//!
//! CLI flags layer on top of this in `main.rs`, by overwriting the relevant
//! `Settings` field after `Settings::load()` returns.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The file and directory names this crate persists state under.
pub const STATE_DIR: &str = ".semconflict";
pub const CONFIG_FILE_NAME: &str = "conflicts.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Where persisted per-file records, the path list, and the graphs live.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Bounded search and extraction limits from spec.md §6.
    #[serde(default)]
    pub limits: Limits,

    /// srcml/git subprocess behavior.
    #[serde(default)]
    pub subprocess: SubprocessConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct Limits {
    /// How many hops of `#include` to follow when computing a file's
    /// transitive-include closure. Depth 0 is the file itself.
    #[serde(default = "default_transitive_include_level")]
    pub max_transitive_include_level: u32,

    /// Distance bound for the reverse reachability search from each
    /// changed unit.
    #[serde(default = "default_path_length")]
    pub max_path_length: u32,

    /// Above this many hunks in a single file, collapse to one enclosing
    /// range rather than querying per-hunk.
    #[serde(default = "default_file_changes")]
    pub max_file_changes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SubprocessConfig {
    /// Path to the `srcml` executable.
    #[serde(default = "default_srcml_bin")]
    pub srcml_bin: String,

    /// Path to the `git` executable.
    #[serde(default = "default_git_bin")]
    pub git_bin: String,

    /// Per-invocation timeout before a file is skipped with a warning.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry budget for transient (non-timeout) failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Parallelism for per-file extraction and per-root reachability
    /// searches. Defaults to the number of logical CPUs.
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,
    #[serde(default)]
    pub modules: std::collections::HashMap<String, String>,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(STATE_DIR)
}
fn default_transitive_include_level() -> u32 {
    1
}
fn default_path_length() -> u32 {
    1
}
fn default_file_changes() -> usize {
    500
}
fn default_srcml_bin() -> String {
    "srcml".to_string()
}
fn default_git_bin() -> String {
    "git".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_retries() -> u32 {
    3
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            limits: Limits::default(),
            subprocess: SubprocessConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_transitive_include_level: default_transitive_include_level(),
            max_path_length: default_path_length(),
            max_file_changes: default_file_changes(),
        }
    }
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            srcml_bin: default_srcml_bin(),
            git_bin: default_git_bin(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            parallel_threads: default_parallel_threads(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: std::collections::HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, figment::Error> {
        let config_path =
            Self::find_config().unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("CONFLICTS_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
    }

    /// Look for `conflicts.toml` in the current directory or an ancestor.
    fn find_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let candidate = ancestor.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Write the default configuration to `conflicts.toml` in the current
    /// directory.
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
        let config_path = PathBuf::from(CONFIG_FILE_NAME);
        if !force && config_path.exists() {
            return Err("conflicts.toml already exists. Use --force to overwrite".into());
        }
        let toml_string = toml::to_string_pretty(&Settings::default())?;
        std::fs::write(&config_path, toml_string)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_settings_match_spec_constants() {
        let settings = Settings::default();
        assert_eq!(settings.limits.max_transitive_include_level, 1);
        assert_eq!(settings.limits.max_path_length, 1);
        assert_eq!(settings.limits.max_file_changes, 500);
        assert_eq!(settings.subprocess.timeout_secs, 60);
        assert_eq!(settings.subprocess.retries, 3);
    }

    #[test]
    fn toml_round_trips_through_figment() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &config_path,
            "[limits]\nmax_path_length = 2\n",
        )
        .unwrap();

        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(&config_path))
            .extract()
            .unwrap();

        assert_eq!(settings.limits.max_path_length, 2);
        assert_eq!(settings.limits.max_transitive_include_level, 1);
    }
}
