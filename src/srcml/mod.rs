//! XML-unit extractor (4.C): drives the `srcml` external parser over a
//! single file and turns its XML output into either a full `FileRecord`
//! (4.D, the source indexer) or a set of changed-unit names bounded to a
//! position range (4.F, the change locator).
//!
//! Subprocess handling follows the same shape as `vcs::GitAdapter` --
//! argv logged at `debug`, failures captured into a typed error -- with
//! the retry/timeout policy spec.md §7 asks for: up to
//! `subprocess.retries` retries on a non-zero exit, and a hard
//! `subprocess.timeout_secs` ceiling per invocation that skips the file
//! with a warning rather than failing the whole run.

mod units;
mod xmltree;

use crate::config::SubprocessConfig;
use crate::error::{ExtractError, ExtractResult};
use crate::record::FileRecord;
use crate::types::LineRange;
use indexmap::IndexSet;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

enum WaitOutcome {
    Exited {
        success: bool,
        stdout: Vec<u8>,
    },
    TimedOut,
}

fn spawn_reader<R>(handle: Option<R>) -> std::thread::JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut h) = handle {
            let _ = h.read_to_end(&mut buf);
        }
        buf
    })
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> WaitOutcome {
    let stdout_reader = spawn_reader(child.stdout.take());
    let _stderr_reader = spawn_reader(child.stderr.take());

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = stdout_reader.join().unwrap_or_default();
                return WaitOutcome::Exited {
                    success: status.success(),
                    stdout,
                };
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return WaitOutcome::TimedOut;
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(_) => return WaitOutcome::TimedOut,
        }
    }
}

/// Invoke `srcml` on `path`, retrying up to `settings.retries` times on a
/// non-zero exit. Returns `Ok(None)` (not an error) when the invocation
/// times out -- the caller skips the file and logs a warning, per
/// spec.md §7.
fn run_srcml(
    settings: &SubprocessConfig,
    path: &Path,
    positional: bool,
) -> ExtractResult<Option<Vec<u8>>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("cpp")
        .to_string();
    let register = format!("{ext}=C++");
    let timeout = Duration::from_secs(settings.timeout_secs);

    let mut attempt = 0;
    loop {
        let mut cmd = Command::new(&settings.srcml_bin);
        if positional {
            cmd.arg("--position");
        }
        cmd.arg("--register-ext")
            .arg(&register)
            .arg("-X")
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(?path, attempt, positional, "invoking srcml");
        let mut child = cmd.spawn().map_err(ExtractError::Spawn)?;

        match wait_with_timeout(&mut child, timeout) {
            WaitOutcome::Exited { success: true, stdout } => return Ok(Some(stdout)),
            WaitOutcome::Exited { success: false, .. } => {
                attempt += 1;
                if attempt > settings.retries {
                    return Err(ExtractError::ExhaustedRetries {
                        path: path.to_path_buf(),
                        retries: settings.retries,
                    });
                }
                tracing::warn!(?path, attempt, "srcml exited non-zero, retrying");
            }
            WaitOutcome::TimedOut => {
                tracing::warn!(?path, timeout_secs = settings.timeout_secs, "srcml timed out, skipping file");
                return Ok(None);
            }
        }
    }
}

/// Extract a `FileRecord` for `path` (4.C -> 4.D). Returns `Ok(None)` when
/// the file was skipped due to a parser timeout.
pub fn extract_file(
    settings: &SubprocessConfig,
    repo_relative_path: &str,
    absolute_path: &Path,
) -> ExtractResult<Option<FileRecord>> {
    let Some(xml) = run_srcml(settings, absolute_path, false)? else {
        return Ok(None);
    };
    let root = xmltree::parse(&xml);
    Ok(Some(units::extract_record(repo_relative_path, &root)))
}

/// Extract the names of named units whose subtree overlaps any of `ranges`
/// (4.F). Requires `--position` output, so this issues its own `srcml`
/// invocation rather than reusing a cached extraction.
pub fn extract_changed_units(
    settings: &SubprocessConfig,
    absolute_path: &Path,
    ranges: &[LineRange],
) -> ExtractResult<Option<IndexSet<String>>> {
    if ranges.is_empty() {
        return Ok(Some(IndexSet::new()));
    }
    let Some(xml) = run_srcml(settings, absolute_path, true)? else {
        return Ok(None);
    };
    let root = xmltree::parse(&xml);
    Ok(Some(units::extract_changed_unit_names(&root, ranges)))
}
