//! Sequential run directories (`<Family>_Result_<N>`).
//!
//! The output root is rescanned on every call; nothing is cached between
//! runs. Only one process is expected to write to a given root at a time:
//! the scan-then-create sequence is not locked.

use crate::report::ClassifierFamily;
use std::io;
use std::path::{Path, PathBuf};

/// A freshly created run directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    /// Strictly positive run index
    pub index: u32,
    /// Full path of the directory
    pub path: PathBuf,
}

/// Parse `<prefix>_<digits>` and return the number
fn parse_run_suffix(name: &str, prefix: &str) -> Option<u32> {
    let digits = name.strip_prefix(prefix)?.strip_prefix('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Next unused run index for `prefix` under `output_root`.
///
/// Returns `max + 1` over subdirectories named `<prefix>_<integer>`, or 1
/// when none exist (including when the root itself is missing). Files and
/// unrelated directories are ignored.
///
/// # Errors
///
/// Returns an error if the root exists but cannot be read.
pub fn next_run_index(output_root: &Path, prefix: &str) -> io::Result<u32> {
    let entries = match std::fs::read_dir(output_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(1),
        Err(e) => return Err(e),
    };

    let mut max = 0;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(n) = parse_run_suffix(&entry.file_name().to_string_lossy(), prefix) {
            max = max.max(n);
        }
    }
    Ok(max.saturating_add(1))
}

/// Directory prefix for a classifier family, e.g. `OvO_Result`
#[must_use]
pub fn run_prefix(family: ClassifierFamily) -> String {
    format!("{}_Result", family.tag())
}

/// Create the next `<Family>_Result_<N>` directory under `output_root`.
///
/// # Errors
///
/// Returns an error if the root cannot be created or scanned, or if the
/// run directory already exists (another writer raced this one).
pub fn create_run_directory(output_root: &Path, family: ClassifierFamily) -> io::Result<RunDirectory> {
    std::fs::create_dir_all(output_root)?;

    let prefix = run_prefix(family);
    let index = next_run_index(output_root, &prefix)?;
    let path = output_root.join(format!("{prefix}_{index}"));
    std::fs::create_dir(&path)?;

    tracing::info!(
        run_index = index,
        path = %path.display(),
        "Created run directory"
    );

    Ok(RunDirectory { index, path })
}

/// Run index encoded in a run directory path, if it matches the family
#[must_use]
pub fn run_index_of(path: &Path, family: ClassifierFamily) -> Option<u32> {
    let name = path.file_name()?.to_string_lossy();
    parse_run_suffix(&name, &run_prefix(family))
}
