//! Filesystem helpers shared by the stores and the working tree.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::TwigResult;

/// Write data to a file using temp-file-then-rename.
///
/// Readers see either the previous record or the new one, never a
/// partially written file.
pub fn atomic_write(path: &Path, data: &[u8]) -> TwigResult<()> {
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_data()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Remove empty directories walking up from `dir` to `stop_at` (exclusive).
pub fn remove_empty_dirs(dir: &Path, stop_at: &Path) -> std::io::Result<()> {
    let mut current = dir.to_path_buf();
    while current.starts_with(stop_at) && current != stop_at {
        if fs::read_dir(&current)?.next().is_some() {
            break;
        }
        fs::remove_dir(&current)?;
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }
    Ok(())
}
