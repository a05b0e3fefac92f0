//! Atomic file replacement (temp file in the target directory, then rename).

use crate::error::{Error, Result};
use std::io::Write;
use std::path::Path;

/// Write `data` to `target` so that readers see either the old file or the
/// complete new one.
pub(crate) fn write_atomic(target: &Path, data: &[u8]) -> Result<()> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    let mut file = temp.as_file();
    file.write_all(data).map_err(|e| Error::io(temp.path(), e))?;
    file.sync_all().map_err(|e| Error::io(temp.path(), e))?;

    temp.persist(target).map_err(|e| Error::io(target, e.error))?;
    Ok(())
}
