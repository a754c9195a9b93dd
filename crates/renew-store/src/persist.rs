//! Persist pipeline: reconcile a working set with the renewal directory.

use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use renew_core::RenewalCodec;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::{
    entry::Tracked,
    error::StoreError,
    layout::RenewalLayout,
    load::sort_by_due_date,
};

/// Delete files of deleted entries, write new and updated ones, and return the
/// surviving entries sorted by due date.
///
/// Stops at the first I/O or encoding failure; files handled before it stay as written.
#[instrument(skip_all, fields(entries = entries.len()))]
pub fn persist(codec: &RenewalCodec, mut entries: Vec<Tracked>) -> Result<Vec<Tracked>, StoreError> {
    for entry in &mut entries {
        let id = &entry.renewal.id;
        if (entry.is_deleted() || entry.state().needs_write()) && !RenewalLayout::is_valid_id(id) {
            return Err(StoreError::InvalidId { id: id.clone() });
        }
        if entry.is_deleted() {
            remove(&entry.path)?;
            info!(id = %id, "removed renewal");
        } else if entry.state().needs_write() {
            let json = codec
                .encode(&entry.renewal)
                .map_err(|source| StoreError::Encode {
                    id: id.clone(),
                    source,
                })?;
            write_atomic(&entry.path, json.as_bytes()).map_err(|source| StoreError::Write {
                path: entry.path.clone(),
                source,
            })?;
            debug!(id = %id, path = %entry.path.display(), "wrote renewal");
            entry.mark_written();
        }
    }

    entries.retain(|entry| !entry.is_deleted());
    sort_by_due_date(&mut entries);
    Ok(entries)
}

fn remove(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::Delete {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write through a temp file in the target directory, then rename over the target.
fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid renewal path"))?;
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
