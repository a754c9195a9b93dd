//! Load pipeline: scan the renewal directory and build the cache.
//!
//! Every file is decoded and validated on its own. A file that fails either step is
//! logged and skipped; it never stops the rest of the directory from loading.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use renew_core::{PluginCategory, RenewalCodec, RenewalDocument, Renewal};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::{entry::Tracked, error::LoadError, layout::RenewalLayout};

/// Result of one directory scan.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    /// Loaded renewals, sorted by due date.
    pub entries: Vec<Tracked>,
    /// Renewal files that were left out: unreadable, invalid, or a duplicate id.
    pub skipped: Vec<PathBuf>,
}

/// Read every `*.renewal.json` below the layout directory.
#[instrument(skip_all, fields(dir = %layout.dir().display()))]
pub fn load(layout: &RenewalLayout, codec: &RenewalCodec) -> Scan {
    let dir = layout.dir();
    if !dir.is_dir() {
        debug!("renewal directory does not exist yet");
        return Scan::default();
    }

    let mut loaded = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = HashSet::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "failed to scan renewal directory");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(stem) = RenewalLayout::stem_of(path) else {
            continue;
        };

        match read_file(codec, path, stem) {
            Ok(renewal) if !seen.insert(renewal.id.clone()) => {
                warn!(file = %path.display(), id = %renewal.id, "skipping duplicate renewal id");
                skipped.push(path.to_path_buf());
            }
            Ok(renewal) => loaded.push(Tracked::clean(renewal, path.to_path_buf())),
            Err(err) => {
                warn!(file = %path.display(), error = %err, "skipping invalid renewal file");
                skipped.push(path.to_path_buf());
            }
        }
    }

    sort_by_due_date(&mut loaded);
    info!(count = loaded.len(), skipped = skipped.len(), "loaded renewals");
    Scan {
        entries: loaded,
        skipped,
    }
}

fn read_file(codec: &RenewalCodec, path: &Path, stem: &str) -> Result<Renewal, LoadError> {
    let text = fs::read_to_string(path)?;
    let document = codec.decode(&text)?;
    validate(document, Some(stem))
}

/// Check the structural invariants of a decoded document and build the renewal.
///
/// With `expected_id`, the document's own `Id` must equal it (the file name stem).
pub fn validate(document: RenewalDocument, expected_id: Option<&str>) -> Result<Renewal, LoadError> {
    let id = document.id.ok_or(LoadError::MissingId)?;
    if !RenewalLayout::is_valid_id(&id) {
        return Err(LoadError::InvalidId { id });
    }
    if let Some(stem) = expected_id {
        if id != stem {
            return Err(LoadError::IdMismatch {
                id,
                stem: stem.to_string(),
            });
        }
    }

    let date = document.date.ok_or(LoadError::MissingDate)?;
    let target = document
        .target
        .ok_or(LoadError::MissingOptions(PluginCategory::Target))?;
    let validation = document
        .validation
        .ok_or(LoadError::MissingOptions(PluginCategory::Validation))?;
    let store = document
        .store
        .ok_or(LoadError::MissingOptions(PluginCategory::Store))?;
    let installation = document
        .installation
        .ok_or(LoadError::MissingOptions(PluginCategory::Installation))?;
    if document.csr.is_none() && !target.skips_csr() {
        return Err(LoadError::MissingCsr {
            target: target.plugin().to_string(),
        });
    }

    let last_friendly_name = document
        .last_friendly_name
        .or_else(|| document.friendly_name.clone());

    Ok(Renewal {
        id,
        friendly_name: document.friendly_name,
        last_friendly_name,
        date,
        history: document.history.unwrap_or_default(),
        target,
        validation,
        csr: document.csr,
        store,
        installation,
        pfx_password: document.pfx_password,
    })
}

pub(crate) fn sort_by_due_date(entries: &mut [Tracked]) {
    entries.sort_by_key(|entry| entry.renewal.date);
}
