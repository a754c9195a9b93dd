use std::path::{Path, PathBuf};

/// File name suffix marking a renewal document.
pub const RENEWAL_SUFFIX: &str = ".renewal.json";

/// Where renewal files live: `<dir>/<id>.renewal.json`.
#[derive(Debug, Clone)]
pub struct RenewalLayout {
    dir: PathBuf,
}

impl RenewalLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}{RENEWAL_SUFFIX}"))
    }

    /// Renewal id implied by a file name, if it carries the suffix.
    pub fn stem_of(path: &Path) -> Option<&str> {
        path.file_name()?
            .to_str()?
            .strip_suffix(RENEWAL_SUFFIX)
            .filter(|stem| !stem.is_empty())
    }

    /// Ids become file names, so they may not name a path.
    pub fn is_valid_id(id: &str) -> bool {
        !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\', '\0'])
    }
}
