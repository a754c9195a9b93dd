use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use renew_core::{PluginRegistry, RenewResult, Renewal, RenewalCodec, SecretProtector};
use tracing::{info, instrument};

use crate::{
    entry::Tracked,
    error::{LoadError, StoreError},
    layout::RenewalLayout,
    load::{self, Scan},
    persist,
};

/// A pending change to the set of renewals.
#[derive(Debug, Clone)]
pub enum Change {
    /// Create, or replace a renewal with the same id.
    Add(Renewal),
    /// Rewrite an existing renewal; treated as `Add` when the id is unknown.
    Update(Renewal),
    /// Remove the renewal's file.
    Delete(Renewal),
}

/// Changes applied together by [`RenewalStore::apply`].
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl FromIterator<Change> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

/// File-backed renewal store with an in-memory cache.
///
/// The cache is filled from disk on first read and rebuilt by every mutation, so a
/// caller always observes the state it just wrote. All I/O happens on the calling
/// thread; a mutex serialises cache updates between threads of one process.
pub struct RenewalStore {
    layout: RenewalLayout,
    codec: RenewalCodec,
    cache: Mutex<Option<Scan>>,
}

impl RenewalStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        registry: Arc<PluginRegistry>,
        protector: Arc<dyn SecretProtector>,
    ) -> Self {
        Self {
            layout: RenewalLayout::new(dir),
            codec: RenewalCodec::new(registry, protector),
            cache: Mutex::new(None),
        }
    }

    pub fn layout(&self) -> &RenewalLayout {
        &self.layout
    }

    pub fn registry(&self) -> &PluginRegistry {
        self.codec.registry()
    }

    /// Cached renewals ordered by due date, optionally filtered.
    ///
    /// Filters compare case-insensitively and must all match.
    #[instrument(skip(self))]
    pub fn list(
        &self,
        id: Option<&str>,
        friendly_name: Option<&str>,
    ) -> Result<Vec<Renewal>, StoreError> {
        let mut cache = self.lock()?;
        let scan = cache.get_or_insert_with(|| load::load(&self.layout, &self.codec));
        Ok(scan
            .entries
            .iter()
            .map(|entry| &entry.renewal)
            .filter(|r| id.is_none_or(|id| same_text(&r.id, id)))
            .filter(|r| {
                friendly_name.is_none_or(|name| {
                    r.last_friendly_name
                        .as_deref()
                        .or(r.friendly_name.as_deref())
                        .is_some_and(|last| same_text(last, name))
                })
            })
            .cloned()
            .collect())
    }

    /// Record an execution result and persist the renewal.
    ///
    /// A renewal whose id is not stored yet starts with an empty history.
    #[instrument(skip_all, fields(id = %renewal.id))]
    pub fn save(&self, renewal: &mut Renewal, result: RenewResult) -> Result<(), StoreError> {
        self.mutate(|working| {
            let known = working.iter().any(|entry| entry.renewal.id == renewal.id);
            if !known {
                info!(name = %renewal.display_name(), "adding renewal");
                renewal.history.clear();
            }
            renewal.history.push(result);
            let change = if known {
                Change::Update(renewal.clone())
            } else {
                Change::Add(renewal.clone())
            };
            self.stage(working, change);
        })
    }

    /// Store a renewal built elsewhere, as is.
    #[instrument(skip_all, fields(id = %renewal.id))]
    pub fn import(&self, renewal: Renewal) -> Result<(), StoreError> {
        info!(name = %renewal.display_name(), "importing renewal");
        self.mutate(|working| self.stage(working, Change::Add(renewal)))
    }

    /// Remove a renewal and its file.
    #[instrument(skip_all, fields(id = %renewal.id))]
    pub fn cancel(&self, renewal: &Renewal) -> Result<(), StoreError> {
        self.mutate(|working| self.stage(working, Change::Delete(renewal.clone())))
    }

    /// Remove every stored renewal.
    #[instrument(skip(self))]
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.mutate(|working| working.iter_mut().for_each(Tracked::mark_deleted))
    }

    /// Rewrite every stored renewal through the current secret protector.
    ///
    /// Nothing semantic changes; every secret is re-sealed under the protector's
    /// current envelope and key.
    #[instrument(skip(self))]
    pub fn encrypt(&self) -> Result<(), StoreError> {
        self.mutate(|working| working.iter_mut().for_each(Tracked::mark_updated))
    }

    /// Apply a batch of changes in one persist pass.
    #[instrument(skip_all, fields(changes = changes.changes.len()))]
    pub fn apply(&self, changes: ChangeSet) -> Result<(), StoreError> {
        self.mutate(|working| {
            for change in changes.changes {
                self.stage(working, change);
            }
        })
    }

    /// Drop the cache and read the directory again.
    #[instrument(skip(self))]
    pub fn reload(&self) -> Result<(), StoreError> {
        let mut cache = self.lock()?;
        *cache = Some(load::load(&self.layout, &self.codec));
        Ok(())
    }

    /// Renewal files the current cache left out because they did not load.
    pub fn skipped(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut cache = self.lock()?;
        let scan = cache.get_or_insert_with(|| load::load(&self.layout, &self.codec));
        Ok(scan.skipped.clone())
    }

    /// Decode and validate a standalone renewal document.
    pub fn read_renewal(&self, text: &str) -> Result<Renewal, LoadError> {
        load::validate(self.codec.decode(text)?, None)
    }

    /// Run one persist pass over the cache plus whatever `f` stages.
    ///
    /// On failure the cache is dropped so the next read re-syncs with disk.
    fn mutate(&self, f: impl FnOnce(&mut Vec<Tracked>)) -> Result<(), StoreError> {
        let mut cache = self.lock()?;
        let Scan {
            entries: mut working,
            skipped,
        } = match cache.take() {
            Some(scan) => scan,
            None => load::load(&self.layout, &self.codec),
        };
        f(&mut working);
        let entries = persist::persist(&self.codec, working)?;
        *cache = Some(Scan { entries, skipped });
        Ok(())
    }

    fn stage(&self, working: &mut Vec<Tracked>, change: Change) {
        match change {
            Change::Add(renewal) => match find(working, &renewal.id) {
                Some(entry) => {
                    *entry = Tracked::new(renewal, entry.path.clone());
                }
                None => {
                    let path = self.layout.path_for(&renewal.id);
                    working.push(Tracked::new(renewal, path));
                }
            },
            Change::Update(renewal) => match find(working, &renewal.id) {
                Some(entry) => {
                    entry.renewal = renewal;
                    entry.mark_updated();
                }
                None => self.stage(working, Change::Add(renewal)),
            },
            Change::Delete(renewal) => match find(working, &renewal.id) {
                Some(entry) => entry.mark_deleted(),
                None => {
                    let path = self.layout.path_for(&renewal.id);
                    let mut entry = Tracked::new(renewal, path);
                    entry.mark_deleted();
                    working.push(entry);
                }
            },
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Scan>>, StoreError> {
        self.cache.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn find<'a>(working: &'a mut [Tracked], id: &str) -> Option<&'a mut Tracked> {
    working
        .iter_mut()
        .find(|entry| !entry.is_deleted() && entry.renewal.id == id)
}

fn same_text(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
