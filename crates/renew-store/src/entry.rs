use std::path::PathBuf;

use renew_core::Renewal;

/// Persistence state of one entry in a working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Matches its file on disk.
    Clean,
    /// Not yet written.
    New,
    /// Written before, changed since.
    Updated,
    /// File to be removed. Terminal.
    Deleted,
}

impl EntryState {
    pub fn needs_write(self) -> bool {
        matches!(self, EntryState::New | EntryState::Updated)
    }
}

/// A renewal together with its backing file and pending change.
#[derive(Debug, Clone)]
pub struct Tracked {
    pub renewal: Renewal,
    pub path: PathBuf,
    state: EntryState,
}

impl Tracked {
    pub fn clean(renewal: Renewal, path: PathBuf) -> Self {
        Self {
            renewal,
            path,
            state: EntryState::Clean,
        }
    }

    pub fn new(renewal: Renewal, path: PathBuf) -> Self {
        Self {
            renewal,
            path,
            state: EntryState::New,
        }
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn is_deleted(&self) -> bool {
        self.state == EntryState::Deleted
    }

    /// `Clean -> Updated`; new and deleted entries keep their state.
    pub fn mark_updated(&mut self) {
        if self.state == EntryState::Clean {
            self.state = EntryState::Updated;
        }
    }

    pub fn mark_deleted(&mut self) {
        self.state = EntryState::Deleted;
    }

    /// `New | Updated -> Clean` once the file has been written.
    pub(crate) fn mark_written(&mut self) {
        if self.state.needs_write() {
            self.state = EntryState::Clean;
        }
    }
}
