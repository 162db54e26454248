//! Accumulator for entries captured while a server runs.

use crate::har::{Archive, Entry};
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared, append-only list of captured entries.
///
/// Entries are appended when an exchange completes, so the list is in
/// completion order.
#[derive(Clone, Default)]
pub struct Recorder {
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: Entry) {
        self.entries.lock().push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the captured entries out as a new archive.
    pub fn into_archive(self) -> Archive {
        let entries = std::mem::take(&mut *self.entries.lock());
        Archive::new(entries)
    }
}
