use std::sync::Arc;

use parking_lot::Mutex;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Driver name, or whatever label an external recorder used.
    pub source: String,
    pub api: String,
    /// Raw handle values the call received, followed by any it produced.
    pub handles: Vec<u64>,
}

/// Append-only call log, shareable between drivers and test code so the
/// relative order of calls across components can be asserted.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl Journal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, source: &str, api: &str, handles: &[u64]) {
        self.entries.lock().push(JournalEntry {
            source: source.to_string(),
            api: api.to_string(),
            handles: handles.to_vec(),
        });
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }

    /// Entries for `api`, oldest first.
    pub fn calls(&self, api: &str) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.api == api)
            .cloned()
            .collect()
    }

    pub fn last(&self, api: &str) -> Option<JournalEntry> {
        self.entries.lock().iter().rev().find(|e| e.api == api).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
