//! Caller-side guard against two evaluations of the same entry at once.
//!
//! This is advisory: the orchestrator itself never consults it. Front ends
//! take a ticket before calling `evaluate` and drop it when done.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Clone, Default)]
pub struct InFlightEvaluations {
    entries: Arc<Mutex<HashSet<String>>>,
}

impl InFlightEvaluations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` while another ticket for `entry_id` is alive.
    pub fn try_begin(&self, entry_id: &str) -> Option<InFlightTicket> {
        if !self.lock().insert(entry_id.to_owned()) {
            return None;
        }
        Some(InFlightTicket {
            entries: Arc::clone(&self.entries),
            entry_id: entry_id.to_owned(),
        })
    }

    pub fn is_running(&self, entry_id: &str) -> bool {
        self.lock().contains(entry_id)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Marks an entry as being evaluated until dropped.
pub struct InFlightTicket {
    entries: Arc<Mutex<HashSet<String>>>,
    entry_id: String,
}

impl InFlightTicket {
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(&self.entry_id);
    }
}
