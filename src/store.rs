//! The in-memory entry store.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::entry::{Entry, EntryId};

/// Holds the set of registered entries behind a single mutex.
///
/// Every method is safe under concurrent invocation; anything returned is a
/// copy, so callers can never mutate store state through a snapshot.
#[derive(Default)]
pub struct EntryStore {
    entries: Mutex<Vec<Entry>>,
}

impl EntryStore {
    pub fn new() -> Self {
        EntryStore::default()
    }

    /// Appends an entry. The caller supplies unique ids.
    pub fn register(&self, entry: Entry) {
        self.entries.lock().push(entry);
    }

    /// Removes an entry by id; a missing id is a no-op.
    pub fn remove(&self, id: EntryId) {
        self.entries.lock().retain(|e| e.id != id);
    }

    /// Returns a copy of the entry, or `None` when absent.
    pub fn entry(&self, id: EntryId) -> Option<Entry> {
        self.entries.lock().iter().find(|e| e.id == id).cloned()
    }

    /// Returns copies of all entries, soonest `next` first, entries with no
    /// `next` last.
    pub fn snapshot(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.entries.lock().clone();
        entries.sort_by(cmp_by_next);
        entries
    }

    /// The id and instant of the soonest-due entry, or `None` when the
    /// store is empty or no entry has a next activation.
    pub fn next(&self) -> Option<(EntryId, DateTime<Utc>)> {
        self.entries
            .lock()
            .iter()
            .filter_map(|e| e.next.map(|next| (e.id, next)))
            .min_by_key(|(_, next)| *next)
    }

    /// Copies of every entry due at or before `now`, soonest first.
    pub fn ready(&self, now: DateTime<Utc>) -> Vec<Entry> {
        let mut due: Vec<Entry> = self
            .entries
            .lock()
            .iter()
            .filter(|e| e.next.is_some_and(|next| next <= now))
            .cloned()
            .collect();
        due.sort_by(cmp_by_next);
        due
    }

    /// Applies a mutation to the entry with the given id, if present. Used
    /// by the dispatcher to record `prev`/`next` after a firing.
    pub fn update(&self, id: EntryId, f: impl FnOnce(&mut Entry)) {
        if let Some(entry) = self.entries.lock().iter_mut().find(|e| e.id == id) {
            f(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn cmp_by_next(a: &Entry, b: &Entry) -> Ordering {
    match (a.next, b.next) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
