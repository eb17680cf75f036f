//! The local, ordered snapshot of job records

use crate::core::events::{ChangeEvent, EventAction};
use crate::core::record::JobRecord;
use indexmap::IndexMap;
use indexmap::map::Entry;

/// Outcome of applying one change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// New record placed at the front
    Inserted,
    /// Existing record's content replaced in place
    Replaced,
    Removed,
    /// Nothing changed (identical content or delete of an absent id)
    Unchanged,
    /// Unknown action, event dropped
    Ignored,
}

impl Applied {
    pub fn changed(&self) -> bool {
        matches!(self, Applied::Inserted | Applied::Replaced | Applied::Removed)
    }
}

/// Ordered records keyed by id
///
/// At most one entry per id. Mutation happens only through [`replace`](Self::replace)
/// and [`apply_event`](Self::apply_event); every effective mutation bumps
/// [`revision`](Self::revision).
#[derive(Debug, Clone, Default)]
pub struct JobCollection {
    entries: IndexMap<String, JobRecord>,
    revision: u64,
}

impl JobCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap the whole content for `records`, keeping their order
    ///
    /// A repeated id keeps the position of its first occurrence and the
    /// content of its last.
    pub fn replace(&mut self, records: Vec<JobRecord>) {
        let mut entries = IndexMap::with_capacity(records.len());
        for record in records {
            entries.insert(record.id.clone(), record);
        }
        self.entries = entries;
        self.bump();
    }

    /// Apply one change event in place
    pub fn apply_event(&mut self, event: &ChangeEvent) -> Applied {
        match event.action {
            EventAction::Create | EventAction::Update => self.upsert(&event.record),
            EventAction::Delete => self.remove(event.record_id()),
            EventAction::Unknown => Applied::Ignored,
        }
    }

    fn upsert(&mut self, record: &JobRecord) -> Applied {
        let applied = match self.entries.entry(record.id.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get() == record {
                    Applied::Unchanged
                } else {
                    slot.insert(record.clone());
                    Applied::Replaced
                }
            }
            Entry::Vacant(slot) => {
                slot.shift_insert(0, record.clone());
                Applied::Inserted
            }
        };
        if applied.changed() {
            self.bump();
        }
        applied
    }

    fn remove(&mut self, id: &str) -> Applied {
        match self.entries.shift_remove(id) {
            Some(_) => {
                self.bump();
                Applied::Removed
            }
            None => Applied::Unchanged,
        }
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.entries.clear();
        self.bump();
    }

    pub fn get(&self, id: &str) -> Option<&JobRecord> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Position of `id` in cache order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.get_index_of(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobRecord> {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<JobRecord> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Monotonic counter of effective mutations
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
