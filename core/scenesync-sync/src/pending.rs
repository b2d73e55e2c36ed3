//! The pending change set: at most one unflushed change per entity path.

use scenesync_types::{ChangeAction, ChangeRecord, ChangeType, EntityPath, Timestamp};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// One path's unflushed change.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub change: ChangeRecord,
    pub change_type: ChangeType,
    /// Capture time of the most recent mutation.
    pub last_mutation: Timestamp,
    /// Bumped on every write to this entry. A flush removes the entry only
    /// if the revision it pushed is still current.
    pub revision: u64,
    /// Revision at which the path first entered the set; orders batches.
    first_seen: u64,
}

/// A settled entry copied out for pushing.
#[derive(Debug, Clone, PartialEq)]
pub struct SettledEntry {
    pub path: EntityPath,
    pub change: ChangeRecord,
    pub change_type: ChangeType,
    pub last_mutation: Timestamp,
    pub revision: u64,
}

/// What one applied remote write replaced on a path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overwrite {
    /// The entity itself was created or destroyed.
    pub entity: bool,
    pub properties: BTreeSet<String>,
    pub attributes: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct PendingChangeSet {
    entries: HashMap<EntityPath, PendingEntry>,
    next_revision: u64,
}

impl PendingChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &EntityPath) -> Option<&PendingEntry> {
        self.entries.get(path)
    }

    /// Writes `change` for `path`, replacing any previous content in place.
    /// Returns the new revision.
    pub fn upsert(
        &mut self,
        path: EntityPath,
        change: ChangeRecord,
        change_type: ChangeType,
        now: Timestamp,
    ) -> u64 {
        self.next_revision += 1;
        let revision = self.next_revision;
        match self.entries.get_mut(&path) {
            Some(entry) => {
                entry.change = change;
                entry.change_type = change_type;
                entry.last_mutation = now;
                entry.revision = revision;
            }
            None => {
                self.entries.insert(
                    path,
                    PendingEntry {
                        change,
                        change_type,
                        last_mutation: now,
                        revision,
                        first_seen: revision,
                    },
                );
            }
        }
        revision
    }

    /// Copies out every entry quiet for at least `settle`, in first-capture
    /// order. The set itself is left untouched.
    pub fn settled(&self, now: Timestamp, settle: Duration) -> Vec<SettledEntry> {
        let mut settled: Vec<(&EntityPath, &PendingEntry)> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.since(entry.last_mutation) >= settle)
            .collect();
        settled.sort_by_key(|(_, entry)| entry.first_seen);
        settled
            .into_iter()
            .map(|(path, entry)| SettledEntry {
                path: path.clone(),
                change: entry.change.clone(),
                change_type: entry.change_type,
                last_mutation: entry.last_mutation,
                revision: entry.revision,
            })
            .collect()
    }

    pub fn settled_count(&self, now: Timestamp, settle: Duration) -> usize {
        self.entries
            .values()
            .filter(|entry| now.since(entry.last_mutation) >= settle)
            .count()
    }

    /// Removes the pushed entries that were not re-mutated since they were
    /// copied out. Returns how many were removed.
    pub fn remove_flushed(&mut self, flushed: &[SettledEntry]) -> usize {
        let mut removed = 0;
        for pushed in flushed {
            if self
                .entries
                .get(&pushed.path)
                .is_some_and(|entry| entry.revision == pushed.revision)
            {
                self.entries.remove(&pushed.path);
                removed += 1;
            }
        }
        removed
    }

    /// Forgets the part of `path`'s pending change that a remote write
    /// stamped `at` replaced. The live entity already holds the remote
    /// values, so pushing the local ones later would undo a newer write.
    ///
    /// A local change made after `at` is kept whole. An `update` left with no
    /// fields is dropped. Returns true if the set changed.
    pub fn supersede(&mut self, path: &EntityPath, at: Timestamp, overwrite: &Overwrite) -> bool {
        let Some(entry) = self.entries.get_mut(path) else {
            return false;
        };
        if entry.last_mutation > at {
            return false;
        }
        if overwrite.entity {
            self.entries.remove(path);
            return true;
        }
        let Some(record) = entry.change.record.as_mut() else {
            return false;
        };

        let before = record.properties.len() + record.attributes.len();
        record
            .properties
            .retain(|name, _| !overwrite.properties.contains(name));
        record
            .attributes
            .retain(|name, _| !overwrite.attributes.contains(name));
        let retracted = record.properties.len() + record.attributes.len() < before;
        let emptied = entry.change.action == ChangeAction::Update
            && record.properties.is_empty()
            && record.attributes.is_empty()
            && record.children.is_none();

        if emptied {
            self.entries.remove(path);
            true
        } else if retracted {
            // An in-flight push of the old content must not clear the entry.
            self.next_revision += 1;
            entry.revision = self.next_revision;
            true
        } else {
            false
        }
    }

    /// Last local mutation time for a path, if one is pending.
    pub fn last_mutation(&self, path: &EntityPath) -> Option<Timestamp> {
        self.entries.get(path).map(|entry| entry.last_mutation)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityPath, &PendingEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
