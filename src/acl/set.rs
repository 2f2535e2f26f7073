//! ACL sets
//!
//! An [`AclSet`] is the ordered collection of entries anchored at one
//! resource path.

use crate::acl::entry::{AclEntry, AclEntryView, EntryId, Priority, priority_key};
use crate::error::AclError;
use serde::Serialize;

/// Entries anchored at a single base path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclSet {
    base: String,
    entries: Vec<AclEntry>,
}

/// Outcome of removing a member from a set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemberRemoval {
    /// Entries that lost the member but still have others
    pub updated: Vec<EntryId>,
    /// Entries dropped because the member was their last one
    pub removed: Vec<EntryId>,
}

impl MemberRemoval {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn merge(&mut self, other: MemberRemoval) {
        self.updated.extend(other.updated);
        self.removed.extend(other.removed);
    }
}

impl AclSet {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            entries: Vec::new(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn position(&self, id: EntryId) -> Result<usize, AclError> {
        self.entries
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| AclError::EntryNotFound { id: id.to_string() })
    }

    /// Append an entry under a fresh id, assigning an auto priority unless
    /// it has an explicit one
    pub fn add(&mut self, entry: AclEntry) -> Result<EntryId, AclError> {
        entry.validate()?;
        let id = EntryId::next();
        let mut entry = entry.with_id(id);
        let next = Priority::next_auto(self.entries.iter().map(AclEntry::priority));
        entry.assign_auto_priority(next);
        self.entries.push(entry);
        Ok(id)
    }

    /// Remove an entry by id
    pub fn remove(&mut self, id: EntryId) -> Result<AclEntry, AclError> {
        let idx = self.position(id)?;
        Ok(self.entries.remove(idx))
    }

    /// Replace the entry with the given id, keeping id, insertion position
    /// and auto priority
    pub fn replace(&mut self, id: EntryId, entry: AclEntry) -> Result<(), AclError> {
        entry.validate()?;
        let idx = self.position(id)?;

        // An unprioritized replacement takes over the old auto slot
        let slot = match self.entries[idx].priority() {
            Some(Priority::Auto(v)) => v,
            _ => Priority::next_auto(
                self.entries
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != idx)
                    .map(|(_, e)| e.priority()),
            ),
        };
        let mut entry = entry.with_id(id);
        entry.assign_auto_priority(slot);
        self.entries[idx] = entry;
        Ok(())
    }

    /// Drop `member` from every entry; entries left without members are removed
    pub fn remove_for_member(&mut self, member: &str) -> MemberRemoval {
        let mut outcome = MemberRemoval::default();

        self.entries.retain_mut(|entry| {
            if !entry.remove_member(member) {
                return true;
            }
            if entry.members().is_empty() {
                outcome.removed.push(entry.id());
                false
            } else {
                outcome.updated.push(entry.id());
                true
            }
        });

        outcome
    }

    pub fn get(&self, id: EntryId) -> Option<&AclEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// Entries in evaluation order: ascending priority, then insertion order
    pub fn entries(&self) -> Vec<&AclEntry> {
        let mut entries: Vec<&AclEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| priority_key(e.priority()));
        entries
    }

    /// Entries in insertion order, paired with their insertion index
    pub(crate) fn indexed_entries(&self) -> impl Iterator<Item = (usize, &AclEntry)> {
        self.entries.iter().enumerate()
    }

    /// First entry that delegates to `role`, if any
    pub fn references(&self, role: &str) -> Option<EntryId> {
        self.entries
            .iter()
            .find(|e| e.role() == Some(role))
            .map(AclEntry::id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn view(&self) -> AclSetView {
        AclSetView {
            base: self.base.clone(),
            entries: self.entries().into_iter().map(AclEntry::view).collect(),
        }
    }
}

/// Serializable form of an ACL set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclSetView {
    pub base: String,
    pub entries: Vec<AclEntryView>,
}
