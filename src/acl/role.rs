//! ACL roles
//!
//! A role is a named bundle of [`RoleEntry`] rules that ACL entries can
//! delegate to. Roles may reference other roles; [`RoleRegistry::resolve`]
//! flattens such references depth-first and reports cycles.

use crate::acl::entry::{EntryId, Grant, Priority, RoleEntry, RoleEntryView, priority_key};
use crate::acl::set::AclSet;
use crate::acl::types::{Action, Scope};
use crate::error::AclError;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

/// A named collection of role entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclRole {
    name: String,
    entries: Vec<RoleEntry>,
}

impl AclRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an entry under a fresh id, assigning an auto priority unless
    /// it has an explicit one
    pub fn add(&mut self, entry: RoleEntry) -> Result<EntryId, AclError> {
        entry.validate()?;
        let id = EntryId::next();
        let mut entry = entry.with_id(id);
        let next = Priority::next_auto(self.entries.iter().map(RoleEntry::priority));
        entry.assign_auto_priority(next);
        self.entries.push(entry);
        Ok(id)
    }

    /// Remove an entry by id
    pub fn remove(&mut self, id: EntryId) -> Result<RoleEntry, AclError> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| AclError::EntryNotFound { id: id.to_string() })?;
        Ok(self.entries.remove(idx))
    }

    /// Replace the entry with the given id, keeping id, position and auto
    /// priority
    pub fn replace(&mut self, id: EntryId, entry: RoleEntry) -> Result<(), AclError> {
        entry.validate()?;
        let idx = self
            .entries
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| AclError::EntryNotFound { id: id.to_string() })?;

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

    pub fn get(&self, id: EntryId) -> Option<&RoleEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// Entries in evaluation order: ascending priority, then insertion order
    pub fn entries(&self) -> Vec<&RoleEntry> {
        let mut entries: Vec<&RoleEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| priority_key(e.priority()));
        entries
    }

    /// First entry that delegates to `role`, if any
    pub fn references(&self, role: &str) -> Option<EntryId> {
        self.entries
            .iter()
            .find(|e| e.role() == Some(role))
            .map(RoleEntry::id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn view(&self) -> AclRoleView {
        AclRoleView {
            name: self.name.clone(),
            entries: self.entries().into_iter().map(RoleEntry::view).collect(),
        }
    }
}

/// Serializable form of a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclRoleView {
    pub name: String,
    pub entries: Vec<RoleEntryView>,
}

/// One effective rule produced by resolving a role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRule<'a> {
    pub scope: Scope,
    pub actions: &'a [Action],
}

/// Registry of roles, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRegistry {
    roles: BTreeMap<String, AclRole>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a role; names are unique
    pub fn add_role(&mut self, role: AclRole) -> Result<(), AclError> {
        if self.roles.contains_key(role.name()) {
            return Err(AclError::DuplicateRole {
                name: role.name().to_string(),
            });
        }
        self.roles.insert(role.name().to_string(), role);
        Ok(())
    }

    /// Remove a role unless an entry in `sets` or in another role still
    /// references it
    pub fn remove_role<'s>(
        &mut self,
        name: &str,
        sets: impl IntoIterator<Item = &'s AclSet>,
    ) -> Result<AclRole, AclError> {
        if !self.roles.contains_key(name) {
            return Err(AclError::RoleNotFound {
                name: name.to_string(),
            });
        }

        let in_sets = sets
            .into_iter()
            .find_map(|set| set.references(name).map(|id| (set.base().to_string(), id)));
        if let Some((base, id)) = in_sets {
            return Err(AclError::RoleInUse {
                name: name.to_string(),
                referenced_by: format!("{} in ACL set '{}'", id, base),
            });
        }

        let in_roles = self
            .roles
            .values()
            .filter(|role| role.name() != name)
            .find_map(|role| role.references(name).map(|id| (role.name().to_string(), id)));
        if let Some((role, id)) = in_roles {
            return Err(AclError::RoleInUse {
                name: name.to_string(),
                referenced_by: format!("{} in role '{}'", id, role),
            });
        }

        self.roles.remove(name).ok_or_else(|| AclError::RoleNotFound {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&AclRole> {
        self.roles.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AclRole> {
        self.roles.get_mut(name)
    }

    pub fn roles(&self) -> impl Iterator<Item = &AclRole> {
        self.roles.values()
    }

    /// Find the role owning the entry with the given id
    pub fn find_entry(&self, id: EntryId) -> Option<(&AclRole, &RoleEntry)> {
        self.roles
            .values()
            .find_map(|role| role.get(id).map(|entry| (role, entry)))
    }

    pub fn find_entry_mut(&mut self, id: EntryId) -> Option<&mut AclRole> {
        self.roles.values_mut().find(|role| role.get(id).is_some())
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Flatten a role into its effective rules, expanding nested role
    /// references depth-first.
    ///
    /// `visited` holds the chain of roles currently being expanded. It is
    /// owned by the caller's stack, so concurrent resolutions never share it.
    pub fn resolve<'a>(
        &'a self,
        name: &str,
        visited: &mut Vec<String>,
    ) -> Result<Vec<ResolvedRule<'a>>, AclError> {
        if visited.iter().any(|v| v == name) {
            let mut chain = visited.clone();
            chain.push(name.to_string());
            return Err(AclError::RoleRecursion {
                name: name.to_string(),
                chain,
            });
        }

        let role = self.get(name).ok_or_else(|| AclError::RoleNotFound {
            name: name.to_string(),
        })?;

        trace!(role = name, depth = visited.len(), "Resolving role");
        visited.push(name.to_string());

        let mut resolved = Vec::new();
        for entry in role.entries() {
            match entry.grant() {
                Grant::Role(inner) => resolved.extend(self.resolve(inner, visited)?),
                Grant::Actions(actions) => resolved.push(ResolvedRule {
                    scope: entry.scope().unwrap_or_default(),
                    actions,
                }),
                Grant::Reset => resolved.push(ResolvedRule {
                    scope: Scope::Reset,
                    actions: &[],
                }),
            }
        }

        visited.pop();
        Ok(resolved)
    }

    /// Resolve a role starting from an empty chain
    pub fn resolve_role(&self, name: &str) -> Result<Vec<ResolvedRule<'_>>, AclError> {
        self.resolve(name, &mut Vec::new())
    }
}
