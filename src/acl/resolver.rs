//! ACL resolver
//!
//! Decides whether a subject may perform an action on a resource path.
//!
//! Resolution works on the scope chain of the requested base: the base
//! itself and every ancestor up to the resolver's root. Entries of the ACL
//! sets anchored along that chain become candidates when
//! 1. one of their members matches the subject, and
//! 2. their scope reaches the base (`one` only applies at its own anchor).
//!
//! Role entries are expanded into the role's rules, keeping the entry's
//! members and priority. Candidates are then ordered by
//! 1. priority (lower first),
//! 2. anchor distance (closer first),
//! 3. explicit before auto priority,
//! 4. insertion order,
//!
//! and walked in that order. The first action granting the permission on
//! the topic allows access. A matching `reset` revokes every later `one`
//! and `sub` candidate anchored at or beyond its own anchor; `psub`
//! candidates are never revoked.

use crate::acl::entry::{AclEntry, EntryId, Grant, RoleEntry, priority_key};
use crate::acl::path;
use crate::acl::role::{AclRole, AclRoleView, RoleRegistry};
use crate::acl::set::{AclSet, AclSetView, MemberRemoval};
use crate::acl::types::{Action, Options, Permission, Scope};
use crate::config::AclConfig;
use crate::error::{AccessDeniedError, AclError};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, trace, warn};

/// Result of an access evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Access is allowed
    Allowed,
    /// Access is denied with a reason
    Denied(String),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessDecision::Denied(_))
    }
}

/// Sets and roles, guarded together
#[derive(Debug, Clone, Default)]
struct AclState {
    sets: BTreeMap<String, AclSet>,
    roles: RoleRegistry,
}

impl AclState {
    fn ensure_role_exists(&self, role: Option<&str>) -> Result<(), AclError> {
        match role {
            Some(name) if !self.roles.contains(name) => Err(AclError::RoleNotFound {
                name: name.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn base_of(&self, id: EntryId) -> Option<String> {
        self.sets
            .values()
            .find(|set| set.get(id).is_some())
            .map(|set| set.base().to_string())
    }
}

/// One rule taking part in a single evaluation
#[derive(Debug)]
struct Candidate<'a> {
    priority: (i32, u8),
    distance: usize,
    order: (usize, usize),
    scope: Scope,
    actions: &'a [Action],
    anchor: &'a str,
    entry: EntryId,
}

impl Candidate<'_> {
    fn sort_key(&self) -> (i32, usize, u8, usize, usize) {
        (
            self.priority.0,
            self.distance,
            self.priority.1,
            self.order.0,
            self.order.1,
        )
    }
}

/// ACL resolution engine
///
/// Holds every ACL set and role behind a single reader-writer lock;
/// checks take the read side, mutations the write side. Every mutation
/// validates before it touches the state.
pub struct AclResolver {
    /// Root of the resource tree
    base: String,
    /// Topic prefix used for the engine's own permissions
    domain: String,
    state: RwLock<AclState>,
    /// Fast-path allow list, swapped as a whole on change
    admins: RwLock<Arc<HashSet<String>>>,
}

impl AclResolver {
    /// Create an empty resolver rooted at `base`
    pub fn new(base: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            domain: domain.into(),
            state: RwLock::new(AclState::default()),
            admins: RwLock::new(Arc::new(HashSet::new())),
        }
    }

    /// Create a resolver populated from configuration.
    ///
    /// All role names are registered before any role entry is built, so
    /// roles may reference roles declared later.
    pub fn from_config(config: &AclConfig) -> Result<Self, AclError> {
        let mut state = AclState::default();

        for role in &config.roles {
            state.roles.add_role(AclRole::new(&role.name))?;
        }
        for role in &config.roles {
            for entry_config in &role.entries {
                let entry = RoleEntry::from_config(entry_config, &state.roles)?;
                state
                    .roles
                    .get_mut(&role.name)
                    .ok_or_else(|| AclError::RoleNotFound {
                        name: role.name.clone(),
                    })?
                    .add(entry)?;
            }
        }

        for set in &config.sets {
            for entry_config in &set.entries {
                let entry = AclEntry::from_config(entry_config, &state.roles)?;
                state
                    .sets
                    .entry(set.base.clone())
                    .or_insert_with(|| AclSet::new(&set.base))
                    .add(entry)?;
            }
        }

        let admins: HashSet<String> = config.admins.iter().cloned().collect();

        info!(
            base = %config.base,
            sets = state.sets.len(),
            roles = state.roles.len(),
            admins = admins.len(),
            "ACL resolver initialized"
        );

        Ok(Self {
            base: config.base.clone(),
            domain: config.domain.clone(),
            state: RwLock::new(state),
            admins: RwLock::new(Arc::new(admins)),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    // Lock helpers recover from poisoning: mutations validate before they
    // write, so a panicking writer cannot leave half-applied state behind.

    fn read_state(&self) -> RwLockReadGuard<'_, AclState> {
        self.state.read().unwrap_or_else(|poisoned| {
            warn!("ACL state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, AclState> {
        self.state.write().unwrap_or_else(|poisoned| {
            warn!("ACL state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn admin_snapshot(&self) -> Arc<HashSet<String>> {
        let guard = self.admins.read().unwrap_or_else(|poisoned| {
            warn!("ACL admin lock poisoned, recovering");
            poisoned.into_inner()
        });
        Arc::clone(&guard)
    }

    fn update_admins(&self, f: impl FnOnce(&mut HashSet<String>) -> bool) -> bool {
        let mut guard = self.admins.write().unwrap_or_else(|poisoned| {
            warn!("ACL admin lock poisoned, recovering");
            poisoned.into_inner()
        });
        let mut next = HashSet::clone(&guard);
        let changed = f(&mut next);
        if changed {
            *guard = Arc::new(next);
        }
        changed
    }

    /// Check if `subject` may use `permission` on `topic` at `base`.
    ///
    /// `base` defaults to the resolver's root. `options` are matched
    /// against the option constraints of granting actions; `None` and an
    /// empty map both leave constraints unchecked. Returns
    /// `Ok(false)` for a plain denial; errors are reserved for rules that
    /// cannot be evaluated, such as a role cycle.
    pub fn check(
        &self,
        subject: &str,
        topic: &str,
        permission: char,
        options: Option<&Options>,
        base: Option<&str>,
    ) -> Result<bool, AclError> {
        self.evaluate(subject, topic, permission, options, base)
            .map(|decision| decision.is_allowed())
    }

    /// Like [`check`](Self::check), with the reason for a denial
    pub fn evaluate(
        &self,
        subject: &str,
        topic: &str,
        permission: char,
        options: Option<&Options>,
        base: Option<&str>,
    ) -> Result<AccessDecision, AclError> {
        let base = base.unwrap_or(&self.base);

        debug!(
            subject,
            topic,
            permission = %permission,
            base,
            "Checking access"
        );

        if self.admin_snapshot().contains(subject) {
            trace!(subject, "Subject is an administrator");
            return Ok(AccessDecision::Allowed);
        }

        let permission = Permission::try_from(permission)?;
        let state = self.read_state();
        let candidates = self.collect_candidates(&state, subject, base)?;

        let mut reset_from: Option<usize> = None;
        for candidate in &candidates {
            if candidate.scope == Scope::Reset {
                trace!(
                    entry = %candidate.entry,
                    anchor = candidate.anchor,
                    "Matched reset"
                );
                reset_from =
                    Some(reset_from.map_or(candidate.distance, |d| d.min(candidate.distance)));
                continue;
            }

            if let Some(limit) = reset_from
                && candidate.scope.is_resettable()
                && candidate.distance >= limit
            {
                trace!(
                    entry = %candidate.entry,
                    anchor = candidate.anchor,
                    "Skipping entry revoked by reset"
                );
                continue;
            }

            if candidate
                .actions
                .iter()
                .any(|action| action.grants(topic, permission, options))
            {
                debug!(
                    subject,
                    topic,
                    entry = %candidate.entry,
                    anchor = candidate.anchor,
                    "Access granted"
                );
                return Ok(AccessDecision::Allowed);
            }
        }

        let reason = match reset_from {
            Some(_) => format!("permission '{}' revoked by a reset rule", permission),
            None => format!("no rule grants '{}' at '{}'", permission, base),
        };
        debug!(subject, topic, reason = %reason, "Access denied");
        Ok(AccessDecision::Denied(reason))
    }

    /// Gather and order the candidates for one evaluation
    fn collect_candidates<'a>(
        &self,
        state: &'a AclState,
        subject: &str,
        base: &str,
    ) -> Result<Vec<Candidate<'a>>, AclError> {
        let mut candidates = Vec::new();

        for (distance, anchor) in path::scope_chain(base, &self.base).into_iter().enumerate() {
            let Some(set) = state.sets.get(anchor) else {
                continue;
            };

            for (index, entry) in set.indexed_entries() {
                if !entry.matches_member(subject) {
                    continue;
                }

                let priority = priority_key(entry.priority());
                let mut push = |scope: Scope, actions: &'a [Action], sub_index: usize| {
                    if scope.reaches(distance) {
                        candidates.push(Candidate {
                            priority,
                            distance,
                            order: (index, sub_index),
                            scope,
                            actions,
                            anchor: set.base(),
                            entry: entry.id(),
                        });
                    }
                };

                match entry.grant() {
                    Grant::Actions(actions) => push(entry.scope().unwrap_or_default(), actions, 0),
                    Grant::Reset => push(Scope::Reset, &[], 0),
                    Grant::Role(role) => {
                        let rules = state.roles.resolve(role, &mut Vec::new())?;
                        for (sub_index, rule) in rules.into_iter().enumerate() {
                            push(rule.scope, rule.actions, sub_index);
                        }
                    }
                }
            }
        }

        candidates.sort_by_key(Candidate::sort_key);
        trace!(count = candidates.len(), base, "Collected candidates");
        Ok(candidates)
    }

    /// Check access, returning an error if denied.
    ///
    /// Rules that cannot be evaluated deny access.
    pub fn require(
        &self,
        subject: &str,
        topic: &str,
        permission: char,
        options: Option<&Options>,
        base: Option<&str>,
    ) -> Result<(), AccessDeniedError> {
        match self.evaluate(subject, topic, permission, options, base) {
            Ok(AccessDecision::Allowed) => Ok(()),
            Ok(AccessDecision::Denied(reason)) => {
                Err(AccessDeniedError::new(subject, topic, reason))
            }
            Err(e) => {
                warn!(subject, topic, error = %e, "ACL evaluation failed, denying access");
                Err(AccessDeniedError::evaluation_failed(subject, topic, &e))
            }
        }
    }

    // -------------------------------------------------------------------
    // Administrators
    // -------------------------------------------------------------------

    pub fn is_admin(&self, subject: &str) -> bool {
        self.admin_snapshot().contains(subject)
    }

    /// Add a subject to the fast-path allow list
    pub fn add_admin(&self, subject: impl Into<String>) -> bool {
        let subject = subject.into();
        info!(subject = %subject, "Adding ACL administrator");
        self.update_admins(|admins| admins.insert(subject))
    }

    pub fn remove_admin(&self, subject: &str) -> bool {
        info!(subject, "Removing ACL administrator");
        self.update_admins(|admins| admins.remove(subject))
    }

    pub fn admins(&self) -> Arc<HashSet<String>> {
        self.admin_snapshot()
    }

    // -------------------------------------------------------------------
    // ACL sets and entries
    // -------------------------------------------------------------------

    /// Install a set; entries are appended if a set already exists at its base
    pub fn add_acl_set(&self, set: AclSet) -> Result<(), AclError> {
        let mut state = self.write_state();

        for entry in set.entries() {
            state.ensure_role_exists(entry.role())?;
        }

        let mut merged = state
            .sets
            .get(set.base())
            .cloned()
            .unwrap_or_else(|| AclSet::new(set.base()));
        for entry in set.entries() {
            merged.add(entry.clone())?;
        }

        info!(base = set.base(), entries = set.len(), "Adding ACL set");
        if !merged.is_empty() {
            state.sets.insert(set.base().to_string(), merged);
        }
        Ok(())
    }

    /// Remove the whole set anchored at `base`
    pub fn remove_aclset_by_base(&self, base: &str) -> Result<AclSet, AclError> {
        let removed = self
            .write_state()
            .sets
            .remove(base)
            .ok_or_else(|| AclError::AclSetNotFound {
                base: base.to_string(),
            })?;
        info!(base, entries = removed.len(), "Removed ACL set");
        Ok(removed)
    }

    /// Add one entry at `base`, creating the set if needed
    pub fn add_acl(&self, base: &str, entry: AclEntry) -> Result<EntryId, AclError> {
        let mut state = self.write_state();
        state.ensure_role_exists(entry.role())?;
        entry.validate()?;

        let id = state
            .sets
            .entry(base.to_string())
            .or_insert_with(|| AclSet::new(base))
            .add(entry)?;
        info!(base, entry = %id, "Added ACL entry");
        Ok(id)
    }

    /// Replace an existing entry, keeping its id and position
    pub fn update_acl(&self, id: EntryId, entry: AclEntry) -> Result<(), AclError> {
        let mut state = self.write_state();
        state.ensure_role_exists(entry.role())?;

        let base = state
            .base_of(id)
            .ok_or_else(|| AclError::EntryNotFound { id: id.to_string() })?;
        if let Some(set) = state.sets.get_mut(&base) {
            set.replace(id, entry)?;
        }
        info!(base = %base, entry = %id, "Updated ACL entry");
        Ok(())
    }

    /// Remove an entry; its set goes away with its last entry
    pub fn remove_acl(&self, id: EntryId) -> Result<AclEntry, AclError> {
        let mut state = self.write_state();
        let base = state
            .base_of(id)
            .ok_or_else(|| AclError::EntryNotFound { id: id.to_string() })?;

        let set = state
            .sets
            .get_mut(&base)
            .ok_or_else(|| AclError::AclSetNotFound { base: base.clone() })?;
        let removed = set.remove(id)?;
        if set.is_empty() {
            state.sets.remove(&base);
        }

        info!(base = %base, entry = %id, "Removed ACL entry");
        Ok(removed)
    }

    /// Remove `subject` from the member list of every entry.
    ///
    /// Entries left without members are deleted, and so are sets left
    /// without entries. Roles carry no members and are unaffected.
    pub fn remove_acls_for_user(&self, subject: &str) -> MemberRemoval {
        let mut state = self.write_state();
        let mut outcome = MemberRemoval::default();

        for set in state.sets.values_mut() {
            outcome.merge(set.remove_for_member(subject));
        }
        state.sets.retain(|_, set| !set.is_empty());

        info!(
            subject,
            updated = outcome.updated.len(),
            removed = outcome.removed.len(),
            "Removed ACL memberships"
        );
        outcome
    }

    // -------------------------------------------------------------------
    // Roles
    // -------------------------------------------------------------------

    /// Register a role
    pub fn add_acl_role(&self, role: AclRole) -> Result<(), AclError> {
        let mut state = self.write_state();
        for entry in role.entries() {
            state.ensure_role_exists(entry.role())?;
        }
        info!(role = role.name(), entries = role.len(), "Adding ACL role");
        state.roles.add_role(role)
    }

    /// Append an entry to a registered role
    pub fn add_role_entry(&self, role: &str, entry: RoleEntry) -> Result<EntryId, AclError> {
        let mut state = self.write_state();
        state.ensure_role_exists(entry.role())?;

        let id = state
            .roles
            .get_mut(role)
            .ok_or_else(|| AclError::RoleNotFound {
                name: role.to_string(),
            })?
            .add(entry)?;
        info!(role, entry = %id, "Added role entry");
        Ok(id)
    }

    /// Replace a role entry, keeping its id and position
    pub fn update_role_entry(&self, id: EntryId, entry: RoleEntry) -> Result<(), AclError> {
        let mut state = self.write_state();
        state.ensure_role_exists(entry.role())?;

        let role = state
            .roles
            .find_entry_mut(id)
            .ok_or_else(|| AclError::EntryNotFound { id: id.to_string() })?;
        role.replace(id, entry)?;
        info!(role = role.name(), entry = %id, "Updated role entry");
        Ok(())
    }

    /// Remove an entry from whichever role holds it
    pub fn remove_role_entry(&self, id: EntryId) -> Result<RoleEntry, AclError> {
        let mut state = self.write_state();
        let role = state
            .roles
            .find_entry_mut(id)
            .ok_or_else(|| AclError::EntryNotFound { id: id.to_string() })?;
        let removed = role.remove(id)?;
        info!(role = role.name(), entry = %id, "Removed role entry");
        Ok(removed)
    }

    /// Remove a role that no entry references any more
    pub fn remove_role(&self, name: &str) -> Result<AclRole, AclError> {
        let mut state = self.write_state();
        let AclState { sets, roles } = &mut *state;
        let removed = roles.remove_role(name, sets.values())?;
        info!(role = name, "Removed ACL role");
        Ok(removed)
    }

    /// Run `f` with read access to the role registry, e.g. to build
    /// entries that use roles
    pub fn with_roles<T>(&self, f: impl FnOnce(&RoleRegistry) -> T) -> T {
        f(&self.read_state().roles)
    }

    // -------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------

    /// List ACL sets at or below `base`.
    ///
    /// With a `topic`, only entries with an action whose topic pattern
    /// matches it are listed (role entries through their resolved rules).
    pub fn get_acls(&self, base: Option<&str>, topic: Option<&str>) -> Vec<AclSetView> {
        let state = self.read_state();

        state
            .sets
            .values()
            .filter(|set| base.is_none_or(|b| path::is_below(set.base(), b)))
            .filter_map(|set| {
                let mut view = set.view();
                if let Some(topic) = topic {
                    view.entries.retain(|entry| {
                        set.get(entry.id)
                            .is_some_and(|e| Self::entry_mentions_topic(&state, e, topic))
                    });
                }
                (!view.entries.is_empty()).then_some(view)
            })
            .collect()
    }

    fn entry_mentions_topic(state: &AclState, entry: &AclEntry, topic: &str) -> bool {
        match entry.grant() {
            Grant::Actions(actions) => actions.iter().any(|a| a.matches_topic(topic)),
            Grant::Reset => true,
            Grant::Role(role) => match state.roles.resolve_role(role) {
                Ok(rules) => rules
                    .iter()
                    .any(|rule| rule.actions.iter().any(|a| a.matches_topic(topic))),
                Err(e) => {
                    warn!(role = %role, error = %e, "Cannot resolve role while listing ACLs");
                    false
                }
            },
        }
    }

    /// List all roles
    pub fn get_roles(&self) -> Vec<AclRoleView> {
        self.read_state().roles.roles().map(AclRole::view).collect()
    }

    /// Base path of the set holding the entry with the given id
    pub fn base_of(&self, id: EntryId) -> Option<String> {
        self.read_state().base_of(id)
    }

    /// Name of the role holding the role entry with the given id
    pub fn role_of(&self, id: EntryId) -> Option<String> {
        self.read_state()
            .roles
            .find_entry(id)
            .map(|(role, _)| role.name().to_string())
    }

    pub fn set_count(&self) -> usize {
        self.read_state().sets.len()
    }

    pub fn role_count(&self) -> usize {
        self.read_state().roles.len()
    }

    /// Drop every set, role and administrator
    pub fn clear(&self) {
        *self.write_state() = AclState::default();
        self.update_admins(|admins| {
            let changed = !admins.is_empty();
            admins.clear();
            changed
        });
        info!("ACL resolver cleared");
    }
}

impl Default for AclResolver {
    fn default() -> Self {
        Self::new("", "org.gosa")
    }
}
