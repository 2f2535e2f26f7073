//! ACL entries
//!
//! An [`AclEntry`] is one rule inside an ACL set: a member list, a priority
//! and either a list of actions, a role reference, or nothing at all for
//! `reset` entries. A [`RoleEntry`] is the same rule without members, stored
//! inside a role.

use crate::acl::patterns::PatternMatcher;
use crate::acl::role::RoleRegistry;
use crate::acl::types::{Action, Options, Scope, validate_priority};
use crate::config::{AclEntryConfig, ActionConfig, RoleEntryConfig};
use crate::error::AclError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of an entry, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Priority of an entry; lower values are evaluated first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Set by an administrator
    Explicit(i32),
    /// Assigned by the owning set or role on insertion
    Auto(i32),
}

impl Priority {
    pub const fn value(&self) -> i32 {
        match self {
            Priority::Explicit(v) | Priority::Auto(v) => *v,
        }
    }

    /// Sort key: by value, explicit before auto on equal values
    pub const fn sort_key(&self) -> (i32, u8) {
        match self {
            Priority::Explicit(v) => (*v, 0),
            Priority::Auto(v) => (*v, 1),
        }
    }

    /// Next auto priority after the given ones: one past the highest auto
    /// priority, or 0 when there is none yet
    pub fn next_auto(existing: impl IntoIterator<Item = Option<Priority>>) -> i32 {
        existing
            .into_iter()
            .filter_map(|p| match p {
                Some(Priority::Auto(v)) => Some(v),
                _ => None,
            })
            .max()
            .map_or(0, |max| max.saturating_add(1))
    }
}

/// Sort key for an entry that may not have been given a priority yet
pub(crate) fn priority_key(priority: Option<Priority>) -> (i32, u8) {
    priority.map_or((0, 1), |p| p.sort_key())
}

/// What an entry grants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Literal actions (possibly still empty while the entry is being built)
    Actions(Vec<Action>),
    /// Delegation to a named role
    Role(String),
    /// Revocation only
    Reset,
}

/// State shared by set entries and role entries
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    scope: Option<Scope>,
    priority: Option<Priority>,
    grant: Grant,
}

impl Rule {
    fn new(scope: Option<Scope>) -> Self {
        let grant = match scope {
            Some(Scope::Reset) => Grant::Reset,
            _ => Grant::Actions(Vec::new()),
        };
        Self {
            scope,
            priority: None,
            grant,
        }
    }

    fn use_role(&mut self, name: &str, roles: &RoleRegistry) -> Result<(), AclError> {
        match (&self.grant, self.scope) {
            (Grant::Reset, _) => {
                return Err(AclError::scope_conflict(
                    "reset entries cannot reference a role",
                ));
            }
            (_, Some(scope)) => {
                return Err(AclError::scope_conflict(format!(
                    "entry has explicit scope '{}', but role '{}' supplies its own scopes",
                    scope, name
                )));
            }
            (Grant::Actions(actions), None) if !actions.is_empty() => {
                return Err(AclError::RoleActionConflict);
            }
            _ => {}
        }

        if !roles.contains(name) {
            return Err(AclError::RoleNotFound {
                name: name.to_string(),
            });
        }

        self.grant = Grant::Role(name.to_string());
        Ok(())
    }

    fn add_action(&mut self, action: Action) -> Result<(), AclError> {
        match &mut self.grant {
            Grant::Actions(actions) => {
                actions.push(action);
                Ok(())
            }
            Grant::Role(_) => Err(AclError::RoleActionConflict),
            Grant::Reset => Err(AclError::scope_conflict("reset entries carry no actions")),
        }
    }

    fn set_priority(&mut self, priority: i64) -> Result<(), AclError> {
        self.priority = Some(Priority::Explicit(validate_priority(priority)?));
        Ok(())
    }

    fn effective_scope(&self) -> Option<Scope> {
        match self.grant {
            Grant::Role(_) => None,
            Grant::Reset => Some(Scope::Reset),
            Grant::Actions(_) => Some(self.scope.unwrap_or_default()),
        }
    }

    fn ensure_complete(&self) -> Result<(), AclError> {
        match &self.grant {
            Grant::Actions(actions) if actions.is_empty() => Err(AclError::invalid_entry(
                "entry carries neither actions nor a role",
            )),
            _ => Ok(()),
        }
    }

    fn role(&self) -> Option<&str> {
        match &self.grant {
            Grant::Role(name) => Some(name),
            _ => None,
        }
    }

    fn actions(&self) -> &[Action] {
        match &self.grant {
            Grant::Actions(actions) => actions,
            _ => &[],
        }
    }
}

fn compile_action(config: &ActionConfig) -> Result<Action, AclError> {
    Action::new(&config.topic, &config.acl, config.options.clone())
}

/// A rule anchored in an ACL set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    id: EntryId,
    members: PatternMatcher,
    rule: Rule,
}

impl AclEntry {
    /// Create an entry with an explicit scope
    pub fn new(scope: Scope) -> Self {
        Self {
            id: EntryId::next(),
            members: PatternMatcher::empty(),
            rule: Rule::new(Some(scope)),
        }
    }

    /// Create an entry from a scope name, failing with `InvalidScope`
    pub fn parse(scope: &str) -> Result<Self, AclError> {
        Ok(Self::new(Scope::parse(scope)?))
    }

    /// Create an entry without an explicit scope.
    ///
    /// Such an entry either uses a role, or grants actions with scope `sub`.
    pub fn unscoped() -> Self {
        Self {
            id: EntryId::next(),
            members: PatternMatcher::empty(),
            rule: Rule::new(None),
        }
    }

    /// Bind this entry to a registered role
    pub fn use_role(&mut self, name: &str, roles: &RoleRegistry) -> Result<(), AclError> {
        self.rule.use_role(name, roles)
    }

    /// Append an action triple
    pub fn add_action(
        &mut self,
        topic: &str,
        permissions: &str,
        options: Options,
    ) -> Result<(), AclError> {
        let action = Action::new(topic, permissions, options)?;
        self.rule.add_action(action)
    }

    /// Replace the member list; every member is compiled as a pattern
    pub fn set_members<S: AsRef<str>>(&mut self, members: &[S]) -> Result<(), AclError> {
        if members.is_empty() {
            return Err(AclError::InvalidMemberList {
                reason: "member list is empty".to_string(),
            });
        }
        if members.iter().any(|m| m.as_ref().trim().is_empty()) {
            return Err(AclError::InvalidMemberList {
                reason: "member names must not be blank".to_string(),
            });
        }
        self.members = PatternMatcher::new(members)?;
        Ok(())
    }

    /// Set an explicit priority in `[-100, 100]`
    pub fn set_priority(&mut self, priority: i64) -> Result<(), AclError> {
        self.rule.set_priority(priority)
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    /// The scope given at construction, if any
    pub fn explicit_scope(&self) -> Option<Scope> {
        self.rule.scope
    }

    /// The scope used for evaluation; `None` for role entries, whose scopes
    /// come from the role
    pub fn scope(&self) -> Option<Scope> {
        self.rule.effective_scope()
    }

    pub fn priority(&self) -> Option<Priority> {
        self.rule.priority
    }

    pub fn grant(&self) -> &Grant {
        &self.rule.grant
    }

    pub fn role(&self) -> Option<&str> {
        self.rule.role()
    }

    pub fn actions(&self) -> &[Action] {
        self.rule.actions()
    }

    pub fn members(&self) -> &PatternMatcher {
        &self.members
    }

    /// Whether `subject` matches one of the member patterns
    pub fn matches_member(&self, subject: &str) -> bool {
        self.members.matches(subject)
    }

    /// Remove a member by its exact pattern text
    pub fn remove_member(&mut self, member: &str) -> bool {
        self.members.remove_source(member)
    }

    /// Check the entry is ready to be placed in a set
    pub fn validate(&self) -> Result<(), AclError> {
        if self.members.is_empty() {
            return Err(AclError::InvalidMemberList {
                reason: format!("entry {} has no members", self.id),
            });
        }
        self.rule.ensure_complete()
    }

    /// Put the entry into auto slot `value` unless its priority is explicit.
    ///
    /// An auto priority carried over from another set or role is replaced.
    pub(crate) fn assign_auto_priority(&mut self, value: i32) {
        if !matches!(self.rule.priority, Some(Priority::Explicit(_))) {
            self.rule.priority = Some(Priority::Auto(value));
        }
    }

    pub(crate) fn with_id(mut self, id: EntryId) -> Self {
        self.id = id;
        self
    }

    /// Build an entry from its configuration form
    pub fn from_config(config: &AclEntryConfig, roles: &RoleRegistry) -> Result<Self, AclError> {
        let mut entry = match &config.scope {
            Some(scope) => Self::parse(scope)?,
            None => Self::unscoped(),
        };

        entry.set_members(&config.members)?;
        if let Some(priority) = config.priority {
            entry.set_priority(priority)?;
        }
        for action in &config.actions {
            entry.rule.add_action(compile_action(action)?)?;
        }
        if let Some(role) = &config.role {
            entry.use_role(role, roles)?;
        }

        entry.validate()?;
        Ok(entry)
    }

    pub fn view(&self) -> AclEntryView {
        AclEntryView {
            id: self.id,
            scope: self.scope(),
            members: self.members.sources(),
            priority: self.priority().map(|p| p.value()),
            actions: self.actions().iter().map(ActionView::from).collect(),
            role: self.role().map(str::to_string),
        }
    }
}

/// A rule stored inside a role; it has no members of its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleEntry {
    id: EntryId,
    rule: Rule,
}

impl RoleEntry {
    pub fn new(scope: Scope) -> Self {
        Self {
            id: EntryId::next(),
            rule: Rule::new(Some(scope)),
        }
    }

    pub fn parse(scope: &str) -> Result<Self, AclError> {
        Ok(Self::new(Scope::parse(scope)?))
    }

    pub fn unscoped() -> Self {
        Self {
            id: EntryId::next(),
            rule: Rule::new(None),
        }
    }

    pub fn use_role(&mut self, name: &str, roles: &RoleRegistry) -> Result<(), AclError> {
        self.rule.use_role(name, roles)
    }

    pub fn add_action(
        &mut self,
        topic: &str,
        permissions: &str,
        options: Options,
    ) -> Result<(), AclError> {
        let action = Action::new(topic, permissions, options)?;
        self.rule.add_action(action)
    }

    pub fn set_priority(&mut self, priority: i64) -> Result<(), AclError> {
        self.rule.set_priority(priority)
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn scope(&self) -> Option<Scope> {
        self.rule.effective_scope()
    }

    pub fn priority(&self) -> Option<Priority> {
        self.rule.priority
    }

    pub fn grant(&self) -> &Grant {
        &self.rule.grant
    }

    pub fn role(&self) -> Option<&str> {
        self.rule.role()
    }

    pub fn actions(&self) -> &[Action] {
        self.rule.actions()
    }

    pub fn validate(&self) -> Result<(), AclError> {
        self.rule.ensure_complete()
    }

    /// Put the entry into auto slot `value` unless its priority is explicit.
    ///
    /// An auto priority carried over from another set or role is replaced.
    pub(crate) fn assign_auto_priority(&mut self, value: i32) {
        if !matches!(self.rule.priority, Some(Priority::Explicit(_))) {
            self.rule.priority = Some(Priority::Auto(value));
        }
    }

    pub(crate) fn with_id(mut self, id: EntryId) -> Self {
        self.id = id;
        self
    }

    pub fn from_config(config: &RoleEntryConfig, roles: &RoleRegistry) -> Result<Self, AclError> {
        let mut entry = match &config.scope {
            Some(scope) => Self::parse(scope)?,
            None => Self::unscoped(),
        };

        if let Some(priority) = config.priority {
            entry.set_priority(priority)?;
        }
        for action in &config.actions {
            entry.rule.add_action(compile_action(action)?)?;
        }
        if let Some(role) = &config.role {
            entry.use_role(role, roles)?;
        }

        entry.validate()?;
        Ok(entry)
    }

    pub fn view(&self) -> RoleEntryView {
        RoleEntryView {
            id: self.id,
            scope: self.scope(),
            priority: self.priority().map(|p| p.value()),
            actions: self.actions().iter().map(ActionView::from).collect(),
            role: self.role().map(str::to_string),
        }
    }
}

/// Serializable form of an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionView {
    pub topic: String,
    pub acl: String,
    #[serde(skip_serializing_if = "Options::is_empty")]
    pub options: Options,
}

impl From<&Action> for ActionView {
    fn from(action: &Action) -> Self {
        Self {
            topic: action.topic().to_string(),
            acl: action.permissions().to_string(),
            options: action.options().clone(),
        }
    }
}

/// Serializable form of an ACL entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclEntryView {
    pub id: EntryId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    pub members: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Serializable form of a role entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleEntryView {
    pub id: EntryId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::role::AclRole;

    fn registry_with(name: &str) -> RoleRegistry {
        let mut roles = RoleRegistry::new();
        roles.add_role(AclRole::new(name)).unwrap();
        roles
    }

    #[test]
    fn test_reset_entry_has_reset_grant() {
        let entry = AclEntry::new(Scope::Reset);
        assert_eq!(entry.grant(), &Grant::Reset);
        assert_eq!(entry.scope(), Some(Scope::Reset));
    }

    #[test]
    fn test_parse_invalid_scope() {
        assert!(matches!(
            AclEntry::parse("everything"),
            Err(AclError::InvalidScope { .. })
        ));
    }

    #[test]
    fn test_unscoped_action_entry_defaults_to_sub() {
        let mut entry = AclEntry::unscoped();
        entry.add_action("^org\\.gosa$", "r", Options::new()).unwrap();
        assert_eq!(entry.scope(), Some(Scope::Sub));
        assert_eq!(entry.explicit_scope(), None);
    }

    #[test]
    fn test_use_role_requires_registered_role() {
        let roles = RoleRegistry::new();
        let mut entry = AclEntry::unscoped();
        assert_eq!(
            entry.use_role("missing", &roles).unwrap_err(),
            AclError::RoleNotFound {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_use_role_with_explicit_scope_conflicts() {
        let roles = registry_with("role1");
        let mut entry = AclEntry::new(Scope::One);
        assert!(matches!(
            entry.use_role("role1", &roles),
            Err(AclError::ScopeConflict { .. })
        ));

        let mut reset = AclEntry::new(Scope::Reset);
        assert!(matches!(
            reset.use_role("role1", &roles),
            Err(AclError::ScopeConflict { .. })
        ));
    }

    #[test]
    fn test_role_and_actions_are_exclusive() {
        let roles = registry_with("role1");

        let mut entry = AclEntry::unscoped();
        entry.use_role("role1", &roles).unwrap();
        assert_eq!(
            entry.add_action("^x$", "r", Options::new()).unwrap_err(),
            AclError::RoleActionConflict
        );

        let mut entry = AclEntry::unscoped();
        entry.add_action("^x$", "r", Options::new()).unwrap();
        assert_eq!(
            entry.use_role("role1", &roles).unwrap_err(),
            AclError::RoleActionConflict
        );
    }

    #[test]
    fn test_add_action_rejects_bad_permissions_without_mutating() {
        let mut entry = AclEntry::new(Scope::Sub);
        assert!(matches!(
            entry.add_action("^x$", "rq", Options::new()),
            Err(AclError::InvalidPermissionChars { .. })
        ));
        assert!(entry.actions().is_empty());
    }

    #[test]
    fn test_add_action_rejects_bad_topic() {
        let mut entry = AclEntry::new(Scope::Sub);
        assert!(matches!(
            entry.add_action("org.(gosa", "r", Options::new()),
            Err(AclError::Pattern { .. })
        ));
    }

    #[test]
    fn test_set_members_validation() {
        let mut entry = AclEntry::new(Scope::Sub);
        let empty: [&str; 0] = [];
        assert!(matches!(
            entry.set_members(&empty),
            Err(AclError::InvalidMemberList { .. })
        ));
        assert!(matches!(
            entry.set_members(&["tester1", " "]),
            Err(AclError::InvalidMemberList { .. })
        ));
        assert!(matches!(
            entry.set_members(&["[bad"]),
            Err(AclError::Pattern { .. })
        ));
        entry.set_members(&["tester1", "^gosa_.*$"]).unwrap();
        assert!(entry.matches_member("gosa_admin"));
    }

    #[test]
    fn test_priority_range() {
        let mut entry = AclEntry::new(Scope::Sub);
        assert!(matches!(
            entry.set_priority(150),
            Err(AclError::PriorityOutOfRange { priority: 150 })
        ));
        entry.set_priority(-100).unwrap();
        assert_eq!(entry.priority(), Some(Priority::Explicit(-100)));
    }

    #[test]
    fn test_auto_priority_does_not_override_explicit() {
        let mut entry = AclEntry::new(Scope::Sub);
        entry.set_priority(5).unwrap();
        entry.assign_auto_priority(0);
        assert_eq!(entry.priority(), Some(Priority::Explicit(5)));
    }

    #[test]
    fn test_auto_priority_replaces_stale_slot() {
        let mut entry = AclEntry::new(Scope::Sub);
        entry.assign_auto_priority(7);
        entry.assign_auto_priority(2);
        assert_eq!(entry.priority(), Some(Priority::Auto(2)));
    }

    #[test]
    fn test_priority_sort_key_prefers_explicit() {
        assert!(Priority::Explicit(1).sort_key() < Priority::Auto(1).sort_key());
        assert!(Priority::Auto(0).sort_key() < Priority::Explicit(1).sort_key());
    }

    #[test]
    fn test_validate_incomplete_entry() {
        let mut entry = AclEntry::new(Scope::Sub);
        entry.set_members(&["tester1"]).unwrap();
        assert!(matches!(
            entry.validate(),
            Err(AclError::InvalidEntryType { .. })
        ));

        let mut reset = AclEntry::new(Scope::Reset);
        reset.set_members(&["tester1"]).unwrap();
        reset.validate().unwrap();
    }

    #[test]
    fn test_from_config() {
        let roles = registry_with("editors");
        let config = AclEntryConfig {
            scope: None,
            members: vec!["tester1".to_string()],
            priority: Some(3),
            actions: vec![],
            role: Some("editors".to_string()),
        };
        let entry = AclEntry::from_config(&config, &roles).unwrap();
        assert_eq!(entry.role(), Some("editors"));
        assert_eq!(entry.scope(), None);

        let view = entry.view();
        assert_eq!(view.members, vec!["tester1".to_string()]);
        assert_eq!(view.priority, Some(3));
    }

    #[test]
    fn test_role_entry_from_config_with_scope_and_role() {
        let roles = registry_with("editors");
        let config = RoleEntryConfig {
            scope: Some("sub".to_string()),
            priority: None,
            actions: vec![],
            role: Some("editors".to_string()),
        };
        assert!(matches!(
            RoleEntry::from_config(&config, &roles),
            Err(AclError::ScopeConflict { .. })
        ));
    }
}
