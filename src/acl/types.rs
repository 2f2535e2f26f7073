//! ACL types
//!
//! Core value types used by the ACL engine: scopes, permission characters
//! and the action triples that entries grant.

use crate::acl::patterns::Pattern;
use crate::error::AclError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Option constraints attached to an action, and the options passed to a check
pub type Options = BTreeMap<String, String>;

/// Lowest accepted explicit priority
pub const MIN_PRIORITY: i32 = -100;

/// Highest accepted explicit priority
pub const MAX_PRIORITY: i32 = 100;

/// Validate an explicit priority value
pub fn validate_priority(priority: i64) -> Result<i32, AclError> {
    if priority < i64::from(MIN_PRIORITY) || priority > i64::from(MAX_PRIORITY) {
        return Err(AclError::PriorityOutOfRange { priority });
    }
    Ok(priority as i32)
}

/// How far an entry reaches below its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The anchor itself only
    One,
    /// The anchor and its whole subtree
    #[default]
    Sub,
    /// Like `Sub`, but immune to `Reset`
    Psub,
    /// Revokes `One`/`Sub` grants for matching members at and below the anchor
    Reset,
}

impl Scope {
    /// Get the scope name as a string
    pub const fn as_str(&self) -> &'static str {
        match self {
            Scope::One => "one",
            Scope::Sub => "sub",
            Scope::Psub => "psub",
            Scope::Reset => "reset",
        }
    }

    /// Try to parse a scope from a string (case-insensitive)
    pub fn try_parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "one" => Some(Scope::One),
            "sub" => Some(Scope::Sub),
            "psub" => Some(Scope::Psub),
            "reset" => Some(Scope::Reset),
            _ => None,
        }
    }

    /// Parse a scope, reporting `InvalidScope` for unknown names
    pub fn parse(s: &str) -> Result<Self, AclError> {
        Self::try_parse(s).ok_or_else(|| AclError::InvalidScope {
            scope: s.to_string(),
        })
    }

    /// Whether an entry with this scope applies to a path `distance` levels
    /// below its anchor
    pub const fn reaches(&self, distance: usize) -> bool {
        match self {
            Scope::One => distance == 0,
            Scope::Sub | Scope::Psub | Scope::Reset => true,
        }
    }

    /// Whether a matching `Reset` revokes grants of this scope
    pub const fn is_resettable(&self) -> bool {
        matches!(self, Scope::One | Scope::Sub)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single permission character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Read,
    Write,
    Create,
    Delete,
    Search,
    Execute,
    Event,
    Move,
}

impl Permission {
    /// Every permission, in canonical order
    pub const ALL: [Permission; 8] = [
        Permission::Read,
        Permission::Write,
        Permission::Create,
        Permission::Delete,
        Permission::Search,
        Permission::Execute,
        Permission::Event,
        Permission::Move,
    ];

    pub const fn as_char(&self) -> char {
        match self {
            Permission::Read => 'r',
            Permission::Write => 'w',
            Permission::Create => 'c',
            Permission::Delete => 'd',
            Permission::Search => 's',
            Permission::Execute => 'x',
            Permission::Event => 'e',
            Permission::Move => 'm',
        }
    }

    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'r' => Some(Permission::Read),
            'w' => Some(Permission::Write),
            'c' => Some(Permission::Create),
            'd' => Some(Permission::Delete),
            's' => Some(Permission::Search),
            'x' => Some(Permission::Execute),
            'e' => Some(Permission::Event),
            'm' => Some(Permission::Move),
            _ => None,
        }
    }

    const fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl TryFrom<char> for Permission {
    type Error = AclError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        Permission::from_char(c).ok_or_else(|| AclError::InvalidPermissionChars {
            chars: c.to_string(),
        })
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Set of granted permission characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PermissionSet(u8);

impl PermissionSet {
    /// Parse a permission string such as `"rwx"`.
    ///
    /// The whole string is rejected if any character is outside the alphabet.
    pub fn parse(chars: &str) -> Result<Self, AclError> {
        let mut bits = 0u8;
        for c in chars.chars() {
            let permission =
                Permission::from_char(c).ok_or_else(|| AclError::InvalidPermissionChars {
                    chars: chars.to_string(),
                })?;
            bits |= permission.bit();
        }
        Ok(Self(bits))
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0 & permission.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for permission in Permission::ALL {
            if self.contains(permission) {
                write!(f, "{}", permission.as_char())?;
            }
        }
        Ok(())
    }
}

/// One `{topic, permissions, options}` triple granted by an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    topic: Pattern,
    permissions: PermissionSet,
    options: Options,
}

impl Action {
    /// Build an action, compiling the topic pattern and validating permissions
    pub fn new(topic: &str, permissions: &str, options: Options) -> Result<Self, AclError> {
        let permissions = PermissionSet::parse(permissions)?;
        let topic = Pattern::new(topic)?;
        Ok(Self {
            topic,
            permissions,
            options,
        })
    }

    pub fn topic(&self) -> &str {
        self.topic.as_str()
    }

    pub fn permissions(&self) -> PermissionSet {
        self.permissions
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Whether the action's topic pattern matches `topic`
    pub fn matches_topic(&self, topic: &str) -> bool {
        self.topic.matches(topic)
    }

    /// Whether this action grants `permission` on `topic`.
    ///
    /// Option constraints are only evaluated when the caller supplied a
    /// non-empty option map; then every constraint must be present with an
    /// equal value. `None` and an empty map are equivalent.
    pub fn grants(&self, topic: &str, permission: Permission, options: Option<&Options>) -> bool {
        if !self.permissions.contains(permission) || !self.topic.matches(topic) {
            return false;
        }

        match options {
            Some(given) if !given.is_empty() => self
                .options
                .iter()
                .all(|(key, value)| given.get(key) == Some(value)),
            _ => true,
        }
    }
}
