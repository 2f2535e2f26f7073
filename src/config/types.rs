//! Configuration types for gosa-acl
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables. The `[acl]` section also
//! carries the rules the engine is bootstrapped with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// ACL engine settings and bootstrap rules
    pub acl: AclConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// ACL engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AclConfig {
    /// Root of the resource tree (e.g. `dc=example,dc=net`)
    pub base: String,

    /// Topic prefix (e.g. `org.gosa`)
    pub domain: String,

    /// Subjects that bypass all checks
    pub admins: Vec<String>,

    /// Roles, registered before any set
    pub roles: Vec<RoleConfig>,

    /// ACL sets keyed by their base
    pub sets: Vec<AclSetConfig>,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            base: "dc=example,dc=net".to_string(),
            domain: "org.gosa".to_string(),
            admins: Vec::new(),
            roles: Vec::new(),
            sets: Vec::new(),
        }
    }
}

/// A named role and its entries
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RoleConfig {
    pub name: String,

    #[serde(default)]
    pub entries: Vec<RoleEntryConfig>,
}

/// The entries anchored at one base
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AclSetConfig {
    pub base: String,

    #[serde(default)]
    pub entries: Vec<AclEntryConfig>,
}

/// One ACL entry
///
/// Exactly one of `actions` and `role` must be given, except for
/// `scope = "reset"` which takes neither.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AclEntryConfig {
    /// `one`, `sub`, `psub` or `reset`; omitted for role entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Member patterns (regex)
    pub members: Vec<String>,

    /// Explicit priority in `[-100, 100]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionConfig>,

    /// Name of the role to delegate to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// One entry inside a role; like [`AclEntryConfig`] without members
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoleEntryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// A `{topic, acl, options}` triple
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ActionConfig {
    /// Topic pattern (regex)
    pub topic: String,

    /// Permission characters out of `rwcdsxem`
    pub acl: String,

    /// Option constraints, compared for equality
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}
