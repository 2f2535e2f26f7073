//! Error types for gosa-acl
//!
//! This module defines the error hierarchy used throughout the crate.
//! We use `thiserror` for library-style errors that are part of the API.
//! A denied `check()` is a plain `false`, not an error; `AccessDeniedError`
//! only exists for callers that want to propagate a denial with `?`.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("ACL error: {0}")]
    Acl(#[from] AclError),

    #[error("Access denied: {0}")]
    AccessDenied(#[from] AccessDeniedError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Errors raised by the ACL engine
///
/// Every mutating operation validates its input before touching state, so
/// any of these returned from a mutator means nothing was applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AclError {
    #[error("Invalid scope '{scope}': expected one of one, sub, psub, reset")]
    InvalidScope { scope: String },

    #[error("Scope conflict: {reason}")]
    ScopeConflict { reason: String },

    #[error("Role '{name}' is not registered")]
    RoleNotFound { name: String },

    #[error("Role '{name}' already exists")]
    DuplicateRole { name: String },

    #[error("Role '{name}' is still referenced by entry {referenced_by}")]
    RoleInUse { name: String, referenced_by: String },

    #[error("Recursion detected while resolving role '{name}' (via {})", chain.join(" -> "))]
    RoleRecursion { name: String, chain: Vec<String> },

    #[error("Invalid permission characters '{chars}': allowed are r, w, c, d, s, x, e, m")]
    InvalidPermissionChars { chars: String },

    #[error("An entry cannot carry both a role reference and actions")]
    RoleActionConflict,

    #[error("Invalid member list: {reason}")]
    InvalidMemberList { reason: String },

    #[error("Priority {priority} is out of range [-100, 100]")]
    PriorityOutOfRange { priority: i64 },

    #[error("Invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Invalid entry: {reason}")]
    InvalidEntryType { reason: String },

    #[error("Entry {id} not found")]
    EntryNotFound { id: String },

    #[error("No ACL set registered for base '{base}'")]
    AclSetNotFound { base: String },
}

impl AclError {
    pub(crate) fn scope_conflict(reason: impl Into<String>) -> Self {
        AclError::ScopeConflict {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_entry(reason: impl Into<String>) -> Self {
        AclError::InvalidEntryType {
            reason: reason.into(),
        }
    }
}

/// Access control denial, for callers that turn a negative check into an error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Access denied for '{subject}' on '{topic}': {reason}")]
pub struct AccessDeniedError {
    pub subject: String,
    pub topic: String,
    pub reason: String,
}

impl AccessDeniedError {
    pub fn new(
        subject: impl Into<String>,
        topic: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create an error for a check that could not be evaluated (fail closed)
    pub fn evaluation_failed(
        subject: impl Into<String>,
        topic: impl Into<String>,
        cause: &AclError,
    ) -> Self {
        Self {
            subject: subject.into(),
            topic: topic.into(),
            reason: format!("access could not be evaluated: {}", cause),
        }
    }
}

/// Errors returned by the command-style adapters
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("ACL error: {0}")]
    Acl(#[from] AclError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Access denied: {0}")]
    AccessDenied(#[from] AccessDeniedError),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for command adapters
pub type CommandResult<T> = std::result::Result<T, CommandError>;
