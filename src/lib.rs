//! GOsa ACL engine
//!
//! Scoped, prioritized and role-aware permission checks over a tree of
//! LDAP-style resource paths.
//!
//! ## Features
//!
//! - **Scoped entries** anchored at a base path: `one`, `sub`, `psub`, `reset`
//! - **Priorities** in `[-100, 100]`, explicit or assigned in insertion order
//! - **Roles** that bundle rules and may reference other roles
//! - **Regex matching** for members and topics
//! - **Flexible configuration** via TOML files and environment variables
//!
//! ## Resolution Model
//!
//! ```text
//! base → parent → ... → root    (closest anchor first at equal priority)
//! ```
//!
//! A check for `(subject, topic, permission, base)` walks the scope chain,
//! collects the entries whose members match the subject, orders them by
//! priority and distance, and grants access at the first action that
//! carries the permission for the topic. Administrators bypass all rules.
//!
//! ## Example
//!
//! ```
//! use gosa_acl::acl::{AclEntry, AclResolver, Options, Scope};
//!
//! let resolver = AclResolver::new("dc=example,dc=net", "org.gosa");
//! let mut entry = AclEntry::new(Scope::Sub);
//! entry.set_members(&["^tester1$"]).unwrap();
//! entry.add_action("^org\\.gosa\\.factory$", "rx", Options::new()).unwrap();
//! resolver.add_acl("ou=people,dc=example,dc=net", entry).unwrap();
//!
//! let allowed = resolver
//!     .check("tester1", "org.gosa.factory", 'r', None, Some("cn=t1,ou=people,dc=example,dc=net"))
//!     .unwrap();
//! assert!(allowed);
//! ```

pub mod acl;
pub mod commands;
pub mod config;
pub mod error;

// Re-export main types
pub use acl::AclResolver;
pub use commands::AclCommands;
pub use config::{AppConfig, load_config};
pub use error::{AppError, Result};
