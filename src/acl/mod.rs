//! ACL engine
//!
//! Decides whether a subject may perform an action on a topic at a resource
//! path (an LDAP-style DN such as `ou=people,dc=example,dc=net`).
//!
//! ## Model
//!
//! - An [`AclSet`] anchors a list of [`AclEntry`] values at one base path.
//! - An entry names its members (regex), a scope, an optional priority and
//!   either a list of [`Action`]s or a reference to an [`AclRole`].
//! - Actions grant permission characters (`rwcdsxem`) on a topic pattern,
//!   optionally constrained by option values.
//!
//! Scopes control how far an entry reaches below its anchor:
//!
//! - `one`: only the anchor itself
//! - `sub`: the anchor and everything below it
//! - `psub`: like `sub`, but survives a `reset`
//! - `reset`: revokes `one`/`sub` grants for the matching members
//!
//! ## Example Configuration
//!
//! ```toml
//! [acl]
//! base = "dc=example,dc=net"
//! admins = ["admin"]
//!
//! [[acl.roles]]
//! name = "reader"
//! [[acl.roles.entries]]
//! scope = "sub"
//! actions = [{ topic = "^org\\.gosa\\..*$", acl = "r" }]
//!
//! [[acl.sets]]
//! base = "ou=people,dc=example,dc=net"
//! [[acl.sets.entries]]
//! members = ["^tester1$"]
//! role = "reader"
//! ```

pub mod entry;
pub mod path;
pub mod patterns;
pub mod resolver;
pub mod role;
pub mod set;
pub mod topics;
pub mod types;

pub use entry::{AclEntry, EntryId, Grant, Priority, RoleEntry};
pub use patterns::{Pattern, PatternMatcher};
pub use resolver::{AccessDecision, AclResolver};
pub use role::{AclRole, RoleRegistry};
pub use set::{AclSet, MemberRemoval};
pub use types::{Action, Options, Permission, PermissionSet, Scope};
