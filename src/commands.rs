//! Command adapters
//!
//! Thin wrappers that expose the engine's mutators to a command registry.
//! Every command is itself guarded by the `<domain>.acl` topic: reading
//! requires `r`, changing requires `w`, both checked at the affected base.

use crate::acl::entry::{AclEntry, EntryId, RoleEntry};
use crate::acl::resolver::AclResolver;
use crate::acl::role::{AclRole, AclRoleView};
use crate::acl::set::{AclSetView, MemberRemoval};
use crate::acl::topics;
use crate::config::{AclEntryConfig, RoleEntryConfig};
use crate::error::{AclError, CommandError, CommandResult};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct AddAclArgs {
    base: String,
    #[serde(flatten)]
    entry: AclEntryConfig,
}

#[derive(Debug, Deserialize)]
struct UpdateAclArgs {
    id: EntryId,
    #[serde(flatten)]
    entry: AclEntryConfig,
}

#[derive(Debug, Deserialize)]
struct AddToRoleArgs {
    role: String,
    #[serde(flatten)]
    entry: RoleEntryConfig,
}

#[derive(Debug, Deserialize)]
struct UpdateRoleEntryArgs {
    id: EntryId,
    #[serde(flatten)]
    entry: RoleEntryConfig,
}

#[derive(Debug, Deserialize)]
struct IdArgs {
    id: EntryId,
}

#[derive(Debug, Deserialize)]
struct NameArgs {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GetAclsArgs {
    base: Option<String>,
    topic: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubjectArgs {
    subject: String,
}

fn parse_args<T: DeserializeOwned>(args: Value) -> CommandResult<T> {
    serde_json::from_value(args)
        .map_err(|e| CommandError::InvalidArguments(format!("Failed to parse arguments: {}", e)))
}

/// ACL administration commands
#[derive(Clone)]
pub struct AclCommands {
    resolver: Arc<AclResolver>,
}

impl AclCommands {
    pub fn new(resolver: Arc<AclResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<AclResolver> {
        &self.resolver
    }

    fn authorize(&self, caller: &str, permission: char, base: &str) -> CommandResult<()> {
        let topic = topics::acl(self.resolver.domain());
        self.resolver
            .require(caller, &topic, permission, None, Some(base))?;
        Ok(())
    }

    fn entry_base(&self, id: EntryId) -> CommandResult<String> {
        self.resolver
            .base_of(id)
            .ok_or_else(|| AclError::EntryNotFound { id: id.to_string() }.into())
    }

    /// Add an entry at `base`
    #[instrument(skip(self, config))]
    pub fn add_acl(
        &self,
        caller: &str,
        base: &str,
        config: &AclEntryConfig,
    ) -> CommandResult<EntryId> {
        self.authorize(caller, 'w', base)?;
        let entry = self
            .resolver
            .with_roles(|roles| AclEntry::from_config(config, roles))?;
        Ok(self.resolver.add_acl(base, entry)?)
    }

    /// Replace the entry `id` with `config`
    #[instrument(skip(self, config))]
    pub fn update_acl(
        &self,
        caller: &str,
        id: EntryId,
        config: &AclEntryConfig,
    ) -> CommandResult<()> {
        let base = self.entry_base(id)?;
        self.authorize(caller, 'w', &base)?;
        let entry = self
            .resolver
            .with_roles(|roles| AclEntry::from_config(config, roles))?;
        Ok(self.resolver.update_acl(id, entry)?)
    }

    #[instrument(skip(self))]
    pub fn remove_acl(&self, caller: &str, id: EntryId) -> CommandResult<()> {
        let base = self.entry_base(id)?;
        self.authorize(caller, 'w', &base)?;
        self.resolver.remove_acl(id)?;
        Ok(())
    }

    /// List ACL sets at or below `base` (default: the root)
    pub fn get_acls(
        &self,
        caller: &str,
        base: Option<&str>,
        topic: Option<&str>,
    ) -> CommandResult<Vec<AclSetView>> {
        let base = base.unwrap_or(self.resolver.base());
        self.authorize(caller, 'r', base)?;
        Ok(self.resolver.get_acls(Some(base), topic))
    }

    #[instrument(skip(self))]
    pub fn add_acl_role(&self, caller: &str, name: &str) -> CommandResult<()> {
        self.authorize(caller, 'w', self.resolver.base())?;
        Ok(self.resolver.add_acl_role(AclRole::new(name))?)
    }

    #[instrument(skip(self, config))]
    pub fn add_acl_to_role(
        &self,
        caller: &str,
        role: &str,
        config: &RoleEntryConfig,
    ) -> CommandResult<EntryId> {
        self.authorize(caller, 'w', self.resolver.base())?;
        let entry = self
            .resolver
            .with_roles(|roles| RoleEntry::from_config(config, roles))?;
        Ok(self.resolver.add_role_entry(role, entry)?)
    }

    #[instrument(skip(self, config))]
    pub fn update_acl_role(
        &self,
        caller: &str,
        id: EntryId,
        config: &RoleEntryConfig,
    ) -> CommandResult<()> {
        self.authorize(caller, 'w', self.resolver.base())?;
        let entry = self
            .resolver
            .with_roles(|roles| RoleEntry::from_config(config, roles))?;
        Ok(self.resolver.update_role_entry(id, entry)?)
    }

    #[instrument(skip(self))]
    pub fn remove_role_acl(&self, caller: &str, id: EntryId) -> CommandResult<()> {
        self.authorize(caller, 'w', self.resolver.base())?;
        self.resolver.remove_role_entry(id)?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn remove_role(&self, caller: &str, name: &str) -> CommandResult<()> {
        self.authorize(caller, 'w', self.resolver.base())?;
        self.resolver.remove_role(name)?;
        Ok(())
    }

    pub fn get_roles(&self, caller: &str) -> CommandResult<Vec<AclRoleView>> {
        self.authorize(caller, 'r', self.resolver.base())?;
        Ok(self.resolver.get_roles())
    }

    #[instrument(skip(self))]
    pub fn remove_acls_for_user(
        &self,
        caller: &str,
        subject: &str,
    ) -> CommandResult<MemberRemoval> {
        self.authorize(caller, 'w', self.resolver.base())?;
        Ok(self.resolver.remove_acls_for_user(subject))
    }

    /// Invoke a command by its registry name with JSON arguments
    pub fn dispatch(&self, caller: &str, method: &str, args: Value) -> CommandResult<Value> {
        debug!(caller, method, "Dispatching ACL command");

        let result = match method {
            "addACL" => {
                let args: AddAclArgs = parse_args(args)?;
                serde_json::to_value(self.add_acl(caller, &args.base, &args.entry)?)?
            }
            "updateACL" => {
                let args: UpdateAclArgs = parse_args(args)?;
                self.update_acl(caller, args.id, &args.entry)?;
                Value::Null
            }
            "removeACL" => {
                let args: IdArgs = parse_args(args)?;
                self.remove_acl(caller, args.id)?;
                Value::Null
            }
            "getACLs" => {
                let args: GetAclsArgs = parse_args(args)?;
                serde_json::to_value(self.get_acls(
                    caller,
                    args.base.as_deref(),
                    args.topic.as_deref(),
                )?)?
            }
            "addACLRole" => {
                let args: NameArgs = parse_args(args)?;
                self.add_acl_role(caller, &args.name)?;
                Value::Null
            }
            "addACLToRole" => {
                let args: AddToRoleArgs = parse_args(args)?;
                serde_json::to_value(self.add_acl_to_role(caller, &args.role, &args.entry)?)?
            }
            "updateACLRole" => {
                let args: UpdateRoleEntryArgs = parse_args(args)?;
                self.update_acl_role(caller, args.id, &args.entry)?;
                Value::Null
            }
            "removeRoleACL" => {
                let args: IdArgs = parse_args(args)?;
                self.remove_role_acl(caller, args.id)?;
                Value::Null
            }
            "removeRole" => {
                let args: NameArgs = parse_args(args)?;
                self.remove_role(caller, &args.name)?;
                Value::Null
            }
            "getACLRoles" => serde_json::to_value(self.get_roles(caller)?)?,
            "removeACLsForUser" => {
                let args: SubjectArgs = parse_args(args)?;
                serde_json::to_value(self.remove_acls_for_user(caller, &args.subject)?)?
            }
            other => {
                return Err(CommandError::InvalidArguments(format!(
                    "Unknown ACL command: {}",
                    other
                )));
            }
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ROOT: &str = "dc=example,dc=net";

    fn commands() -> AclCommands {
        let resolver = AclResolver::new(ROOT, "org.gosa");
        resolver.add_admin("admin");
        AclCommands::new(Arc::new(resolver))
    }

    #[test]
    fn test_dispatch_add_and_list() {
        let commands = commands();
        let id = commands
            .dispatch(
                "admin",
                "addACL",
                json!({
                    "base": ROOT,
                    "scope": "sub",
                    "members": ["^tester1$"],
                    "actions": [{"topic": "^org\\.gosa\\.factory$", "acl": "rwx"}]
                }),
            )
            .unwrap();
        assert!(id.is_u64());

        let listed = commands.dispatch("admin", "getACLs", json!({})).unwrap();
        assert_eq!(listed[0]["base"], ROOT);
        assert_eq!(listed[0]["entries"][0]["acl"], Value::Null);
        assert_eq!(listed[0]["entries"][0]["actions"][0]["acl"], "rwx");
    }

    #[test]
    fn test_dispatch_unknown_method() {
        let commands = commands();
        assert!(matches!(
            commands.dispatch("admin", "dropAll", json!({})),
            Err(CommandError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_dispatch_bad_arguments() {
        let commands = commands();
        assert!(matches!(
            commands.dispatch("admin", "removeACL", json!({"id": "not-a-number"})),
            Err(CommandError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_commands_require_acl_permission() {
        let commands = commands();
        let spec = AclEntryConfig {
            members: vec!["tester1".to_string()],
            actions: vec![crate::config::ActionConfig {
                topic: "x".to_string(),
                acl: "r".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            commands.add_acl("tester1", ROOT, &spec),
            Err(CommandError::AccessDenied(_))
        ));
    }
}
