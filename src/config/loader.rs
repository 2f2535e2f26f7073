//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (GOSA_ACL__*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::acl::patterns::Pattern;
use crate::acl::types::{PermissionSet, Scope, validate_priority};
use crate::config::types::{ActionConfig, AppConfig};
use crate::error::{AclError, ConfigError};
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "gosa-acl.toml",
    ".gosa-acl.toml",
    "~/.config/gosa-acl/config.toml",
    "/etc/gosa/acl.toml",
];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Add environment variables with GOSA_ACL prefix
    // e.g., GOSA_ACL__ACL__BASE, GOSA_ACL__LOGGING__FORMAT
    // Double underscore (__) maps to nested keys (acl.base)
    builder = builder.add_source(
        Environment::with_prefix("GOSA_ACL")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("acl.admins")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let acl = &config.acl;

    if acl.base.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "acl.base".to_string(),
        });
    }

    if acl.domain.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "acl.domain".to_string(),
        });
    }

    for (idx, role) in acl.roles.iter().enumerate() {
        if role.name.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: format!("acl.roles[{}].name", idx),
            });
        }
        for (entry_idx, entry) in role.entries.iter().enumerate() {
            let field = format!("acl.roles.{}.entries[{}]", role.name, entry_idx);
            validate_scope(entry.scope.as_deref(), &field)?;
            validate_entry_priority(entry.priority, &field)?;
            validate_actions(&entry.actions, &field)?;
        }
    }

    for (idx, set) in acl.sets.iter().enumerate() {
        if set.base.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: format!("acl.sets[{}].base", idx),
            });
        }
        for (entry_idx, entry) in set.entries.iter().enumerate() {
            let field = format!("acl.sets.{}.entries[{}]", set.base, entry_idx);
            validate_scope(entry.scope.as_deref(), &field)?;
            validate_entry_priority(entry.priority, &field)?;
            validate_patterns(&entry.members, &format!("{}.members", field))?;
            validate_actions(&entry.actions, &field)?;
        }
    }

    Ok(())
}

fn validate_scope(scope: Option<&str>, field_path: &str) -> Result<(), ConfigError> {
    match scope {
        Some(scope) if Scope::try_parse(scope).is_none() => Err(ConfigError::Invalid {
            message: format!("{}.scope: unknown scope '{}'", field_path, scope),
        }),
        _ => Ok(()),
    }
}

fn validate_entry_priority(priority: Option<i64>, field_path: &str) -> Result<(), ConfigError> {
    if let Some(priority) = priority {
        validate_priority(priority).map_err(|e| ConfigError::Invalid {
            message: format!("{}.priority: {}", field_path, e),
        })?;
    }
    Ok(())
}

fn validate_actions(actions: &[ActionConfig], field_path: &str) -> Result<(), ConfigError> {
    for (idx, action) in actions.iter().enumerate() {
        let field = format!("{}.actions[{}]", field_path, idx);
        validate_patterns(std::slice::from_ref(&action.topic), &format!("{}.topic", field))?;
        PermissionSet::parse(&action.acl).map_err(|e| ConfigError::Invalid {
            message: format!("{}.acl: {}", field, e),
        })?;
    }
    Ok(())
}

/// Validate that all patterns compile as member/topic patterns
fn validate_patterns(patterns: &[String], field_path: &str) -> Result<(), ConfigError> {
    for pattern in patterns {
        Pattern::new(pattern).map_err(|e| match e {
            AclError::Pattern { pattern, reason } => ConfigError::InvalidPattern {
                pattern,
                reason: format!("in {}: {}", field_path, reason),
            },
            other => ConfigError::Invalid {
                message: format!("{}: {}", field_path, other),
            },
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_from_str_basic() {
        let toml = r#"
[acl]
base = "dc=gosa,dc=org"
domain = "org.gosa"
admins = ["admin"]

[logging]
level = "debug"
format = "json"
"#;

        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.acl.base, "dc=gosa,dc=org");
        assert_eq!(config.acl.admins, vec!["admin"]);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.format,
            crate::config::types::LogFormat::Json
        );
    }

    #[test]
    fn test_load_config_with_sets_and_roles() {
        let toml = r#"
[acl]
base = "dc=gosa,dc=org"

[[acl.roles]]
name = "editors"

[[acl.roles.entries]]
scope = "sub"
actions = [{ topic = "^org\\.gosa\\..*$", acl = "rw" }]

[[acl.sets]]
base = "ou=people,dc=gosa,dc=org"

[[acl.sets.entries]]
members = ["^tester1$"]
role = "editors"
"#;

        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.acl.roles[0].name, "editors");
        assert_eq!(config.acl.roles[0].entries[0].actions[0].acl, "rw");
        let entry = &config.acl.sets[0].entries[0];
        assert_eq!(entry.role.as_deref(), Some("editors"));
        assert_eq!(entry.scope, None);
    }

    #[test]
    fn test_invalid_regex_pattern() {
        let toml = r#"
[acl]
base = "dc=gosa,dc=org"

[[acl.sets]]
base = "dc=gosa,dc=org"

[[acl.sets.entries]]
members = ["[invalid"]
actions = [{ topic = "x", acl = "r" }]
"#;

        let result = load_config_from_str(toml);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn test_invalid_permission_chars() {
        let toml = r#"
[acl]
base = "dc=gosa,dc=org"

[[acl.sets]]
base = "dc=gosa,dc=org"

[[acl.sets.entries]]
members = ["tester1"]
actions = [{ topic = "x", acl = "rwq" }]
"#;

        assert!(matches!(
            load_config_from_str(toml).unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }

    #[test]
    fn test_invalid_scope_and_priority() {
        let bad_scope = r#"
[[acl.sets]]
base = "dc=gosa,dc=org"

[[acl.sets.entries]]
scope = "subtree"
members = ["tester1"]
actions = [{ topic = "x", acl = "r" }]
"#;
        assert!(load_config_from_str(bad_scope).is_err());

        let bad_priority = r#"
[[acl.sets]]
base = "dc=gosa,dc=org"

[[acl.sets.entries]]
priority = 500
members = ["tester1"]
actions = [{ topic = "x", acl = "r" }]
"#;
        assert!(load_config_from_str(bad_priority).is_err());
    }

    #[test]
    fn test_empty_base_error() {
        let toml = r#"
[acl]
base = ""
"#;

        assert!(matches!(
            load_config_from_str(toml).unwrap_err(),
            ConfigError::Missing { .. }
        ));
    }
}
