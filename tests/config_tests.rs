//! Configuration loading tests

use gosa_acl::AclResolver;
use gosa_acl::config::{LogFormat, load_config_from_str};

const MINIMAL_CONFIG: &str = r#"
[acl]
base = "dc=gosa,dc=test"
"#;

const FULL_CONFIG: &str = r#"
[acl]
base = "dc=example,dc=net"
domain = "org.gosa"
admins = ["admin", "root"]

[[acl.roles]]
name = "reader"

[[acl.roles.entries]]
scope = "sub"
actions = [{ topic = "^org\\.gosa\\..*$", acl = "r" }]

[[acl.roles]]
name = "editor"

[[acl.roles.entries]]
role = "reader"

[[acl.roles.entries]]
scope = "one"
priority = -5
actions = [{ topic = "^org\\.gosa\\.objects$", acl = "rw", options = { uid = "tester1" } }]

[[acl.sets]]
base = "ou=people,dc=example,dc=net"

[[acl.sets.entries]]
members = ["^tester1$"]
role = "editor"

[[acl.sets.entries]]
scope = "reset"
members = ["^tester2$"]

[logging]
level = "debug"
format = "json"
"#;

#[test]
fn test_minimal_config() {
    let config = load_config_from_str(MINIMAL_CONFIG).unwrap();

    assert_eq!(config.acl.base, "dc=gosa,dc=test");
    assert_eq!(config.acl.domain, "org.gosa");
    assert!(config.acl.admins.is_empty());
    assert!(config.acl.sets.is_empty());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);
}

#[test]
fn test_full_config() {
    let config = load_config_from_str(FULL_CONFIG).unwrap();

    assert_eq!(config.acl.admins, vec!["admin", "root"]);
    assert_eq!(config.acl.roles.len(), 2);
    assert_eq!(config.acl.roles[1].entries[1].priority, Some(-5));
    assert_eq!(
        config.acl.roles[1].entries[1].actions[0]
            .options
            .get("uid")
            .map(String::as_str),
        Some("tester1")
    );
    assert_eq!(config.acl.sets[0].entries.len(), 2);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_resolver_from_full_config() {
    let config = load_config_from_str(FULL_CONFIG).unwrap();
    let resolver = AclResolver::from_config(&config.acl).unwrap();

    let people = Some("ou=people,dc=example,dc=net");
    let below = Some("cn=tester1,ou=people,dc=example,dc=net");

    assert_eq!(resolver.set_count(), 1);
    assert_eq!(resolver.role_count(), 2);
    assert!(resolver.is_admin("root"));

    // Inherited through editor -> reader
    assert!(
        resolver
            .check("tester1", "org.gosa.event", 'r', None, below)
            .unwrap()
    );

    // editor's own one-level rule
    let own: gosa_acl::acl::Options = [("uid".to_string(), "tester1".to_string())].into();
    assert!(
        resolver
            .check("tester1", "org.gosa.objects", 'w', Some(&own), people)
            .unwrap()
    );
    assert!(
        !resolver
            .check("tester1", "org.gosa.objects", 'w', Some(&own), below)
            .unwrap()
    );
}

#[test]
fn test_invalid_scope_rejected() {
    let config_str = r#"
[[acl.sets]]
base = "dc=example,dc=net"

[[acl.sets.entries]]
scope = "everywhere"
members = ["tester1"]
actions = [{ topic = "x", acl = "r" }]
"#;

    assert!(load_config_from_str(config_str).is_err());
}

#[test]
fn test_invalid_permission_rejected() {
    let config_str = r#"
[[acl.sets]]
base = "dc=example,dc=net"

[[acl.sets.entries]]
members = ["tester1"]
actions = [{ topic = "x", acl = "rq" }]
"#;

    assert!(load_config_from_str(config_str).is_err());
}

#[test]
fn test_invalid_member_regex_rejected() {
    let config_str = r#"
[[acl.sets]]
base = "dc=example,dc=net"

[[acl.sets.entries]]
members = ["[invalid"]
actions = [{ topic = "x", acl = "r" }]
"#;

    assert!(load_config_from_str(config_str).is_err());
}

#[test]
fn test_priority_out_of_range_rejected() {
    let config_str = r#"
[[acl.sets]]
base = "dc=example,dc=net"

[[acl.sets.entries]]
members = ["tester1"]
priority = 150
actions = [{ topic = "x", acl = "r" }]
"#;

    assert!(load_config_from_str(config_str).is_err());
}

#[test]
fn test_unknown_role_fails_bootstrap() {
    let config_str = r#"
[[acl.sets]]
base = "dc=example,dc=net"

[[acl.sets.entries]]
members = ["tester1"]
role = "missing"
"#;

    let config = load_config_from_str(config_str).unwrap();
    assert!(AclResolver::from_config(&config.acl).is_err());
}

#[test]
#[serial_test::serial]
fn test_env_var_overrides_file() {
    use std::env;
    use std::fs;
    use gosa_acl::config::load_config;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("test-config.toml");
    fs::write(&config_path, MINIMAL_CONFIG).unwrap();

    unsafe {
        env::set_var("GOSA_ACL__ACL__BASE", "dc=override,dc=test");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();
    assert_eq!(config.acl.base, "dc=override,dc=test");

    unsafe {
        env::remove_var("GOSA_ACL__ACL__BASE");
    }
}

#[test]
#[serial_test::serial]
fn test_env_var_admin_list() {
    use std::env;
    use std::fs;
    use gosa_acl::config::load_config;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("test-config.toml");
    fs::write(&config_path, MINIMAL_CONFIG).unwrap();

    unsafe {
        env::set_var("GOSA_ACL__ACL__ADMINS", "admin,root");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();
    assert_eq!(config.acl.admins, vec!["admin", "root"]);

    unsafe {
        env::remove_var("GOSA_ACL__ACL__ADMINS");
    }
}

#[test]
#[serial_test::serial]
fn test_missing_explicit_file_is_error() {
    use gosa_acl::config::load_config;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    assert!(load_config(Some(missing.to_str().unwrap())).is_err());
}
