//! Topic builders
//!
//! Callers check permissions against dotted topics rooted at the
//! configured domain, e.g. `org.gosa.command.getBase`.

/// Topic guarding a dispatched command
pub fn command(domain: &str, method: &str) -> String {
    format!("{}.command.{}", domain, method)
}

/// Topic guarding the emission of an event
pub fn event(domain: &str, event_type: &str) -> String {
    format!("{}.event.{}", domain, event_type)
}

/// Topic guarding one attribute of a managed object type
pub fn attribute(domain: &str, object_type: &str, attribute: &str) -> String {
    format!("{}.objects.{}.attributes.{}", domain, object_type, attribute)
}

/// Topic guarding the administration of ACLs themselves
pub fn acl(domain: &str) -> String {
    format!("{}.acl", domain)
}
