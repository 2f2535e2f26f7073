//! Resource path helpers
//!
//! Resource paths are LDAP-style distinguished names, most specific
//! component first (`cn=x,ou=y,dc=z`). A path is below another when it
//! equals it or ends with `,` followed by it. Escaped commas (`\,`) are part
//! of a component value and never separate components.

/// Byte offset of the first unescaped comma in `path`
fn first_separator(path: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in path.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => return Some(idx),
            _ => escaped = false,
        }
    }
    None
}

/// The path one level up, or `None` for a single-component path
pub fn parent(path: &str) -> Option<&str> {
    first_separator(path).map(|idx| path[idx + 1..].trim_start())
}

/// Iterator over `path` and all of its ancestors, closest first
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(path).filter(|p| !p.is_empty()), |p| parent(*p))
}

/// The ancestor chain of `base` used for scope resolution.
///
/// Starts at `base` and walks upward, stopping after `root` once it is
/// reached. A `base` outside `root` yields its complete ancestor chain.
pub fn scope_chain<'a>(base: &'a str, root: &str) -> Vec<&'a str> {
    let mut chain = Vec::new();
    for path in ancestors(base) {
        chain.push(path);
        if path == root {
            break;
        }
    }
    chain
}

/// Number of levels `path` sits below `ancestor`, if it is below it at all
pub fn distance(path: &str, ancestor: &str) -> Option<usize> {
    ancestors(path).position(|p| p == ancestor)
}

/// Whether `path` equals `ancestor` or lies in its subtree
pub fn is_below(path: &str, ancestor: &str) -> bool {
    distance(path, ancestor).is_some()
}
