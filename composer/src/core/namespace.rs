//! Helpers for module paths and element namespaces.
//!
//! A module path joins module names with [`PATH_SEPARATOR`] (`Arm/Hand`). The
//! namespace of a module is its path followed by [`NAMESPACE_SEPARATOR`]
//! (`Arm/Hand:`), and every element a module creates is prefixed with it
//! (`Arm/Hand:wrist`). Binding expressions reuse the namespace separator to
//! address a variable on a module (`Arm/Hand:reach`).

pub const PATH_SEPARATOR: char = '/';
pub const NAMESPACE_SEPARATOR: char = ':';

/// Join a parent module path and a module name. An empty parent yields `name`.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        return name.to_string();
    }
    format!("{parent}{PATH_SEPARATOR}{name}")
}

/// Split a module path into `(parent_path, name)` at the last separator.
///
/// Root paths return an empty parent.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind(PATH_SEPARATOR) {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Return the first segment of a module path (the root module's name).
pub fn root_of_path(path: &str) -> &str {
    match path.find(PATH_SEPARATOR) {
        Some(idx) => &path[..idx],
        None => path,
    }
}

/// The namespace prefix owned by the module at `path`.
pub fn namespace_of_path(path: &str) -> String {
    format!("{path}{NAMESPACE_SEPARATOR}")
}

/// Join a namespace (or module path) and a name without doubling the separator.
pub fn join_namespace(left: &str, right: &str) -> String {
    if left.ends_with(NAMESPACE_SEPARATOR) {
        return format!("{left}{right}");
    }
    format!("{left}{NAMESPACE_SEPARATOR}{right}")
}

/// Split a namespaced name into `(module_path, short_name)` at the last `:`.
///
/// Names without a namespace return `None`.
pub fn split_namespace(name: &str) -> Option<(&str, &str)> {
    name.rfind(NAMESPACE_SEPARATOR)
        .map(|idx| (&name[..idx], &name[idx + 1..]))
}

/// Split a binding expression into `(source_module_path, variable_name)`.
///
/// A bare variable name addresses the owning (top-level) rig and yields an
/// empty module path.
pub fn split_binding_source(expr: &str) -> (&str, &str) {
    split_namespace(expr).unwrap_or(("", expr))
}

/// Remove `namespace` from the front of `name`, if present.
pub fn strip_namespace<'a>(name: &'a str, namespace: &str) -> &'a str {
    if namespace.is_empty() {
        return name;
    }
    match name.get(..namespace.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(namespace) => &name[namespace.len()..],
        _ => name,
    }
}

/// True if `name` lives directly in `namespace` (case-insensitive).
pub fn is_in_namespace(name: &str, namespace: &str) -> bool {
    match split_namespace(name) {
        Some((module_path, _)) => {
            namespace_of_path(module_path).eq_ignore_ascii_case(namespace)
        }
        None => false,
    }
}

/// True if `name` lives in a namespace nested below `namespace`
/// (for example `Arm/Hand:wrist` is below `Arm:`).
pub fn is_below_namespace(name: &str, namespace: &str) -> bool {
    let Some((module_path, _)) = split_namespace(name) else {
        return false;
    };
    let Some(parent_path) = namespace.strip_suffix(NAMESPACE_SEPARATOR) else {
        return false;
    };
    let prefix = format!("{parent_path}{PATH_SEPARATOR}");
    module_path.len() > prefix.len()
        && module_path
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&prefix))
}

/// True if `name` can be used as a module name (non-empty, no separators).
pub fn is_valid_module_name(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.contains(PATH_SEPARATOR)
        && !name.contains(NAMESPACE_SEPARATOR)
}
