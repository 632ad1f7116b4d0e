//! Mapping between client-facing paths and object keys.
//!
//! Every user owns the key namespace `user-<id>-files/`. A key ending in `/`
//! names a directory, anything else names a file. None of these functions
//! touch the store.

pub const SEPARATOR: char = '/';

/// Root key of a user's namespace, e.g. `user-7-files/`.
pub fn user_root_path(user_id: i64) -> String {
    format!("user-{}-files/", user_id)
}

/// Prefixes `relative` with the user's root unless it already starts with it.
pub fn full_user_path(user_id: i64, relative: &str) -> String {
    let root = user_root_path(user_id);
    if relative.starts_with(&root) {
        return relative.to_string();
    }
    format!("{}{}", root, relative.trim_start_matches(SEPARATOR))
}

/// Normalizes a path used in a directory context: backslashes become
/// slashes, surrounding whitespace is trimmed and a trailing slash is added.
/// The empty path stays empty.
pub fn normalize(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return String::new();
    }
    as_directory(normalized)
}

/// Appends a trailing slash if it is missing.
pub fn as_directory(path: &str) -> String {
    if path.ends_with(SEPARATOR) {
        path.to_string()
    } else {
        format!("{}{}", path, SEPARATOR)
    }
}

pub fn is_directory_path(path: &str) -> bool {
    path.ends_with(SEPARATOR)
}

/// Parent directory key, always with a trailing slash, or empty for
/// top-level entries and the empty key.
///
/// `a/b/` -> `a/`, `a/b/f.txt` -> `a/b/`, `a/` -> ``.
pub fn parent_path(key: &str) -> String {
    let trimmed = key.strip_suffix(SEPARATOR).unwrap_or(key);
    match trimmed.rfind(SEPARATOR) {
        Some(index) => trimmed[..=index].to_string(),
        None => String::new(),
    }
}

/// Last path segment without any trailing slash.
///
/// `a/b/` -> `b`, `a/b/f.txt` -> `f.txt`.
pub fn resource_name(key: &str) -> &str {
    let trimmed = key.strip_suffix(SEPARATOR).unwrap_or(key);
    match trimmed.rfind(SEPARATOR) {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    }
}

/// Every directory key above `key`, outermost first. The key itself is not
/// included.
///
/// `a/b/c.txt` -> [`a/`, `a/b/`].
pub fn ancestors(key: &str) -> Vec<String> {
    let trimmed = key.strip_suffix(SEPARATOR).unwrap_or(key);
    trimmed
        .match_indices(SEPARATOR)
        .map(|(index, _)| trimmed[..=index].to_string())
        .collect()
}

/// Strips the user root from a key; keys outside the root are returned as-is.
pub fn relative_to_root<'a>(key: &'a str, root: &str) -> &'a str {
    key.strip_prefix(root).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_user_root() {
        assert_eq!(user_root_path(42), "user-42-files/");
    }

    #[test]
    fn full_path_is_not_prefixed_twice() {
        assert_eq!(full_user_path(1, "docs/a.txt"), "user-1-files/docs/a.txt");
        assert_eq!(
            full_user_path(1, "user-1-files/docs/a.txt"),
            "user-1-files/docs/a.txt"
        );
        assert_eq!(full_user_path(1, ""), "user-1-files/");
    }

    #[test]
    fn foreign_root_inside_path_stays_in_own_namespace() {
        assert_eq!(
            full_user_path(1, "docs/user-2-files/x"),
            "user-1-files/docs/user-2-files/x"
        );
        assert_eq!(
            full_user_path(1, "user-2-files/x"),
            "user-1-files/user-2-files/x"
        );
    }

    #[test]
    fn normalizes_directory_paths() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize(" docs\\work "), "docs/work/");
        assert_eq!(normalize("docs/"), "docs/");
    }

    #[test]
    fn parent_of_keys() {
        assert_eq!(parent_path("a/b/"), "a/");
        assert_eq!(parent_path("a/b/f.txt"), "a/b/");
        assert_eq!(parent_path("a/"), "");
        assert_eq!(parent_path("f.txt"), "");
        assert_eq!(parent_path(""), "");
    }

    #[test]
    fn names_of_keys() {
        assert_eq!(resource_name("a/b/"), "b");
        assert_eq!(resource_name("a/b/f.txt"), "f.txt");
        assert_eq!(resource_name("a/"), "a");
        assert_eq!(resource_name("f.txt"), "f.txt");
        assert_eq!(resource_name(""), "");
    }

    #[test]
    fn decomposition_round_trips() {
        for key in ["a/", "a/b/", "a/b/f.txt", "f.txt", "x/y z/(1).tar.gz"] {
            let parent = parent_path(key);
            let mut rebuilt = format!("{}{}", parent, resource_name(key));
            if is_directory_path(key) {
                rebuilt.push(SEPARATOR);
            }
            assert_eq!(rebuilt, key);
            assert_eq!(parent_path(&rebuilt), parent);
        }
    }

    #[test]
    fn lists_ancestors_outermost_first() {
        assert_eq!(ancestors("a/b/c.txt"), vec!["a/", "a/b/"]);
        assert_eq!(ancestors("a/b/"), vec!["a/"]);
        assert!(ancestors("c.txt").is_empty());
    }

    #[test]
    fn strips_user_root() {
        assert_eq!(relative_to_root("user-1-files/a/b", "user-1-files/"), "a/b");
        assert_eq!(relative_to_root("other/a", "user-1-files/"), "other/a");
    }
}
