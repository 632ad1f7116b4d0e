//! Request validation run before any store access.

use tracing::debug;

use crate::{
    error::{Error, Result},
    models::AuthenticatedUser,
};

/// Punctuation accepted in paths on top of ASCII letters and digits.
const ALLOWED_PUNCTUATION: &str = "-._!*'()/@$=:+;, ";

/// Checks that a user identity is present and that every non-empty path is
/// safe to turn into an object key. Returns the user id on success.
pub fn validate(user: Option<&AuthenticatedUser>, paths: &[&str]) -> Result<i64> {
    let user = user.ok_or(Error::UserNotFound)?;
    for path in paths {
        validate_path(path)?;
    }
    Ok(user.id)
}

pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }

    if let Some(invalid) = path.chars().find(|c| !is_allowed(*c)) {
        debug!(path = %path, invalid = %invalid, "Rejected path with invalid character");
        return Err(Error::IncorrectPath(format!(
            "invalid characters in path: {}",
            path
        )));
    }

    if path.contains("..") || path.contains("//") {
        debug!(path = %path, "Rejected path with unsafe structure");
        return Err(Error::IncorrectPath(format!(
            "invalid path structure: {}",
            path
        )));
    }

    Ok(())
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || ALLOWED_PUNCTUATION.contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    const USER: AuthenticatedUser = AuthenticatedUser { id: 3 };

    #[test]
    fn requires_a_user() {
        assert!(matches!(
            validate(None, &["docs/"]),
            Err(Error::UserNotFound)
        ));
        assert_eq!(validate(Some(&USER), &[]).unwrap(), 3);
    }

    #[test]
    fn accepts_ordinary_paths() {
        for path in [
            "",
            "docs/",
            "docs/report 2024 (final).pdf",
            "a/b_c/d-e.f",
            "x/@home/$cash=+1;2,3:!*'",
        ] {
            assert_ok!(validate_path(path), "{}", path);
        }
    }

    #[test]
    fn rejects_traversal_and_double_slashes() {
        assert_err!(validate_path("../etc/passwd"));
        assert_err!(validate_path("docs/../../x"));
        assert_err!(validate_path("docs//x"));
    }

    #[test]
    fn rejects_characters_outside_allow_set() {
        for path in ["a\\b", "a?b", "a#b", "a%2Fb", "tab\there", "ü.txt", "a<b>"] {
            assert!(
                matches!(validate_path(path), Err(Error::IncorrectPath(_))),
                "{}",
                path
            );
        }
    }

    #[test]
    fn checks_every_path() {
        let result = validate(Some(&USER), &["docs/a.txt", "docs//b.txt"]);
        assert!(matches!(result, Err(Error::IncorrectPath(_))));
    }
}
