//! Tag sanitization shared by baseline storage keys and report file names.

use crate::result::{CotejarError, CotejarResult};

/// Reduce a check tag to a key that is safe for every storage medium.
///
/// Keeps alphanumerics plus `-`, `_` and `.`; strips everything else;
/// collapses whitespace runs to a single underscore. The same function names
/// both stored baselines and persisted report images so paths and keys stay
/// consistent. Idempotent: sanitizing a sanitized key is a no-op.
///
/// # Errors
///
/// Returns [`CotejarError::Configuration`] when nothing safe remains.
pub fn sanitize_tag(raw: &str) -> CotejarResult<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '_' | '.'))
        .collect();

    let key = cleaned.split_whitespace().collect::<Vec<_>>().join("_");

    if key.is_empty() {
        return Err(CotejarError::Configuration {
            message: format!("tag {raw:?} is empty after removing unsafe characters"),
        });
    }

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_become_underscores_and_punctuation_is_dropped() {
        assert_eq!(sanitize_tag("Login Page!").unwrap(), "Login_Page");
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(sanitize_tag("  main \t menu  ").unwrap(), "main_menu");
    }

    #[test]
    fn safe_characters_survive() {
        assert_eq!(sanitize_tag("checkout-step.2_of_3").unwrap(), "checkout-step.2_of_3");
    }

    #[test]
    fn path_separators_are_stripped() {
        assert_eq!(sanitize_tag("a/b\\c:d").unwrap(), "abcd");
    }

    #[test]
    fn empty_after_sanitize_is_a_configuration_error() {
        let err = sanitize_tag("***").unwrap_err();
        assert!(matches!(err, CotejarError::Configuration { .. }));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(sanitize_tag("").is_err());
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize_tag("Login Page!").unwrap();
        let twice = sanitize_tag(&once).unwrap();
        assert_eq!(once, twice);
    }
}
