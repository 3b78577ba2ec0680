use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for caller identities from the `x-user-uuid` header.
    /// The identity doubles as a directory name for the file store, so only
    /// alphanumerics, hyphens and underscores are allowed.
    /// - Valid: "b4d6f3e2-8c9a-4d2b-9f1e-3a5c7d8e9f1a", "trader_01"
    /// - Invalid: "../etc", "a/b", "user name", ""
    pub static ref USER_ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,128}$").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_regex_valid() {
        assert!(USER_ID_REGEX.is_match("b4d6f3e2-8c9a-4d2b-9f1e-3a5c7d8e9f1a"));
        assert!(USER_ID_REGEX.is_match("trader_01"));
        assert!(USER_ID_REGEX.is_match("A"));
    }

    #[test]
    fn test_user_id_regex_invalid() {
        assert!(!USER_ID_REGEX.is_match("")); // empty
        assert!(!USER_ID_REGEX.is_match("..")); // dots
        assert!(!USER_ID_REGEX.is_match("a/b")); // path separator
        assert!(!USER_ID_REGEX.is_match("user name")); // space
        assert!(!USER_ID_REGEX.is_match(&"x".repeat(129))); // too long
    }
}
