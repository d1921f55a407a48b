//! Input validation helpers

use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Valid email regex"));

/// Normalize an email address: trimmed and lowercased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Check the shape of an (already normalized) email address
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Check the strength of a new password
///
/// Returns the message to show for the first failing rule
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    if password.is_empty() {
        return Err("Password is required");
    }

    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters");
    }

    if !password.chars().any(|ch| ch.is_ascii_lowercase()) {
        return Err("Password must include a lowercase letter");
    }

    if !password.chars().any(|ch| ch.is_ascii_uppercase()) {
        return Err("Password must include an uppercase letter");
    }

    if !password.chars().any(|ch| ch.is_ascii_digit()) {
        return Err("Password must include a number");
    }

    if !password.chars().any(|ch| !ch.is_ascii_alphanumeric()) {
        return Err("Password must include a special character");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("alice@example.com"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("alice example@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_validate_password_strength() {
        assert!(validate_password_strength("Sup3r$ecret").is_ok());

        assert_eq!(
            validate_password_strength(""),
            Err("Password is required")
        );
        assert_eq!(
            validate_password_strength("Sh0rt$"),
            Err("Password must be at least 8 characters")
        );
        assert_eq!(
            validate_password_strength("SUP3R$ECRET"),
            Err("Password must include a lowercase letter")
        );
        assert_eq!(
            validate_password_strength("sup3r$ecret"),
            Err("Password must include an uppercase letter")
        );
        assert_eq!(
            validate_password_strength("Super$ecret"),
            Err("Password must include a number")
        );
        assert_eq!(
            validate_password_strength("Sup3rSecret"),
            Err("Password must include a special character")
        );
    }
}
