use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$"
    )
    .unwrap();
    static ref PASSWORD_CHARSET_RE: Regex = Regex::new(r"^[A-Za-z\d@$!%*#?&]+$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254
        && !email.contains("..")
        && !email.starts_with('.')
        && !email.contains(".@")
        && EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trims, lowercases and checks the syntax of an email field.
pub fn require_email(email: Option<&str>, missing: &str) -> Result<String, AppError> {
    let email = email
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::validation(missing))?;
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email format"));
    }
    Ok(email)
}

/// At least 8 characters, one letter and one digit, from letters, digits
/// and `@$!%*#?&`. `label` prefixes the messages ("Password", "New password").
pub fn check_password_policy(password: &str, label: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "{label} must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit || !PASSWORD_CHARSET_RE.is_match(password) {
        return Err(AppError::validation(format!(
            "{label} must contain at least one letter, one number, and be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: AppError) -> String {
        err.to_string()
    }

    #[test]
    fn accepts_common_addresses() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co.uk"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "",
            "plainaddress",
            "@example.com",
            "alice@",
            "alice@example",
            "alice@@example.com",
            "al ice@example.com",
            "alice..b@example.com",
            "alice@-example.com",
        ] {
            assert!(!is_valid_email(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn require_email_normalizes() {
        assert_eq!(
            require_email(Some("  Alice@Example.COM "), "Email is required").unwrap(),
            "alice@example.com"
        );
        assert_eq!(
            message(require_email(None, "Email is required").unwrap_err()),
            "Email is required"
        );
        assert_eq!(
            message(require_email(Some("nope"), "Email is required").unwrap_err()),
            "Invalid email format"
        );
    }

    #[test]
    fn short_password_mentions_minimum_length() {
        let msg = message(check_password_policy("short1", "Password").unwrap_err());
        assert!(msg.contains("at least 8 characters"), "{msg}");
    }

    #[test]
    fn seven_character_password_is_rejected() {
        assert!(check_password_policy("abcdef1", "Password").is_err());
    }

    #[test]
    fn password_without_digit_is_rejected() {
        let msg = message(check_password_policy("alllettersnodigit", "Password").unwrap_err());
        assert!(msg.contains("one number"), "{msg}");
    }

    #[test]
    fn password_without_letter_is_rejected() {
        assert!(check_password_policy("1234567890", "Password").is_err());
    }

    #[test]
    fn password_outside_charset_is_rejected() {
        assert!(check_password_policy("Passw0rd with space", "Password").is_err());
    }

    #[test]
    fn valid_passwords_pass() {
        check_password_policy("Passw0rd!", "Password").unwrap();
        check_password_policy("abc12345", "Password").unwrap();
        check_password_policy("A1@$!%*#?&", "New password").unwrap();
    }
}
