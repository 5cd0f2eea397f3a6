//! Input rules shared by registration, password recovery and step-up.

use regex::Regex;

pub const INVALID_EMAIL: &str = "Please enter a valid email address.";
pub const WEAK_PASSWORD: &str =
    "Password must be at least 8 characters and include an uppercase letter, a lowercase letter and a number.";
pub const PASSWORD_MISMATCH: &str = "Passwords do not match.";

const MIN_PASSWORD_LEN: usize = 8;

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email.trim()))
}

/// At least 8 characters with upper case, lower case and a digit.
#[must_use]
pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// Capitalizes the first letter and terminates with a period. Cosmetic only.
#[must_use]
pub fn sentence_case(message: &str) -> String {
    let trimmed = message.trim();
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut out: String = first.to_uppercase().chain(chars).collect();
    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}
