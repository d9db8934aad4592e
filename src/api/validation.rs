//! Input validation for API requests.
//!
//! Validation runs at the boundary, before any core operation touches
//! storage. For collecting multiple validation errors and returning them as
//! an ApiError, use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for a plausible email shape (not full RFC 5322)
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// Maximum accepted length for a review body
pub const MAX_REVIEW_TEXT_LEN: usize = 5_000;

/// Validate a person-name field (first or last name)
pub fn validate_name(name: &str, field_name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{} is required", field_name));
    }
    if name.len() > 100 {
        return Err(format!("{} is too long (max 100 characters)", field_name));
    }
    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

/// Validate a password against the configured minimum length
pub fn validate_password(password: &str, min_length: usize) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }
    if password.len() < min_length {
        return Err(format!(
            "Password must be at least {} characters",
            min_length
        ));
    }
    Ok(())
}

/// Validate a review rating: an integer in [1,5]
pub fn validate_rating(rating: i64) -> Result<(), String> {
    if !(1..=5).contains(&rating) {
        return Err("Rating must be an integer between 1 and 5".to_string());
    }
    Ok(())
}

/// Validate a review body
pub fn validate_review_text(text: &str) -> Result<(), String> {
    if text.len() > MAX_REVIEW_TEXT_LEN {
        return Err(format!(
            "Review text is too long (max {} characters)",
            MAX_REVIEW_TEXT_LEN
        ));
    }
    Ok(())
}
