//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use std::sync::OnceLock;

use rand::RngCore;
use regex::Regex;

use crate::utils::errors::{Result, RivayaError};

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid email regex")
    })
}

fn period_regex() -> &'static Regex {
    static PERIOD: OnceLock<Regex> = OnceLock::new();
    PERIOD.get_or_init(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").expect("valid period regex"))
}

/// Normalize an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && email_regex().is_match(email)
}

/// Contribution periods are calendar months, `YYYY-MM`
pub fn is_valid_period(period: &str) -> bool {
    period_regex().is_match(period)
}

/// ISO-4217 style three letter code, normalized to upper case
pub fn normalize_currency(currency: &str) -> Result<String> {
    let code = currency.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(RivayaError::Validation(
            "Currency code must be 3 letters".to_string(),
        ));
    }
    Ok(code)
}

/// Check a required string's trimmed length
pub fn require_length(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(RivayaError::Validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

/// Check an optional string's maximum length
pub fn optional_max_length(field: &str, value: Option<&str>, max: usize) -> Result<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(RivayaError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

/// Generate a random hex token of `bytes` random bytes
pub fn generate_token(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buffer);
    hex::encode(buffer)
}

/// Reduce an uploaded filename to a safe single path component
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let truncated: String = cleaned.chars().take(100).collect();

    if truncated.is_empty() {
        "file".to_string()
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("demo@rivaya.com"));
        assert!(is_valid_email("first.last+tag@example.co.ke"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert_eq!(normalize_email("  Demo@Rivaya.COM "), "demo@rivaya.com");
    }

    #[test]
    fn test_period_validation() {
        assert!(is_valid_period("2024-01"));
        assert!(is_valid_period("2024-12"));
        assert!(!is_valid_period("2024-13"));
        assert!(!is_valid_period("2024-1"));
    }

    #[test]
    fn test_currency_normalization() {
        assert_eq!(normalize_currency("kes").unwrap(), "KES");
        assert!(normalize_currency("KSHS").is_err());
        assert!(normalize_currency("K1S").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\photos\\family trip.jpg"), "family_trip.jpg");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename(""), "file");
    }

    #[test]
    fn test_generate_token() {
        let a = generate_token(32);
        let b = generate_token(32);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn sanitized_names_are_single_safe_components(name in ".{0,200}") {
            let cleaned = sanitize_filename(&name);
            prop_assert!(!cleaned.is_empty());
            prop_assert!(!cleaned.contains('/'));
            prop_assert!(!cleaned.contains('\\'));
            prop_assert!(!cleaned.starts_with('.'));
            prop_assert!(cleaned.chars().count() <= 100);
        }
    }
}
