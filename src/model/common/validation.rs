//! Field rules checked before any record reaches the database.
//!
//! Digits are spelled `[0-9]` in the patterns, since the `regex` crate's
//! `\d` matches any Unicode decimal digit.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Voter ID: three uppercase letters followed by seven digits.
pub const VOTER_ID_PATTERN: &str = "^[A-Z]{3}[0-9]{7}$";
/// Mobile number: ten digits, the first of which is 6-9.
pub const PHONE_PATTERN: &str = "^[6-9][0-9]{9}$";
/// Aadhar number: exactly twelve digits.
pub const AADHAR_NUMBER_PATTERN: &str = "^[0-9]{12}$";

/// Minimum length of a plaintext password.
pub const PASSWORD_MIN_CHARS: usize = 6;
/// Maximum length of a candidate manifesto.
pub const MANIFESTO_MAX_CHARS: usize = 1000;
/// Minimum age of a candidate.
pub const CANDIDATE_MIN_AGE: i32 = 25;

/// A field failed one of its rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`{0}` is required")]
    Missing(&'static str),
    #[error("`{0}` is not in the required format")]
    Format(&'static str),
    #[error("`{field}` must be at least {min} characters long")]
    TooShort { field: &'static str, min: usize },
    #[error("`{field}` must be at most {max} characters long")]
    TooLong { field: &'static str, max: usize },
    #[error("`{field}` must be at least {min}")]
    BelowMinimum { field: &'static str, min: i64 },
}

/// A record that can be normalised and checked before it is written.
pub trait Validate {
    /// Apply the field transformations (trimming, lowercasing) that happen
    /// on every write.
    fn normalise(&mut self);

    /// Check every field rule, reporting the first violation.
    fn validate(&self) -> Result<(), ValidationError>;
}

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| {
        Regex::new(pattern)
            .unwrap_or_else(|error| panic!("pattern {pattern} failed to compile: {error}"))
    })
}

pub fn is_voter_id(value: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, VOTER_ID_PATTERN).is_match(value)
}

pub fn is_phone(value: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, PHONE_PATTERN).is_match(value)
}

pub fn is_aadhar_number(value: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    compiled(&RE, AADHAR_NUMBER_PATTERN).is_match(value)
}

/// Required text must be non-empty.
pub fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Missing(field));
    }
    Ok(())
}

/// Required text that must also match `matches`.
pub fn require_format(
    field: &'static str,
    value: &str,
    matches: fn(&str) -> bool,
) -> Result<(), ValidationError> {
    require(field, value)?;
    if !matches(value) {
        return Err(ValidationError::Format(field));
    }
    Ok(())
}

pub fn min_chars(field: &'static str, value: &str, min: usize) -> Result<(), ValidationError> {
    if value.chars().count() < min {
        return Err(ValidationError::TooShort { field, min });
    }
    Ok(())
}

pub fn max_chars(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

pub fn at_least(field: &'static str, value: i64, min: i64) -> Result<(), ValidationError> {
    if value < min {
        return Err(ValidationError::BelowMinimum { field, min });
    }
    Ok(())
}

/// Trim `value` in place, without reallocating if nothing changes.
pub fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}
