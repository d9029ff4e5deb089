//! Field-level validation shared by contact and group models.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const CONTACT_NAME_MAX_CHARS: usize = 50;
pub const CONTACT_SURNAME_MAX_CHARS: usize = 100;
pub const CONTACT_PATRONYMIC_MAX_CHARS: usize = 100;
pub const CONTACT_AGE_MAX: u8 = 200;
pub const GROUP_NAME_MAX_CHARS: usize = 250;
pub const GROUP_DESCRIPTION_MAX_CHARS: usize = 1000;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,4}$").expect("valid email regex")
});

/// Validation failure for contact/group fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// Phone number has no digits left after normalization.
    PhoneNumberRequired,
    /// Phone number contains characters other than ASCII digits.
    InvalidPhoneNumber(String),
    /// Non-empty email does not match the accepted address shape.
    InvalidEmail(String),
    /// Text field exceeds its character budget.
    FieldTooLong {
        field: &'static str,
        max_chars: usize,
    },
    /// Age is above the accepted maximum.
    AgeOutOfRange(u8),
    /// Group name is empty after trim.
    BlankGroupName,
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PhoneNumberRequired => write!(f, "phone number is required"),
            Self::InvalidPhoneNumber(value) => {
                write!(f, "phone number must contain digits only, got `{value}`")
            }
            Self::InvalidEmail(value) => write!(f, "invalid email format: `{value}`"),
            Self::FieldTooLong { field, max_chars } => write!(
                f,
                "{field} must be less than or equal to {max_chars} characters"
            ),
            Self::AgeOutOfRange(age) => write!(
                f,
                "age must be less than or equal to {CONTACT_AGE_MAX}, got {age}"
            ),
            Self::BlankGroupName => write!(f, "group name must not be blank"),
        }
    }
}

impl Error for ModelValidationError {}

/// Keeps only ASCII digits of a raw phone number.
pub fn normalize_phone_number(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

pub(crate) fn validate_phone_number(value: &str) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::PhoneNumberRequired);
    }
    if !value.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ModelValidationError::InvalidPhoneNumber(value.to_string()));
    }
    Ok(())
}

pub(crate) fn validate_email(value: &str) -> Result<(), ModelValidationError> {
    if value.is_empty() {
        return Ok(());
    }
    if !EMAIL_RE.is_match(value.to_lowercase().as_str()) {
        return Err(ModelValidationError::InvalidEmail(value.to_string()));
    }
    Ok(())
}

pub(crate) fn validate_max_chars(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<(), ModelValidationError> {
    if value.chars().count() > max_chars {
        return Err(ModelValidationError::FieldTooLong { field, max_chars });
    }
    Ok(())
}
