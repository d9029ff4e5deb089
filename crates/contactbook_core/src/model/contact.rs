//! Contact domain model.
//!
//! # Invariants
//! - `phone_number` holds ASCII digits only and is never empty.
//! - `is_archived` is the source of truth for soft deletion.
//! - Archived contacts never contribute to a group's `contact_count`.

use super::now_epoch_ms;
use super::validation::{
    normalize_phone_number, validate_email, validate_max_chars, validate_phone_number,
    ModelValidationError, CONTACT_AGE_MAX, CONTACT_NAME_MAX_CHARS, CONTACT_PATRONYMIC_MAX_CHARS,
    CONTACT_SURNAME_MAX_CHARS,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable contact identifier.
pub type ContactId = Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Unknown,
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    /// Parses the persisted/wire label. Unknown labels return `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unknown" | "" => Some(Self::Unknown),
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }
}

/// Contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub modified_at: i64,
    pub phone_number: String,
    /// Empty string means "no email".
    pub email: String,
    pub name: String,
    pub surname: String,
    pub patronymic: String,
    pub age: u8,
    pub gender: Gender,
    pub is_archived: bool,
}

impl Contact {
    /// Creates an active contact with a generated id.
    ///
    /// The phone number is normalized to its digits; call [`Contact::validate`]
    /// before persisting.
    pub fn new(phone_number: &str) -> Self {
        Self::with_id(Uuid::new_v4(), phone_number)
    }

    /// Creates an active contact with a caller-provided id.
    pub fn with_id(id: ContactId, phone_number: &str) -> Self {
        let now = now_epoch_ms();
        Self {
            id,
            created_at: now,
            modified_at: now,
            phone_number: normalize_phone_number(phone_number),
            email: String::new(),
            name: String::new(),
            surname: String::new(),
            patronymic: String::new(),
            age: 0,
            gender: Gender::Unknown,
            is_archived: false,
        }
    }

    /// Checks field-level rules before any write.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_phone_number(&self.phone_number)?;
        validate_email(&self.email)?;
        validate_max_chars("name", &self.name, CONTACT_NAME_MAX_CHARS)?;
        validate_max_chars("surname", &self.surname, CONTACT_SURNAME_MAX_CHARS)?;
        validate_max_chars("patronymic", &self.patronymic, CONTACT_PATRONYMIC_MAX_CHARS)?;
        if self.age > CONTACT_AGE_MAX {
            return Err(ModelValidationError::AgeOutOfRange(self.age));
        }
        Ok(())
    }

    /// `surname name patronymic`, skipping empty parts.
    pub fn full_name(&self) -> String {
        [
            self.surname.as_str(),
            self.name.as_str(),
            self.patronymic.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn is_active(&self) -> bool {
        !self.is_archived
    }
}
