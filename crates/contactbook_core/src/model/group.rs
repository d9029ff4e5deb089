//! Group domain model.
//!
//! # Invariants
//! - `contact_count` is denormalized and only ever written by a recount from
//!   membership rows; callers never set it directly.
//! - Archived groups have no membership rows.

use super::now_epoch_ms;
use super::validation::{
    validate_max_chars, ModelValidationError, GROUP_DESCRIPTION_MAX_CHARS, GROUP_NAME_MAX_CHARS,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable group identifier.
pub type GroupId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub modified_at: i64,
    /// Number of non-archived contacts linked to this group.
    pub contact_count: u64,
    pub is_archived: bool,
}

impl Group {
    /// Creates an empty active group with a generated id.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            created_at: now,
            modified_at: now,
            contact_count: 0,
            is_archived: false,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.name.trim().is_empty() {
            return Err(ModelValidationError::BlankGroupName);
        }
        validate_max_chars("group name", &self.name, GROUP_NAME_MAX_CHARS)?;
        validate_max_chars(
            "group description",
            &self.description,
            GROUP_DESCRIPTION_MAX_CHARS,
        )?;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        !self.is_archived
    }
}
