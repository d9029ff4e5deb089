//! Domain model for contacts, groups and their validation rules.
//!
//! # Invariants
//! - Every record is identified by a stable UUID that is never reused.
//! - Deletion is represented by the `is_archived` flag, not hard delete.
//! - Timestamps are Unix epoch milliseconds.

pub mod contact;
pub mod group;
pub mod validation;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
