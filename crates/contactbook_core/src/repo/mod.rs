//! Repository layer: SQLite persistence for contacts, groups and memberships.
//!
//! # Responsibility
//! - Define narrow, use-case oriented storage contracts.
//! - Own every SQL statement and every transaction boundary.
//! - Keep `groups.contact_count` consistent with membership rows.
//!
//! # Invariants
//! - Write paths validate models before SQL mutations.
//! - Each trait method runs in exactly one transaction bounded by the
//!   request deadline; `*_in_tx` helpers compose inside a caller's
//!   transaction instead.
//! - Repository APIs return semantic errors (`*NotFound`, `Conflict`,
//!   `Timeout`) in addition to DB transport errors.

pub mod contact_repo;
pub mod error;
pub mod group_repo;
pub mod membership_repo;
pub mod query;
mod tx;

pub use error::{ErrorKind, RepoError, RepoResult};
pub use tx::check_deadline;

use crate::db::migrations::latest_version;
use rusqlite::Connection;

/// Verifies the connection is migrated and carries the given tables.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn parse_flag(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<uuid::Uuid> {
    uuid::Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
