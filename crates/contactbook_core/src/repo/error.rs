//! Repository error type and its coarse classification.

use crate::db::DbError;
use crate::model::contact::ContactId;
use crate::model::group::GroupId;
use crate::model::validation::ModelValidationError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Column prefix SQLite reports for a `contact_in_group` uniqueness failure.
const MEMBERSHIP_UNIQUE_PREFIX: &str = "contact_in_group.";

/// Coarse error class used by façade and delivery layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced group or contact is missing or archived.
    NotFound,
    /// Malformed identifiers, arguments or field values.
    Validation,
    /// Concurrent add hit the membership uniqueness constraint; safe to retry.
    Conflict,
    /// Storage unreachable, deadline elapsed, or transaction aborted.
    Transport,
}

#[derive(Debug)]
pub enum RepoError {
    Validation(ModelValidationError),
    InvalidArgument(String),
    ContactNotFound(ContactId),
    GroupNotFound(GroupId),
    /// Membership uniqueness violation raised by a concurrent writer.
    Conflict(String),
    /// Request deadline elapsed at the named stage; the transaction was
    /// rolled back.
    Timeout {
        stage: &'static str,
    },
    Db(DbError),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContactNotFound(_) | Self::GroupNotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) | Self::InvalidArgument(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Timeout { .. }
            | Self::Db(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::InvalidData(_) => ErrorKind::Transport,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Timeout { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::ContactNotFound(id) => write!(f, "contact not found: {id}"),
            Self::GroupNotFound(id) => write!(f, "group not found: {id}"),
            Self::Conflict(message) => write!(f, "conflicting concurrent write: {message}"),
            Self::Timeout { stage } => write!(f, "deadline exceeded at `{stage}`"),
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &value {
            match failure.code {
                ErrorCode::ConstraintViolation
                    if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
                {
                    let message = message
                        .clone()
                        .unwrap_or_else(|| "unique constraint failed".to_string());
                    // Only a membership pair can collide because of a racing
                    // writer; a duplicate record id fails the same way on retry.
                    if message.contains(MEMBERSHIP_UNIQUE_PREFIX) {
                        return Self::Conflict(message);
                    }
                    return Self::InvalidArgument(format!("duplicate identifier: {message}"));
                }
                // busy_timeout is set to the remaining deadline, so running
                // out of lock wait means running out of time.
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    return Self::Timeout { stage: "lock_wait" };
                }
                ErrorCode::OperationInterrupted => {
                    return Self::Timeout { stage: "statement" };
                }
                _ => {}
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}
