//! Core domain logic for the contact book.
//! This crate is the single source of truth for membership invariants.

pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod options;
pub mod repo;
pub mod service;

pub use context::{Deadline, RequestContext};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, LoggingConfig, LoggingHandle};
pub use model::contact::{Contact, ContactId, Gender};
pub use model::group::{Group, GroupId};
pub use model::validation::ModelValidationError;
pub use options::StoreOptions;
pub use repo::contact_repo::{ContactRepository, SqliteContactRepository};
pub use repo::group_repo::{GroupRepository, SqliteGroupRepository};
pub use repo::membership_repo::{MembershipRepository, SqliteMembershipRepository};
pub use repo::query::{ListQuery, Page};
pub use repo::{ErrorKind, RepoError, RepoResult};
pub use service::contact_service::ContactService;
pub use service::group_service::GroupService;
pub use service::{ListResult, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
