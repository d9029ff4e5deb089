//! Transport-neutral request handlers for the contact book.
//!
//! # Responsibility
//! - Expose one handler per use-case returning a status-coded JSON envelope.
//! - Parse identifiers and request bodies before touching storage.
//! - Map core error kinds to HTTP-style status codes.
//!
//! # Invariants
//! - Handlers never panic; every failure becomes an `ErrorResponse`.
//! - Each call opens its own connection and drops it before returning.
//! - Each call gets a fresh `RequestContext` bounded by the store timeout.

use crate::dto::{
    ContactRequest, ContactResponse, CountResponse, ErrorResponse, GroupRequest, GroupResponse,
    IdsResponse, ListParams, ListResponse,
};
use contactbook_core::db::open_db;
use contactbook_core::{
    ContactService, DbError, ErrorKind, GroupService, ListQuery, RepoError, RequestContext,
    ServiceError, SqliteContactRepository, SqliteGroupRepository, SqliteMembershipRepository,
    StoreOptions,
};
use log::{error, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_NO_CONTENT: u16 = 204;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_INTERNAL_ERROR: u16 = 500;
pub const STATUS_GATEWAY_TIMEOUT: u16 = 504;

const DEFAULT_DB_FILE_NAME: &str = "contactbook.sqlite3";

/// Where and how the handlers reach storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub db_path: PathBuf,
    pub options: StoreOptions,
}

impl ApiConfig {
    pub fn new(db_path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            db_path: db_path.into(),
            options: options.sanitized(),
        }
    }

    /// Resolves a user-supplied database path (blank means the temp-dir
    /// default) and reads store options from the environment.
    pub fn resolve(db_path: Option<&str>) -> Result<Self, String> {
        Ok(Self::new(resolve_db_path(db_path), StoreOptions::from_env()?))
    }
}

fn resolve_db_path(raw: Option<&str>) -> PathBuf {
    raw.map(str::trim)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME))
}

/// Handler result: status code plus JSON body (`null` for 204).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

#[derive(Debug)]
struct ApiError {
    status: u16,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_INTERNAL_ERROR,
            message: message.into(),
        }
    }
}

/// Maps a core error class to a response status.
pub fn status_for(kind: ErrorKind, is_timeout: bool) -> u16 {
    match kind {
        ErrorKind::NotFound => STATUS_NOT_FOUND,
        ErrorKind::Validation => STATUS_BAD_REQUEST,
        ErrorKind::Conflict => STATUS_CONFLICT,
        ErrorKind::Transport if is_timeout => STATUS_GATEWAY_TIMEOUT,
        ErrorKind::Transport => STATUS_INTERNAL_ERROR,
    }
}

impl From<RepoError> for ApiError {
    fn from(value: RepoError) -> Self {
        let is_timeout = matches!(value, RepoError::Timeout { .. });
        Self {
            status: status_for(value.kind(), is_timeout),
            message: value.to_string(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Repo(err) => err.into(),
            other => Self {
                status: status_for(other.kind(), false),
                message: other.to_string(),
            },
        }
    }
}

impl From<DbError> for ApiError {
    fn from(value: DbError) -> Self {
        Self::internal(format!("database unavailable: {value}"))
    }
}

type ContactServiceImpl<'conn> = ContactService<SqliteContactRepository<'conn>>;
type GroupServiceImpl<'conn> =
    GroupService<SqliteGroupRepository<'conn>, SqliteMembershipRepository<'conn>>;

/// Request handlers over one database file.
pub struct Api {
    config: ApiConfig,
}

impl Api {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }

    // Contacts.

    pub fn create_contacts(&self, requests: Vec<ContactRequest>) -> ApiResponse {
        self.handle("contact_create", STATUS_CREATED, |conn, ctx| {
            let contacts = requests
                .into_iter()
                .map(|request| request.into_contact(None))
                .collect::<Result<Vec<_>, _>>()
                .map_err(ApiError::bad_request)?;
            let created = self.contact_service(conn)?.create_contacts(ctx, &contacts)?;
            Ok(to_responses::<ContactResponse, _>(created))
        })
    }

    pub fn update_contact(&self, id: &str, request: ContactRequest) -> ApiResponse {
        self.handle("contact_update", STATUS_OK, |conn, ctx| {
            let id = parse_id(id, "contact id")?;
            let contact = request.into_contact(Some(id)).map_err(ApiError::bad_request)?;
            let updated = self.contact_service(conn)?.update_contact(ctx, &contact)?;
            Ok(ContactResponse::from(updated))
        })
    }

    pub fn get_contact(&self, id: &str) -> ApiResponse {
        self.handle("contact_get", STATUS_OK, |conn, ctx| {
            let id = parse_id(id, "contact id")?;
            let contact = self.contact_service(conn)?.get_contact(ctx, id)?;
            Ok(ContactResponse::from(contact))
        })
    }

    pub fn list_contacts(&self, params: ListParams) -> ApiResponse {
        self.handle("contact_list", STATUS_OK, |conn, ctx| {
            let query = to_query(&params);
            let page = self.contact_service(conn)?.list_contacts(ctx, &query)?;
            Ok(ListResponse::<ContactResponse>::from_result(page))
        })
    }

    pub fn count_contacts(&self) -> ApiResponse {
        self.handle("contact_count", STATUS_OK, |conn, ctx| {
            let total = self.contact_service(conn)?.count_contacts(ctx)?;
            Ok(CountResponse { total })
        })
    }

    pub fn archive_contact(&self, id: &str) -> ApiResponse {
        self.handle("contact_archive", STATUS_NO_CONTENT, |conn, ctx| {
            let id = parse_id(id, "contact id")?;
            self.contact_service(conn)?.archive_contact(ctx, id)?;
            Ok(())
        })
    }

    // Groups.

    pub fn create_group(&self, request: GroupRequest) -> ApiResponse {
        self.handle("group_create", STATUS_CREATED, |conn, ctx| {
            let group = self
                .group_service(conn)?
                .create_group(ctx, &request.into_group(None))?;
            Ok(GroupResponse::from(group))
        })
    }

    pub fn update_group(&self, id: &str, request: GroupRequest) -> ApiResponse {
        self.handle("group_update", STATUS_OK, |conn, ctx| {
            let id = parse_id(id, "group id")?;
            let group = self
                .group_service(conn)?
                .update_group(ctx, &request.into_group(Some(id)))?;
            Ok(GroupResponse::from(group))
        })
    }

    pub fn get_group(&self, id: &str) -> ApiResponse {
        self.handle("group_get", STATUS_OK, |conn, ctx| {
            let id = parse_id(id, "group id")?;
            let group = self.group_service(conn)?.get_group(ctx, id)?;
            Ok(GroupResponse::from(group))
        })
    }

    pub fn list_groups(&self, params: ListParams) -> ApiResponse {
        self.handle("group_list", STATUS_OK, |conn, ctx| {
            let query = to_query(&params);
            let page = self.group_service(conn)?.list_groups(ctx, &query)?;
            Ok(ListResponse::<GroupResponse>::from_result(page))
        })
    }

    pub fn count_groups(&self) -> ApiResponse {
        self.handle("group_count", STATUS_OK, |conn, ctx| {
            let total = self.group_service(conn)?.count_groups(ctx)?;
            Ok(CountResponse { total })
        })
    }

    pub fn archive_group(&self, id: &str) -> ApiResponse {
        self.handle("group_archive", STATUS_NO_CONTENT, |conn, ctx| {
            let id = parse_id(id, "group id")?;
            self.group_service(conn)?.archive_group(ctx, id)?;
            Ok(())
        })
    }

    // Membership.

    pub fn create_contacts_into_group(
        &self,
        group_id: &str,
        requests: Vec<ContactRequest>,
    ) -> ApiResponse {
        self.handle("group_create_contacts", STATUS_CREATED, |conn, ctx| {
            let group_id = parse_id(group_id, "group id")?;
            let contacts = requests
                .into_iter()
                .map(|request| request.into_contact(None))
                .collect::<Result<Vec<_>, _>>()
                .map_err(ApiError::bad_request)?;
            let created = self
                .group_service(conn)?
                .create_contacts_into_group(ctx, group_id, &contacts)?;
            Ok(to_responses::<ContactResponse, _>(created))
        })
    }

    /// Links existing contacts; the body lists only newly linked ids.
    pub fn add_contacts_to_group(&self, group_id: &str, contact_ids: &[String]) -> ApiResponse {
        self.handle("group_add_contacts", STATUS_OK, |conn, ctx| {
            let group_id = parse_id(group_id, "group id")?;
            let contact_ids = contact_ids
                .iter()
                .map(|raw| parse_id(raw, "contact id"))
                .collect::<Result<Vec<_>, _>>()?;
            let added = self
                .group_service(conn)?
                .add_contacts_to_group(ctx, group_id, &contact_ids)?;
            Ok(IdsResponse { list: added })
        })
    }

    pub fn remove_contact_from_group(&self, group_id: &str, contact_id: &str) -> ApiResponse {
        self.handle("group_remove_contact", STATUS_NO_CONTENT, |conn, ctx| {
            let group_id = parse_id(group_id, "group id")?;
            let contact_id = parse_id(contact_id, "contact id")?;
            self.group_service(conn)?
                .remove_contact_from_group(ctx, group_id, contact_id)?;
            Ok(())
        })
    }

    pub fn list_group_members(&self, group_id: &str) -> ApiResponse {
        self.handle("group_members", STATUS_OK, |conn, ctx| {
            let group_id = parse_id(group_id, "group id")?;
            let members = self
                .group_service(conn)?
                .list_group_members(ctx, group_id)?;
            Ok(IdsResponse { list: members })
        })
    }

    fn contact_service<'conn>(
        &self,
        conn: &'conn Connection,
    ) -> Result<ContactServiceImpl<'conn>, ApiError> {
        let repo = SqliteContactRepository::try_new(conn, self.config.options)?;
        Ok(ContactService::new(repo, self.config.options))
    }

    fn group_service<'conn>(
        &self,
        conn: &'conn Connection,
    ) -> Result<GroupServiceImpl<'conn>, ApiError> {
        let groups = SqliteGroupRepository::try_new(conn, self.config.options)?;
        let members = SqliteMembershipRepository::try_new(conn, self.config.options)?;
        Ok(GroupService::new(groups, members, self.config.options))
    }

    fn handle<T: Serialize>(
        &self,
        operation: &'static str,
        success_status: u16,
        f: impl FnOnce(&Connection, &RequestContext) -> Result<T, ApiError>,
    ) -> ApiResponse {
        let started_at = Instant::now();
        let ctx = RequestContext::new(self.config.options.timeout);

        let result = open_db(&self.config.db_path)
            .map_err(ApiError::from)
            .and_then(|conn| f(&conn, &ctx))
            .and_then(|value| {
                serde_json::to_value(value)
                    .map_err(|err| ApiError::internal(format!("response encoding failed: {err}")))
            });
        let duration_ms = started_at.elapsed().as_millis();

        match result {
            Ok(body) => {
                info!(
                    "event=api_request module=api op={operation} status=ok http_status={success_status} request_id={} duration_ms={duration_ms}",
                    ctx.request_id()
                );
                let body = if success_status == STATUS_NO_CONTENT {
                    Value::Null
                } else {
                    body
                };
                ApiResponse {
                    status: success_status,
                    body,
                }
            }
            Err(err) => {
                if err.status >= STATUS_INTERNAL_ERROR {
                    error!(
                        "event=api_request module=api op={operation} status=error http_status={} request_id={} duration_ms={duration_ms} error={}",
                        err.status,
                        ctx.request_id(),
                        err.message
                    );
                } else {
                    warn!(
                        "event=api_request module=api op={operation} status=rejected http_status={} request_id={} duration_ms={duration_ms} error={}",
                        err.status,
                        ctx.request_id(),
                        err.message
                    );
                }
                error_response(err.status, ctx.request_id(), err.message)
            }
        }
    }
}

fn error_response(status: u16, request_id: Uuid, message: String) -> ApiResponse {
    let body = serde_json::to_value(ErrorResponse {
        id: request_id,
        message,
    })
    .unwrap_or(Value::Null);
    ApiResponse { status, body }
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("invalid {what}: `{raw}`")))
}

fn to_query(params: &ListParams) -> ListQuery {
    ListQuery::new(params.sort.as_deref(), params.limit, params.offset)
}

fn to_responses<T: From<S>, S>(items: Vec<S>) -> Vec<T> {
    items.into_iter().map(T::from).collect()
}
