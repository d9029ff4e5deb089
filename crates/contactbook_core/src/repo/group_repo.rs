//! Group repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `groups` with soft-delete (archive) semantics.
//! - Route archival through the membership engine so rows and count are
//!   cleared in the same transaction.
//!
//! # Invariants
//! - `contact_count` is never written from a caller-supplied value.
//! - Read paths return active groups only.

use super::membership_repo::archive_group_in_tx;
use super::query::{order_and_page_sql, ListQuery, Page};
use super::tx::{check_deadline, with_read_tx, with_write_tx};
use super::{bool_to_int, ensure_connection_ready, parse_flag, parse_uuid, RepoError, RepoResult};
use crate::context::RequestContext;
use crate::model::group::{Group, GroupId};
use crate::model::now_epoch_ms;
use crate::options::StoreOptions;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const GROUP_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    created_at,
    modified_at,
    contact_count,
    is_archived
FROM groups";

const GROUP_SORT_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("createdAt", "created_at"),
    ("name", "name"),
    ("description", "description"),
    ("contactCount", "contact_count"),
];

/// Repository interface for group operations.
pub trait GroupRepository {
    /// Persists a new group; its count always starts at zero.
    fn create_group(&self, ctx: &RequestContext, group: &Group) -> RepoResult<Group>;
    /// Replaces name and description of an active group.
    fn update_group(&self, ctx: &RequestContext, group: &Group) -> RepoResult<Group>;
    fn get_group(&self, ctx: &RequestContext, id: GroupId) -> RepoResult<Option<Group>>;
    /// Lists one page of active groups together with the active total.
    fn list_groups(&self, ctx: &RequestContext, query: &ListQuery)
        -> RepoResult<Page<Group>>;
    fn count_groups(&self, ctx: &RequestContext) -> RepoResult<u64>;
    /// Archives a group and drops its memberships.
    fn archive_group(&self, ctx: &RequestContext, id: GroupId) -> RepoResult<()>;
}

/// SQLite-backed group repository.
pub struct SqliteGroupRepository<'conn> {
    conn: &'conn Connection,
    options: StoreOptions,
}

impl<'conn> SqliteGroupRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection, options: StoreOptions) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["groups", "contact_in_group"])?;
        Ok(Self {
            conn,
            options: options.sanitized(),
        })
    }
}

impl GroupRepository for SqliteGroupRepository<'_> {
    fn create_group(&self, ctx: &RequestContext, group: &Group) -> RepoResult<Group> {
        group.validate()?;
        with_write_tx(
            self.conn,
            ctx,
            &self.options,
            "group_create",
            |tx, deadline| {
                tx.execute(
                    "INSERT INTO groups (
                        id,
                        name,
                        description,
                        created_at,
                        modified_at,
                        contact_count,
                        is_archived
                    ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6);",
                    params![
                        group.id.to_string(),
                        group.name.as_str(),
                        group.description.as_str(),
                        group.created_at,
                        group.modified_at,
                        bool_to_int(group.is_archived),
                    ],
                )?;
                check_deadline(deadline, "group_reload")?;
                load_group(tx, group.id)?.ok_or(RepoError::GroupNotFound(group.id))
            },
        )
    }

    fn update_group(&self, ctx: &RequestContext, group: &Group) -> RepoResult<Group> {
        group.validate()?;
        with_write_tx(
            self.conn,
            ctx,
            &self.options,
            "group_update",
            |tx, deadline| {
                let changed = tx.execute(
                    "UPDATE groups
                     SET
                        name = ?2,
                        description = ?3,
                        modified_at = ?4
                     WHERE id = ?1
                       AND is_archived = 0;",
                    params![
                        group.id.to_string(),
                        group.name.as_str(),
                        group.description.as_str(),
                        now_epoch_ms(),
                    ],
                )?;
                if changed == 0 {
                    return Err(RepoError::GroupNotFound(group.id));
                }
                check_deadline(deadline, "group_reload")?;
                load_group(tx, group.id)?.ok_or(RepoError::GroupNotFound(group.id))
            },
        )
    }

    fn get_group(&self, ctx: &RequestContext, id: GroupId) -> RepoResult<Option<Group>> {
        with_read_tx(self.conn, ctx, &self.options, "group_get", |tx, _| {
            Ok(load_group(tx, id)?.filter(Group::is_active))
        })
    }

    fn list_groups(&self, ctx: &RequestContext, query: &ListQuery) -> RepoResult<Page<Group>> {
        with_read_tx(self.conn, ctx, &self.options, "group_list", |tx, _| {
            let mut bind_values: Vec<Value> = Vec::new();
            let mut sql = format!("{GROUP_SELECT_SQL} WHERE is_archived = 0");
            sql.push_str(&order_and_page_sql(
                query,
                GROUP_SORT_COLUMNS,
                &self.options,
                &mut bind_values,
            ));

            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                items.push(parse_group_row(row)?);
            }
            Ok(Page {
                items,
                total: count_active_groups(tx)?,
            })
        })
    }

    fn count_groups(&self, ctx: &RequestContext) -> RepoResult<u64> {
        with_read_tx(self.conn, ctx, &self.options, "group_count", |tx, _| {
            count_active_groups(tx)
        })
    }

    fn archive_group(&self, ctx: &RequestContext, id: GroupId) -> RepoResult<()> {
        with_write_tx(
            self.conn,
            ctx,
            &self.options,
            "group_archive",
            |tx, deadline| archive_group_in_tx(tx, deadline, id),
        )
    }
}

fn load_group(conn: &Connection, id: GroupId) -> RepoResult<Option<Group>> {
    let mut stmt = conn.prepare(&format!("{GROUP_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id.to_string()], |row| Ok(parse_group_row(row)))
        .optional()?;
    row.transpose()
}

fn parse_group_row(row: &Row<'_>) -> RepoResult<Group> {
    let id_text: String = row.get("id")?;
    let contact_count: i64 = row.get("contact_count")?;
    let contact_count = u64::try_from(contact_count).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid count `{contact_count}` in groups.contact_count"
        ))
    })?;

    Ok(Group {
        id: parse_uuid(&id_text, "groups.id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
        contact_count,
        is_archived: parse_flag(row.get("is_archived")?, "groups.is_archived")?,
    })
}

fn count_active_groups(conn: &Connection) -> RepoResult<u64> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(id) FROM groups WHERE is_archived = 0;",
        [],
        |row| row.get(0),
    )?;
    Ok(total as u64)
}
