//! Group membership engine: keeps `groups.contact_count` in sync with
//! `contact_in_group` rows.
//!
//! # Responsibility
//! - Add, bulk-create and remove group members with deduplication.
//! - Cascade contact/group archival into membership rows and counts.
//!
//! # Invariants
//! - After every commit, `groups.contact_count` equals the number of
//!   membership rows of that group whose contact is not archived.
//! - At most one membership row per `(group_id, contact_id)`.
//! - Counts are always recomputed from rows, never adjusted by a delta.
//! - The dedup check and the insert run under the same write lock
//!   (`BEGIN IMMEDIATE`); the UNIQUE constraint surfaces any remaining race
//!   as `RepoError::Conflict`.

use super::contact_repo::create_contacts_in_tx;
use super::tx::{check_deadline, with_read_tx, with_write_tx};
use super::{ensure_connection_ready, parse_uuid, RepoError, RepoResult};
use crate::context::{Deadline, RequestContext};
use crate::model::contact::{Contact, ContactId};
use crate::model::group::GroupId;
use crate::model::now_epoch_ms;
use crate::options::StoreOptions;
use log::{debug, info};
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashSet;

/// Upper bound of ids bound into one `IN (...)` list.
const ID_CHUNK_SIZE: usize = 500;

/// Storage capability consumed by the group use-cases.
pub trait MembershipRepository {
    /// Persists new contacts and makes them members of `group_id`.
    ///
    /// An empty `contacts` slice is a no-op returning an empty list.
    fn create_contacts_into_group(
        &self,
        ctx: &RequestContext,
        group_id: GroupId,
        contacts: &[Contact],
    ) -> RepoResult<Vec<Contact>>;
    /// Links existing contacts to `group_id`, skipping pairs already linked.
    ///
    /// Returns only the newly linked contact ids, in no particular order.
    fn add_contacts_to_group(
        &self,
        ctx: &RequestContext,
        group_id: GroupId,
        contact_ids: &[ContactId],
    ) -> RepoResult<Vec<ContactId>>;
    /// Unlinks one contact; unlinking a non-member is not an error.
    fn remove_contact_from_group(
        &self,
        ctx: &RequestContext,
        group_id: GroupId,
        contact_id: ContactId,
    ) -> RepoResult<()>;
    /// Recounts every group linked to an (already archived) contact.
    fn on_contact_archived(
        &self,
        ctx: &RequestContext,
        contact_id: ContactId,
    ) -> RepoResult<Vec<GroupId>>;
    /// Archives a group, drops its membership rows and resets its count.
    fn on_group_archived(&self, ctx: &RequestContext, group_id: GroupId) -> RepoResult<()>;
    /// Active contact ids linked to an active group, oldest link first.
    fn list_group_members(
        &self,
        ctx: &RequestContext,
        group_id: GroupId,
    ) -> RepoResult<Vec<ContactId>>;
}

/// SQLite-backed membership engine.
pub struct SqliteMembershipRepository<'conn> {
    conn: &'conn Connection,
    options: StoreOptions,
}

impl<'conn> SqliteMembershipRepository<'conn> {
    /// Creates the engine from a migrated connection.
    pub fn try_new(conn: &'conn Connection, options: StoreOptions) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["contacts", "groups", "contact_in_group"])?;
        Ok(Self {
            conn,
            options: options.sanitized(),
        })
    }
}

impl MembershipRepository for SqliteMembershipRepository<'_> {
    fn create_contacts_into_group(
        &self,
        ctx: &RequestContext,
        group_id: GroupId,
        contacts: &[Contact],
    ) -> RepoResult<Vec<Contact>> {
        if contacts.is_empty() {
            return Ok(Vec::new());
        }
        with_write_tx(
            self.conn,
            ctx,
            &self.options,
            "group_create_contacts",
            |tx, deadline| {
                ensure_active_group_in_tx(tx, group_id)?;
                create_contacts_in_tx(tx, deadline, contacts)?;
                let contact_ids: Vec<ContactId> =
                    contacts.iter().map(|contact| contact.id).collect();
                fill_group_in_tx(tx, deadline, group_id, &contact_ids)?;
                Ok(contacts.to_vec())
            },
        )
    }

    fn add_contacts_to_group(
        &self,
        ctx: &RequestContext,
        group_id: GroupId,
        contact_ids: &[ContactId],
    ) -> RepoResult<Vec<ContactId>> {
        if contact_ids.is_empty() {
            return Ok(Vec::new());
        }
        with_write_tx(
            self.conn,
            ctx,
            &self.options,
            "group_add_contacts",
            |tx, deadline| {
                ensure_active_group_in_tx(tx, group_id)?;
                ensure_active_contacts_in_tx(tx, contact_ids)?;
                fill_group_in_tx(tx, deadline, group_id, contact_ids)
            },
        )
    }

    fn remove_contact_from_group(
        &self,
        ctx: &RequestContext,
        group_id: GroupId,
        contact_id: ContactId,
    ) -> RepoResult<()> {
        with_write_tx(
            self.conn,
            ctx,
            &self.options,
            "group_remove_contact",
            |tx, deadline| {
                ensure_active_group_in_tx(tx, group_id)?;
                let removed = tx.execute(
                    "DELETE FROM contact_in_group
                     WHERE group_id = ?1
                       AND contact_id = ?2;",
                    params![group_id.to_string(), contact_id.to_string()],
                )?;
                let count = recount_group_in_tx(tx, deadline, group_id)?;
                info!(
                    "event=membership_remove module=repo status=ok group_id={group_id} removed={removed} contact_count={count}"
                );
                Ok(())
            },
        )
    }

    fn on_contact_archived(
        &self,
        ctx: &RequestContext,
        contact_id: ContactId,
    ) -> RepoResult<Vec<GroupId>> {
        with_write_tx(
            self.conn,
            ctx,
            &self.options,
            "contact_archived_recount",
            |tx, deadline| recount_groups_for_contact_in_tx(tx, deadline, contact_id),
        )
    }

    fn on_group_archived(&self, ctx: &RequestContext, group_id: GroupId) -> RepoResult<()> {
        with_write_tx(
            self.conn,
            ctx,
            &self.options,
            "group_archive",
            |tx, deadline| archive_group_in_tx(tx, deadline, group_id),
        )
    }

    fn list_group_members(
        &self,
        ctx: &RequestContext,
        group_id: GroupId,
    ) -> RepoResult<Vec<ContactId>> {
        with_read_tx(self.conn, ctx, &self.options, "group_members", |tx, _| {
            ensure_active_group_in_tx(tx, group_id)?;
            let mut stmt = tx.prepare(
                "SELECT m.contact_id
                 FROM contact_in_group m
                 INNER JOIN contacts c ON c.id = m.contact_id
                 WHERE m.group_id = ?1
                   AND c.is_archived = 0
                 ORDER BY m.created_at ASC, m.contact_id ASC;",
            )?;
            let mut rows = stmt.query([group_id.to_string()])?;
            let mut members = Vec::new();
            while let Some(row) = rows.next()? {
                let value: String = row.get(0)?;
                members.push(parse_uuid(&value, "contact_in_group.contact_id")?);
            }
            Ok(members)
        })
    }
}

/// Links `contact_ids` to `group_id`, skipping existing pairs, then recounts.
///
/// Must run inside an open write transaction. Duplicates inside
/// `contact_ids` are collapsed. When nothing is new, no row is inserted and
/// the count is not rewritten. Returns the newly linked ids.
pub fn fill_group_in_tx(
    conn: &Connection,
    deadline: &Deadline,
    group_id: GroupId,
    contact_ids: &[ContactId],
) -> RepoResult<Vec<ContactId>> {
    check_deadline(deadline, "membership_dedup")?;
    let existing = existing_members_in_tx(conn, group_id, contact_ids)?;

    let mut seen = HashSet::with_capacity(contact_ids.len());
    let fresh: Vec<ContactId> = contact_ids
        .iter()
        .copied()
        .filter(|id| !existing.contains(id) && seen.insert(*id))
        .collect();

    if fresh.is_empty() {
        debug!(
            "event=membership_fill module=repo status=noop group_id={group_id} requested={}",
            contact_ids.len()
        );
        return Ok(fresh);
    }

    let now = now_epoch_ms();
    let mut stmt = conn.prepare_cached(
        "INSERT INTO contact_in_group (
            group_id,
            contact_id,
            created_at,
            modified_at
        ) VALUES (?1, ?2, ?3, ?3);",
    )?;
    for contact_id in &fresh {
        check_deadline(deadline, "membership_insert")?;
        stmt.execute(params![group_id.to_string(), contact_id.to_string(), now])?;
    }

    let count = recount_group_in_tx(conn, deadline, group_id)?;
    info!(
        "event=membership_fill module=repo status=ok group_id={group_id} requested={} inserted={} contact_count={count}",
        contact_ids.len(),
        fresh.len()
    );
    Ok(fresh)
}

/// Returns the subset of `candidates` already linked to `group_id`.
pub fn existing_members_in_tx(
    conn: &Connection,
    group_id: GroupId,
    candidates: &[ContactId],
) -> RepoResult<HashSet<ContactId>> {
    let mut existing = HashSet::new();
    for chunk in candidates.chunks(ID_CHUNK_SIZE) {
        let sql = format!(
            "SELECT contact_id
             FROM contact_in_group
             WHERE group_id = ?
               AND contact_id IN ({});",
            placeholders(chunk.len())
        );
        let mut bind_values = Vec::with_capacity(chunk.len() + 1);
        bind_values.push(group_id.to_string());
        bind_values.extend(chunk.iter().map(ToString::to_string));

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            existing.insert(parse_uuid(&value, "contact_in_group.contact_id")?);
        }
    }
    Ok(existing)
}

/// Recomputes `contact_count` of one group from its membership rows.
///
/// Returns the stored count.
pub fn recount_group_in_tx(
    conn: &Connection,
    deadline: &Deadline,
    group_id: GroupId,
) -> RepoResult<u64> {
    check_deadline(deadline, "recount")?;
    let count: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM contact_in_group m
         INNER JOIN contacts c ON c.id = m.contact_id
         WHERE m.group_id = ?1
           AND c.is_archived = 0;",
        [group_id.to_string()],
        |row| row.get(0),
    )?;
    conn.execute(
        "UPDATE groups
         SET contact_count = ?2
         WHERE id = ?1;",
        params![group_id.to_string(), count],
    )?;
    Ok(count as u64)
}

/// Recounts every group that has a membership row for `contact_id`.
///
/// Rows stay in place: archived contacts are excluded by the recount query.
pub fn recount_groups_for_contact_in_tx(
    conn: &Connection,
    deadline: &Deadline,
    contact_id: ContactId,
) -> RepoResult<Vec<GroupId>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT group_id
         FROM contact_in_group
         WHERE contact_id = ?1
         ORDER BY group_id ASC;",
    )?;
    let mut rows = stmt.query([contact_id.to_string()])?;
    let mut group_ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        group_ids.push(parse_uuid(&value, "contact_in_group.group_id")?);
    }

    for group_id in &group_ids {
        recount_group_in_tx(conn, deadline, *group_id)?;
    }
    Ok(group_ids)
}

/// Archives an active group, deletes its membership rows and recounts it.
pub fn archive_group_in_tx(
    conn: &Connection,
    deadline: &Deadline,
    group_id: GroupId,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE groups
         SET
            is_archived = 1,
            modified_at = ?2
         WHERE id = ?1
           AND is_archived = 0;",
        params![group_id.to_string(), now_epoch_ms()],
    )?;
    if changed == 0 {
        return Err(RepoError::GroupNotFound(group_id));
    }

    check_deadline(deadline, "group_clear")?;
    let removed = conn.execute(
        "DELETE FROM contact_in_group WHERE group_id = ?1;",
        [group_id.to_string()],
    )?;
    recount_group_in_tx(conn, deadline, group_id)?;
    info!("event=group_archive module=repo status=ok group_id={group_id} removed_members={removed}");
    Ok(())
}

/// Fails with `GroupNotFound` unless the group exists and is active.
pub fn ensure_active_group_in_tx(conn: &Connection, group_id: GroupId) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM groups
            WHERE id = ?1
              AND is_archived = 0
        );",
        [group_id.to_string()],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::GroupNotFound(group_id));
    }
    Ok(())
}

/// Fails with `ContactNotFound` for the first id that is missing or archived.
pub fn ensure_active_contacts_in_tx(conn: &Connection, contact_ids: &[ContactId]) -> RepoResult<()> {
    let mut active = HashSet::with_capacity(contact_ids.len());
    for chunk in contact_ids.chunks(ID_CHUNK_SIZE) {
        let sql = format!(
            "SELECT id
             FROM contacts
             WHERE is_archived = 0
               AND id IN ({});",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(chunk.iter().map(ToString::to_string)))?;
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            active.insert(parse_uuid(&value, "contacts.id")?);
        }
    }

    match contact_ids.iter().find(|id| !active.contains(*id)) {
        Some(missing) => Err(RepoError::ContactNotFound(*missing)),
        None => Ok(()),
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
