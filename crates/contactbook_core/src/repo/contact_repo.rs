//! Contact repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `contacts` with soft-delete (archive) semantics.
//! - Trigger the group recount cascade when a contact is archived.
//!
//! # Invariants
//! - Read paths return active contacts only.
//! - Archiving a contact and recounting its groups commit together.

use super::membership_repo::recount_groups_for_contact_in_tx;
use super::query::{order_and_page_sql, ListQuery, Page};
use super::tx::{check_deadline, with_read_tx, with_write_tx};
use super::{bool_to_int, ensure_connection_ready, parse_flag, parse_uuid, RepoError, RepoResult};
use crate::context::{Deadline, RequestContext};
use crate::model::contact::{Contact, ContactId, Gender};
use crate::model::group::GroupId;
use crate::model::now_epoch_ms;
use crate::options::StoreOptions;
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const CONTACT_SELECT_SQL: &str = "SELECT
    id,
    created_at,
    modified_at,
    phone_number,
    email,
    name,
    surname,
    patronymic,
    age,
    gender,
    is_archived
FROM contacts";

/// Public sort keys accepted by contact listing.
const CONTACT_SORT_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("createdAt", "created_at"),
    ("phoneNumber", "phone_number"),
    ("email", "email"),
    ("name", "name"),
    ("surname", "surname"),
    ("patronymic", "patronymic"),
    ("age", "age"),
    ("gender", "gender"),
];

/// Repository interface for contact operations.
pub trait ContactRepository {
    /// Inserts all contacts in one transaction; none are kept on failure.
    fn create_contacts(&self, ctx: &RequestContext, contacts: &[Contact])
        -> RepoResult<Vec<Contact>>;
    /// Replaces profile fields of an active contact and returns the stored row.
    fn update_contact(&self, ctx: &RequestContext, contact: &Contact) -> RepoResult<Contact>;
    fn get_contact(&self, ctx: &RequestContext, id: ContactId) -> RepoResult<Option<Contact>>;
    /// Lists one page of active contacts together with the active total.
    fn list_contacts(&self, ctx: &RequestContext, query: &ListQuery)
        -> RepoResult<Page<Contact>>;
    fn count_contacts(&self, ctx: &RequestContext) -> RepoResult<u64>;
    /// Archives a contact and recounts every group it belongs to.
    ///
    /// Returns the recounted group ids.
    fn archive_contact(&self, ctx: &RequestContext, id: ContactId) -> RepoResult<Vec<GroupId>>;
}

/// SQLite-backed contact repository.
pub struct SqliteContactRepository<'conn> {
    conn: &'conn Connection,
    options: StoreOptions,
}

impl<'conn> SqliteContactRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection, options: StoreOptions) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["contacts", "groups", "contact_in_group"])?;
        Ok(Self {
            conn,
            options: options.sanitized(),
        })
    }
}

impl ContactRepository for SqliteContactRepository<'_> {
    fn create_contacts(
        &self,
        ctx: &RequestContext,
        contacts: &[Contact],
    ) -> RepoResult<Vec<Contact>> {
        if contacts.is_empty() {
            return Ok(Vec::new());
        }
        with_write_tx(
            self.conn,
            ctx,
            &self.options,
            "contact_create",
            |tx, deadline| {
                create_contacts_in_tx(tx, deadline, contacts)?;
                Ok(contacts.to_vec())
            },
        )
    }

    fn update_contact(&self, ctx: &RequestContext, contact: &Contact) -> RepoResult<Contact> {
        contact.validate()?;
        with_write_tx(
            self.conn,
            ctx,
            &self.options,
            "contact_update",
            |tx, deadline| {
                let changed = tx.execute(
                    "UPDATE contacts
                     SET
                        phone_number = ?2,
                        email = ?3,
                        name = ?4,
                        surname = ?5,
                        patronymic = ?6,
                        age = ?7,
                        gender = ?8,
                        modified_at = ?9
                     WHERE id = ?1
                       AND is_archived = 0;",
                    params![
                        contact.id.to_string(),
                        contact.phone_number.as_str(),
                        contact.email.as_str(),
                        contact.name.as_str(),
                        contact.surname.as_str(),
                        contact.patronymic.as_str(),
                        i64::from(contact.age),
                        contact.gender.as_str(),
                        now_epoch_ms(),
                    ],
                )?;
                if changed == 0 {
                    return Err(RepoError::ContactNotFound(contact.id));
                }
                check_deadline(deadline, "contact_reload")?;
                load_active_contact(tx, contact.id)?.ok_or(RepoError::ContactNotFound(contact.id))
            },
        )
    }

    fn get_contact(&self, ctx: &RequestContext, id: ContactId) -> RepoResult<Option<Contact>> {
        with_read_tx(self.conn, ctx, &self.options, "contact_get", |tx, _| {
            load_active_contact(tx, id)
        })
    }

    fn list_contacts(&self, ctx: &RequestContext, query: &ListQuery) -> RepoResult<Page<Contact>> {
        with_read_tx(self.conn, ctx, &self.options, "contact_list", |tx, _| {
            let mut bind_values: Vec<Value> = Vec::new();
            let mut sql = format!("{CONTACT_SELECT_SQL} WHERE is_archived = 0");
            sql.push_str(&order_and_page_sql(
                query,
                CONTACT_SORT_COLUMNS,
                &self.options,
                &mut bind_values,
            ));

            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                items.push(parse_contact_row(row)?);
            }
            Ok(Page {
                items,
                total: count_active_contacts(tx)?,
            })
        })
    }

    fn count_contacts(&self, ctx: &RequestContext) -> RepoResult<u64> {
        with_read_tx(self.conn, ctx, &self.options, "contact_count", |tx, _| {
            count_active_contacts(tx)
        })
    }

    fn archive_contact(&self, ctx: &RequestContext, id: ContactId) -> RepoResult<Vec<GroupId>> {
        with_write_tx(
            self.conn,
            ctx,
            &self.options,
            "contact_archive",
            |tx, deadline| {
                let changed = tx.execute(
                    "UPDATE contacts
                     SET
                        is_archived = 1,
                        modified_at = ?2
                     WHERE id = ?1
                       AND is_archived = 0;",
                    params![id.to_string(), now_epoch_ms()],
                )?;
                if changed == 0 {
                    return Err(RepoError::ContactNotFound(id));
                }

                let groups = recount_groups_for_contact_in_tx(tx, deadline, id)?;
                info!(
                    "event=contact_archive module=repo status=ok contact_id={id} recounted_groups={}",
                    groups.len()
                );
                Ok(groups)
            },
        )
    }
}

/// Validates and inserts contacts inside the caller's transaction.
///
/// Every contact is validated before the first insert so a bad record never
/// leaves earlier rows behind even when the caller ignores the error.
pub fn create_contacts_in_tx(
    conn: &Connection,
    deadline: &Deadline,
    contacts: &[Contact],
) -> RepoResult<()> {
    for contact in contacts {
        contact.validate()?;
    }

    let mut stmt = conn.prepare_cached(
        "INSERT INTO contacts (
            id,
            created_at,
            modified_at,
            phone_number,
            email,
            name,
            surname,
            patronymic,
            age,
            gender,
            is_archived
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
    )?;
    for contact in contacts {
        check_deadline(deadline, "contact_insert")?;
        stmt.execute(params![
            contact.id.to_string(),
            contact.created_at,
            contact.modified_at,
            contact.phone_number.as_str(),
            contact.email.as_str(),
            contact.name.as_str(),
            contact.surname.as_str(),
            contact.patronymic.as_str(),
            i64::from(contact.age),
            contact.gender.as_str(),
            bool_to_int(contact.is_archived),
        ])?;
    }
    Ok(())
}

fn load_active_contact(conn: &Connection, id: ContactId) -> RepoResult<Option<Contact>> {
    let mut stmt = conn.prepare(&format!(
        "{CONTACT_SELECT_SQL}
         WHERE id = ?1
           AND is_archived = 0;"
    ))?;
    let row = stmt
        .query_row([id.to_string()], |row| Ok(parse_contact_row(row)))
        .optional()?;
    row.transpose()
}

fn parse_contact_row(row: &Row<'_>) -> RepoResult<Contact> {
    let id_text: String = row.get("id")?;
    let gender_text: String = row.get("gender")?;
    let gender = Gender::parse(&gender_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid gender `{gender_text}` in contacts.gender"))
    })?;
    let age: i64 = row.get("age")?;
    let age = u8::try_from(age)
        .map_err(|_| RepoError::InvalidData(format!("invalid age `{age}` in contacts.age")))?;

    Ok(Contact {
        id: parse_uuid(&id_text, "contacts.id")?,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
        phone_number: row.get("phone_number")?,
        email: row.get("email")?,
        name: row.get("name")?,
        surname: row.get("surname")?,
        patronymic: row.get("patronymic")?,
        age,
        gender,
        is_archived: parse_flag(row.get("is_archived")?, "contacts.is_archived")?,
    })
}

fn count_active_contacts(conn: &Connection) -> RepoResult<u64> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(id) FROM contacts WHERE is_archived = 0;",
        [],
        |row| row.get(0),
    )?;
    Ok(total as u64)
}
