use contactbook_core::db::{open_db, open_db_in_memory};
use contactbook_core::repo::membership_repo::fill_group_in_tx;
use contactbook_core::{
    Contact, ContactId, ContactRepository, Deadline, ErrorKind, Group, GroupId, GroupRepository,
    MembershipRepository, RepoError, RequestContext, SqliteContactRepository,
    SqliteGroupRepository, SqliteMembershipRepository, StoreOptions,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;
use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

fn ctx() -> RequestContext {
    RequestContext::new(Duration::from_secs(5))
}

struct Store<'conn> {
    contacts: SqliteContactRepository<'conn>,
    groups: SqliteGroupRepository<'conn>,
    members: SqliteMembershipRepository<'conn>,
}

impl<'conn> Store<'conn> {
    fn new(conn: &'conn Connection) -> Self {
        let options = StoreOptions::default();
        Self {
            contacts: SqliteContactRepository::try_new(conn, options).unwrap(),
            groups: SqliteGroupRepository::try_new(conn, options).unwrap(),
            members: SqliteMembershipRepository::try_new(conn, options).unwrap(),
        }
    }

    fn group(&self, name: &str) -> GroupId {
        self.groups
            .create_group(&ctx(), &Group::new(name, ""))
            .unwrap()
            .id
    }

    fn contacts(&self, count: usize) -> Vec<ContactId> {
        let batch: Vec<Contact> = (0..count)
            .map(|i| Contact::new(&format!("700{i}")))
            .collect();
        self.contacts.create_contacts(&ctx(), &batch).unwrap();
        batch.iter().map(|contact| contact.id).collect()
    }

    fn count(&self, group_id: GroupId) -> u64 {
        self.groups
            .get_group(&ctx(), group_id)
            .unwrap()
            .unwrap()
            .contact_count
    }
}

fn stored_count(conn: &Connection, group_id: GroupId) -> i64 {
    conn.query_row(
        "SELECT contact_count FROM groups WHERE id = ?1;",
        [group_id.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

fn live_member_count(conn: &Connection, group_id: GroupId) -> i64 {
    conn.query_row(
        "SELECT COUNT(*)
         FROM contact_in_group m
         INNER JOIN contacts c ON c.id = m.contact_id
         WHERE m.group_id = ?1
           AND c.is_archived = 0;",
        [group_id.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

fn membership_rows(conn: &Connection, group_id: GroupId) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM contact_in_group WHERE group_id = ?1;",
        [group_id.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

/// Records every write to `groups.contact_count` into a temp table.
fn track_count_writes(conn: &Connection) {
    conn.execute_batch(
        "CREATE TEMP TABLE count_writes (group_id TEXT NOT NULL);
         CREATE TEMP TRIGGER track_count_writes
         AFTER UPDATE OF contact_count ON groups
         BEGIN
             INSERT INTO count_writes (group_id) VALUES (NEW.id);
         END;",
    )
    .unwrap();
}

fn count_writes(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM count_writes;", [], |row| row.get(0))
        .unwrap()
}

fn assert_all_counts_consistent(conn: &Connection, groups: &[GroupId]) {
    for group_id in groups {
        assert_eq!(
            stored_count(conn, *group_id),
            live_member_count(conn, *group_id),
            "count drifted for group {group_id}"
        );
    }
}

#[test]
fn add_remove_archive_scenario_tracks_live_members() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let group = store.group("Scenario");
    let ids = store.contacts(3);
    let (c1, c2, c3) = (ids[0], ids[1], ids[2]);
    assert_eq!(store.count(group), 0);

    let inserted = store
        .members
        .add_contacts_to_group(&ctx(), group, &[c1, c2])
        .unwrap();
    assert_eq!(inserted.len(), 2);
    assert_eq!(store.count(group), 2);

    let inserted = store
        .members
        .add_contacts_to_group(&ctx(), group, &[c2, c3])
        .unwrap();
    assert_eq!(inserted, vec![c3]);
    assert_eq!(store.count(group), 3);

    store
        .members
        .remove_contact_from_group(&ctx(), group, c1)
        .unwrap();
    assert_eq!(store.count(group), 2);

    store.contacts.archive_contact(&ctx(), c2).unwrap();
    assert_eq!(store.count(group), 1);
    assert_eq!(
        store.members.list_group_members(&ctx(), group).unwrap(),
        vec![c3]
    );
}

#[test]
fn adding_same_contact_twice_keeps_one_row() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let group = store.group("Dupes");
    let c1 = store.contacts(1)[0];

    store
        .members
        .add_contacts_to_group(&ctx(), group, &[c1])
        .unwrap();
    track_count_writes(&conn);
    let second = store
        .members
        .add_contacts_to_group(&ctx(), group, &[c1])
        .unwrap();

    assert!(second.is_empty());
    assert_eq!(membership_rows(&conn, group), 1);
    assert_eq!(store.count(group), 1);
    assert_eq!(count_writes(&conn), 0);
}

#[test]
fn duplicate_ids_inside_one_request_are_collapsed() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let group = store.group("Collapse");
    let c1 = store.contacts(1)[0];

    let inserted = store
        .members
        .add_contacts_to_group(&ctx(), group, &[c1, c1, c1])
        .unwrap();
    assert_eq!(inserted, vec![c1]);
    assert_eq!(membership_rows(&conn, group), 1);
    assert_eq!(store.count(group), 1);
}

#[test]
fn removing_non_member_is_a_quiet_noop() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let group = store.group("Quiet");
    let ids = store.contacts(2);
    store
        .members
        .add_contacts_to_group(&ctx(), group, &ids[..1])
        .unwrap();

    store
        .members
        .remove_contact_from_group(&ctx(), group, ids[1])
        .unwrap();
    assert_eq!(store.count(group), 1);
    assert_eq!(membership_rows(&conn, group), 1);
}

#[test]
fn archiving_contact_decrements_exactly_its_groups() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let (a, b, c, d) = (
        store.group("A"),
        store.group("B"),
        store.group("C"),
        store.group("D"),
    );
    let ids = store.contacts(2);
    let (target, other) = (ids[0], ids[1]);
    for group in [a, b, c] {
        store
            .members
            .add_contacts_to_group(&ctx(), group, &[target, other])
            .unwrap();
    }
    store
        .members
        .add_contacts_to_group(&ctx(), d, &[other])
        .unwrap();

    let mut recounted = store.contacts.archive_contact(&ctx(), target).unwrap();
    recounted.sort();
    let mut expected = vec![a, b, c];
    expected.sort();
    assert_eq!(recounted, expected);

    for group in [a, b, c, d] {
        assert_eq!(store.count(group), 1);
    }
    assert_eq!(membership_rows(&conn, a), 2);
}

#[test]
fn on_contact_archived_recounts_after_external_archive() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let group = store.group("External");
    let ids = store.contacts(2);
    store
        .members
        .add_contacts_to_group(&ctx(), group, &ids)
        .unwrap();

    conn.execute(
        "UPDATE contacts SET is_archived = 1 WHERE id = ?1;",
        [ids[0].to_string()],
    )
    .unwrap();
    assert_eq!(store.count(group), 2);

    let recounted = store.members.on_contact_archived(&ctx(), ids[0]).unwrap();
    assert_eq!(recounted, vec![group]);
    assert_eq!(store.count(group), 1);
}

#[test]
fn bulk_create_of_zero_contacts_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let group = store.group("Empty");
    track_count_writes(&conn);

    let created = store
        .members
        .create_contacts_into_group(&ctx(), group, &[])
        .unwrap();
    let added = store
        .members
        .add_contacts_to_group(&ctx(), group, &[])
        .unwrap();

    assert!(created.is_empty());
    assert!(added.is_empty());
    assert_eq!(membership_rows(&conn, group), 0);
    assert_eq!(count_writes(&conn), 0);
}

#[test]
fn bulk_create_into_group_links_and_counts() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let group = store.group("Bulk");

    let batch = vec![Contact::new("1"), Contact::new("2"), Contact::new("3")];
    let created = store
        .members
        .create_contacts_into_group(&ctx(), group, &batch)
        .unwrap();

    assert_eq!(created, batch);
    assert_eq!(store.count(group), 3);
    assert_eq!(store.contacts.count_contacts(&ctx()).unwrap(), 3);
}

#[test]
fn bulk_create_failure_rolls_back_contacts_and_memberships() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let group = store.group("Atomic");

    let mut bad = Contact::new("2");
    bad.age = 250;
    let err = store
        .members
        .create_contacts_into_group(&ctx(), group, &[Contact::new("1"), bad])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(store.contacts.count_contacts(&ctx()).unwrap(), 0);
    assert_eq!(membership_rows(&conn, group), 0);

    let err = store
        .members
        .create_contacts_into_group(&ctx(), GroupId::new_v4(), &[Contact::new("1")])
        .unwrap_err();
    assert!(matches!(err, RepoError::GroupNotFound(_)));
    assert_eq!(store.contacts.count_contacts(&ctx()).unwrap(), 0);
}

#[test]
fn add_requires_active_group_and_contacts() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let group = store.group("Strict");
    let ids = store.contacts(2);
    store.contacts.archive_contact(&ctx(), ids[1]).unwrap();

    let missing = ContactId::new_v4();
    let err = store
        .members
        .add_contacts_to_group(&ctx(), group, &[ids[0], missing])
        .unwrap_err();
    assert!(matches!(err, RepoError::ContactNotFound(id) if id == missing));

    let err = store
        .members
        .add_contacts_to_group(&ctx(), group, &[ids[0], ids[1]])
        .unwrap_err();
    assert!(matches!(err, RepoError::ContactNotFound(id) if id == ids[1]));
    assert_eq!(membership_rows(&conn, group), 0);

    let err = store
        .members
        .add_contacts_to_group(&ctx(), GroupId::new_v4(), &[ids[0]])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn archiving_group_clears_rows_and_blocks_further_changes() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let group = store.group("Closing");
    let ids = store.contacts(3);
    store
        .members
        .add_contacts_to_group(&ctx(), group, &ids)
        .unwrap();

    store.members.on_group_archived(&ctx(), group).unwrap();
    assert_eq!(membership_rows(&conn, group), 0);
    assert_eq!(stored_count(&conn, group), 0);

    let err = store
        .members
        .add_contacts_to_group(&ctx(), group, &ids)
        .unwrap_err();
    assert!(matches!(err, RepoError::GroupNotFound(_)));
    let err = store
        .members
        .remove_contact_from_group(&ctx(), group, ids[0])
        .unwrap_err();
    assert!(matches!(err, RepoError::GroupNotFound(_)));
    let err = store.members.on_group_archived(&ctx(), group).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn elapsed_deadline_rolls_back_membership_writes() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let group = store.group("Late");
    let ids = store.contacts(2);
    track_count_writes(&conn);

    let expired = RequestContext::new(Duration::ZERO);
    let err = store
        .members
        .add_contacts_to_group(&expired, group, &ids)
        .unwrap_err();
    assert!(matches!(err, RepoError::Timeout { .. }));
    assert!(err.is_retryable());
    assert_eq!(membership_rows(&conn, group), 0);
    assert_eq!(count_writes(&conn), 0);
}

#[test]
fn lock_wait_past_deadline_times_out_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.db");
    let conn = open_db(&path).unwrap();
    let store = Store::new(&conn);
    let group = store.group("Locked");
    let ids = store.contacts(2);

    let holder = open_db(&path).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let started_at = Instant::now();
    let err = store
        .members
        .add_contacts_to_group(&RequestContext::new(Duration::from_millis(200)), group, &ids)
        .unwrap_err();
    let waited = started_at.elapsed();
    assert!(matches!(err, RepoError::Timeout { stage: "lock_wait" }));
    assert!(err.is_retryable());
    assert!(waited >= Duration::from_millis(150), "gave up after {waited:?}");
    assert!(waited < Duration::from_secs(5), "waited {waited:?}");

    holder.execute_batch("ROLLBACK;").unwrap();
    assert_eq!(membership_rows(&conn, group), 0);
    assert_eq!(stored_count(&conn, group), 0);

    let inserted = store
        .members
        .add_contacts_to_group(&ctx(), group, &ids)
        .unwrap();
    assert_eq!(inserted.len(), 2);
    assert_eq!(store.count(group), 2);
}

#[test]
fn deadline_elapsing_mid_transaction_discards_earlier_writes() {
    let mut conn = open_db_in_memory().unwrap();
    let (group, ids) = {
        let store = Store::new(&conn);
        (store.group("Midway"), store.contacts(2))
    };

    let tx = conn.transaction().unwrap();
    fill_group_in_tx(&tx, &Deadline::after(Duration::from_secs(5)), group, &ids[..1]).unwrap();
    assert_eq!(membership_rows(&tx, group), 1);

    let short = Deadline::after(Duration::from_millis(20));
    thread::sleep(Duration::from_millis(40));
    let err = fill_group_in_tx(&tx, &short, group, &ids[1..]).unwrap_err();
    assert!(matches!(err, RepoError::Timeout { .. }));
    drop(tx);

    assert_eq!(membership_rows(&conn, group), 0);
    assert_eq!(stored_count(&conn, group), 0);
}

#[test]
fn in_tx_helper_rolls_back_with_the_callers_transaction() {
    let mut conn = open_db_in_memory().unwrap();
    let (group, ids) = {
        let store = Store::new(&conn);
        (store.group("Caller"), store.contacts(2))
    };

    let tx = conn.transaction().unwrap();
    let inserted = fill_group_in_tx(&tx, &Deadline::after(Duration::from_secs(5)), group, &ids)
        .unwrap();
    assert_eq!(inserted.len(), 2);
    assert_eq!(stored_count(&tx, group), 2);
    drop(tx);

    assert_eq!(membership_rows(&conn, group), 0);
    assert_eq!(stored_count(&conn, group), 0);
}

#[test]
fn random_operation_sequences_keep_counts_consistent() {
    let conn = open_db_in_memory().unwrap();
    let store = Store::new(&conn);
    let mut rng = StdRng::seed_from_u64(0x5eed);

    let groups: Vec<GroupId> = (0..4).map(|i| store.group(&format!("G{i}"))).collect();
    let contacts = store.contacts(12);
    let mut archived: HashSet<ContactId> = HashSet::new();

    for _ in 0..300 {
        let group = *groups.choose(&mut rng).unwrap();
        match rng.gen_range(0..10) {
            0..=4 => {
                let size = rng.gen_range(1..=5);
                let picked: Vec<ContactId> = contacts
                    .choose_multiple(&mut rng, size)
                    .copied()
                    .collect();
                let result = store.members.add_contacts_to_group(&ctx(), group, &picked);
                if picked.iter().any(|id| archived.contains(id)) {
                    assert!(matches!(result, Err(RepoError::ContactNotFound(_))));
                } else {
                    result.unwrap();
                }
            }
            5..=7 => {
                let contact = *contacts.choose(&mut rng).unwrap();
                store
                    .members
                    .remove_contact_from_group(&ctx(), group, contact)
                    .unwrap();
            }
            _ => {
                let contact = *contacts.choose(&mut rng).unwrap();
                let result = store.contacts.archive_contact(&ctx(), contact);
                if archived.insert(contact) {
                    result.unwrap();
                } else {
                    assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
                }
            }
        }
        assert_all_counts_consistent(&conn, &groups);
    }
}

#[test]
fn concurrent_adds_of_same_contacts_insert_each_pair_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concurrent.db");

    let (group, ids) = {
        let conn = open_db(&path).unwrap();
        let store = Store::new(&conn);
        (store.group("Race"), store.contacts(20))
    };

    let workers: Vec<_> = (0..6)
        .map(|worker| {
            let path = path.clone();
            let mut ids = ids.clone();
            ids.rotate_left(worker * 3);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let members =
                    SqliteMembershipRepository::try_new(&conn, StoreOptions::default()).unwrap();
                loop {
                    match members.add_contacts_to_group(&ctx(), group, &ids) {
                        Ok(inserted) => return inserted,
                        Err(err) if err.is_retryable() => continue,
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                }
            })
        })
        .collect();

    let mut inserted_total = 0;
    for worker in workers {
        inserted_total += worker.join().unwrap().len();
    }

    let conn = open_db(&path).unwrap();
    assert_eq!(inserted_total, ids.len());
    assert_eq!(membership_rows(&conn, group), ids.len() as i64);
    assert_eq!(stored_count(&conn, group), ids.len() as i64);
}
