//! Transaction runner shared by all SQLite repositories.
//!
//! # Invariants
//! - Writes begin with `BEGIN IMMEDIATE`: the database write lock is held
//!   from the first read of a check-then-write sequence until commit.
//! - Lock waits never outlive the request deadline.
//! - Any error, including an elapsed deadline before commit, drops the
//!   transaction and rolls it back.

use super::{RepoError, RepoResult};
use crate::context::{Deadline, RequestContext};
use crate::options::StoreOptions;
use crate::repo::ErrorKind;
use log::{debug, error, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// Fails with `Timeout` once the deadline has elapsed.
pub fn check_deadline(deadline: &Deadline, stage: &'static str) -> RepoResult<()> {
    if deadline.is_elapsed() {
        return Err(RepoError::Timeout { stage });
    }
    Ok(())
}

/// Runs `f` inside one write transaction.
pub(crate) fn with_write_tx<T>(
    conn: &Connection,
    ctx: &RequestContext,
    options: &StoreOptions,
    operation: &'static str,
    f: impl FnOnce(&Transaction<'_>, &Deadline) -> RepoResult<T>,
) -> RepoResult<T> {
    with_tx(
        conn,
        ctx,
        options,
        operation,
        TransactionBehavior::Immediate,
        f,
    )
}

/// Runs `f` inside one read transaction for a consistent snapshot.
pub(crate) fn with_read_tx<T>(
    conn: &Connection,
    ctx: &RequestContext,
    options: &StoreOptions,
    operation: &'static str,
    f: impl FnOnce(&Transaction<'_>, &Deadline) -> RepoResult<T>,
) -> RepoResult<T> {
    with_tx(
        conn,
        ctx,
        options,
        operation,
        TransactionBehavior::Deferred,
        f,
    )
}

fn with_tx<T>(
    conn: &Connection,
    ctx: &RequestContext,
    options: &StoreOptions,
    operation: &'static str,
    behavior: TransactionBehavior,
    f: impl FnOnce(&Transaction<'_>, &Deadline) -> RepoResult<T>,
) -> RepoResult<T> {
    let started_at = Instant::now();
    let deadline = ctx.bounded_deadline(options.timeout);

    let result = run_tx(conn, &deadline, behavior, f);
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => debug!(
            "event=store_tx module=repo op={operation} status=ok request_id={} duration_ms={duration_ms}",
            ctx.request_id()
        ),
        Err(err) if err.kind() == ErrorKind::Transport => error!(
            "event=store_tx module=repo op={operation} status=error request_id={} duration_ms={duration_ms} error={err}",
            ctx.request_id()
        ),
        Err(err) => warn!(
            "event=store_tx module=repo op={operation} status=rejected request_id={} duration_ms={duration_ms} error={err}",
            ctx.request_id()
        ),
    }
    result
}

fn run_tx<T>(
    conn: &Connection,
    deadline: &Deadline,
    behavior: TransactionBehavior,
    f: impl FnOnce(&Transaction<'_>, &Deadline) -> RepoResult<T>,
) -> RepoResult<T> {
    check_deadline(deadline, "begin")?;
    conn.busy_timeout(deadline.remaining())?;

    let tx = Transaction::new_unchecked(conn, behavior)?;
    let value = f(&tx, deadline)?;
    check_deadline(deadline, "commit")?;
    tx.commit()?;
    Ok(value)
}
