//! Transactional store boundary.
//!
//! # Responsibility
//! - Expose point reads, filtered scans, atomic mutation batches and
//!   read-write transactions over one shared SQLite handle.
//! - Report failures as structured `StatusCode`s.
//! - Assign commit timestamps.
//!
//! # Invariants
//! - `apply` and `read_write_transaction` are all-or-nothing.
//! - Commit timestamps strictly increase for one `Store`.
//! - Every call honours the caller's `CallContext`; an aborted call surfaces
//!   `Cancelled` or `DeadlineExceeded`.
//!
//! # See also
//! - `crate::db::open_store` for construction.

pub mod context;
pub mod mutation;
pub mod row;
pub mod status;
pub mod transaction;

pub use context::CallContext;
pub use mutation::{timestamp_value, Mutation, MutationOp, RowValues, Statement};
pub use row::{ColumnError, StoredRow};
pub use status::{StatusCode, StoreError, StoreResult};
pub use transaction::ReadWriteTransaction;

use crate::db::schema::TableSchema;
use chrono::{DateTime, Utc};
use log::debug;
use mutation::{key_predicate, quote};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};
use transaction::run_query;

/// Number of SQLite VM instructions between context checks.
const PROGRESS_HANDLER_OPS: i32 = 1_000;
/// Upper bound on one sleep while waiting for the connection.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Shared handle to the store. Construct once and pass around as `Arc<Store>`.
pub struct Store {
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    conn: Connection,
    last_commit: Option<DateTime<Utc>>,
}

impl Store {
    pub(crate) fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                conn,
                last_commit: None,
            }),
        }
    }

    /// Reads one row by full primary key.
    ///
    /// Reports `StatusCode::NotFound` when no row has the key.
    pub fn read_row(
        &self,
        ctx: &CallContext,
        table: &TableSchema,
        key: &[Value],
        columns: &[&str],
    ) -> StoreResult<StoredRow> {
        if key.len() != table.key_columns.len() {
            return Err(StoreError::new(
                StatusCode::InvalidArgument,
                format!(
                    "key for {} needs {} parts, got {}",
                    table.name,
                    table.key_columns.len(),
                    key.len()
                ),
            ));
        }
        if let Some(unknown) = columns.iter().find(|column| !table.has_column(column)) {
            return Err(StoreError::new(
                StatusCode::InvalidArgument,
                format!("unknown column {unknown} for table {}", table.name),
            ));
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE {};",
            columns
                .iter()
                .map(|column| quote(column))
                .collect::<Vec<_>>()
                .join(", "),
            quote(table.name),
            key_predicate(table, 1)
        );
        let names: Arc<[String]> = columns.iter().map(|column| column.to_string()).collect();

        self.with_connection(ctx, |conn| {
            let mut prepared = conn.prepare(&sql)?;
            prepared.query_row(params_from_iter(key.iter()), |row| {
                StoredRow::from_sqlite(&names, row)
            })
        })
    }

    /// Single-use read-only query. Rows are fully materialised.
    ///
    /// # Errors
    /// - `InvalidArgument` for statements that would modify the database.
    /// - `Cancelled` / `DeadlineExceeded` when `ctx` is done before or during the call.
    pub fn query(&self, ctx: &CallContext, statement: &Statement) -> StoreResult<Vec<StoredRow>> {
        let guard = self.lock(ctx)?;
        let _interrupt = InterruptGuard::install(&guard.conn, ctx);
        run_query(&guard.conn, statement, true).map_err(|err| err.into_store(ctx))
    }

    /// Applies `mutations` atomically and returns the commit timestamp.
    pub fn apply(&self, ctx: &CallContext, mutations: &[Mutation]) -> StoreResult<DateTime<Utc>> {
        let ((), commit_time) = self.read_write_transaction(ctx, |txn| {
            for mutation in mutations {
                txn.apply_mutation(mutation)?;
            }
            Ok(())
        })?;
        Ok(commit_time)
    }

    /// Runs `body` inside a read-write transaction.
    ///
    /// Commits when `body` returns `Ok` and the context is still live, rolls
    /// back otherwise. Returns the body's value with the commit timestamp,
    /// which is also exposed to `body` through
    /// `ReadWriteTransaction::commit_timestamp`.
    pub fn read_write_transaction<T, F>(
        &self,
        ctx: &CallContext,
        body: F,
    ) -> StoreResult<(T, DateTime<Utc>)>
    where
        F: FnOnce(&ReadWriteTransaction<'_>) -> StoreResult<T>,
    {
        let mut guard = self.lock(ctx)?;
        let inner = &mut *guard;
        let commit_time = next_commit_timestamp(&mut inner.last_commit);
        let conn = &inner.conn;

        let tx = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
            .map_err(|err| StoreError::from_sqlite(err, ctx))?;

        // The progress handler must be gone before COMMIT/ROLLBACK run, or a
        // done context could interrupt the rollback itself.
        let outcome = {
            let _interrupt = InterruptGuard::install(conn, ctx);
            body(&ReadWriteTransaction::new(conn, ctx, commit_time))
                .and_then(|value| ctx.check().map(|()| value))
        };

        match outcome {
            Ok(value) => {
                tx.commit().map_err(|err| StoreError::from_sqlite(err, ctx))?;
                Ok((value, commit_time))
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    debug!(
                        "event=txn_rollback module=store status=error error={}",
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    fn with_connection<T>(
        &self,
        ctx: &CallContext,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        let guard = self.lock(ctx)?;
        let _interrupt = InterruptGuard::install(&guard.conn, ctx);
        f(&guard.conn).map_err(|err| StoreError::from_sqlite(err, ctx))
    }

    /// Waits for the connection while `ctx` is live.
    ///
    /// The context is checked again once the lock is held, so a call whose
    /// deadline passed while waiting never runs.
    fn lock(&self, ctx: &CallContext) -> StoreResult<MutexGuard<'_, StoreInner>> {
        loop {
            ctx.check()?;
            match self.inner.try_lock() {
                Ok(guard) => {
                    ctx.check()?;
                    return Ok(guard);
                }
                Err(TryLockError::WouldBlock) => {
                    let pause = ctx
                        .deadline()
                        .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                        .map_or(LOCK_POLL_INTERVAL, |left| left.min(LOCK_POLL_INTERVAL));
                    thread::sleep(pause);
                }
                Err(TryLockError::Poisoned(_)) => {
                    return Err(StoreError::new(
                        StatusCode::Internal,
                        "store connection lock poisoned",
                    ))
                }
            }
        }
    }
}

/// Aborts running statements once the context is done; removed on drop.
struct InterruptGuard<'c> {
    conn: &'c Connection,
}

impl<'c> InterruptGuard<'c> {
    fn install(conn: &'c Connection, ctx: &CallContext) -> Self {
        let ctx = ctx.clone();
        conn.progress_handler(PROGRESS_HANDLER_OPS, Some(move || ctx.is_done()));
        Self { conn }
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

fn next_commit_timestamp(last: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    let next = match *last {
        Some(previous) if now <= previous => previous + chrono::Duration::microseconds(1),
        _ => now,
    };
    *last = Some(next);
    next
}
