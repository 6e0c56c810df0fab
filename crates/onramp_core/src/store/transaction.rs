//! Read-write transaction handle passed to `Store::read_write_transaction`.

use crate::store::context::CallContext;
use crate::store::mutation::{Mutation, Statement};
use crate::store::row::StoredRow;
use crate::store::status::{ExecError, StatusCode, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::Arc;

/// Statements issued through this handle observe one consistent snapshot and
/// commit or roll back together.
pub struct ReadWriteTransaction<'a> {
    conn: &'a Connection,
    ctx: &'a CallContext,
    commit_time: DateTime<Utc>,
}

impl<'a> ReadWriteTransaction<'a> {
    pub(crate) fn new(
        conn: &'a Connection,
        ctx: &'a CallContext,
        commit_time: DateTime<Utc>,
    ) -> Self {
        Self {
            conn,
            ctx,
            commit_time,
        }
    }

    /// Timestamp this transaction commits at. Later than every earlier commit
    /// on the same store.
    pub fn commit_timestamp(&self) -> DateTime<Utc> {
        self.commit_time
    }

    /// Runs a query inside the transaction and materialises every row.
    pub fn query(&self, statement: &Statement) -> StoreResult<Vec<StoredRow>> {
        self.ctx.check()?;
        run_query(self.conn, statement, false).map_err(|err| err.into_store(self.ctx))
    }

    /// Runs a DML statement and returns the number of affected rows.
    pub fn execute_update(&self, statement: &Statement) -> StoreResult<usize> {
        self.ctx.check()?;
        let params = statement.named_params();
        self.conn
            .prepare(statement.sql())
            .and_then(|mut prepared| prepared.execute(params.as_slice()))
            .map_err(|err| StoreError::from_sqlite(err, self.ctx))
    }

    /// Applies one mutation inside the transaction.
    pub fn apply_mutation(&self, mutation: &Mutation) -> StoreResult<()> {
        self.ctx.check()?;
        mutation
            .execute(self.conn)
            .map_err(|err| err.into_store(self.ctx))
    }
}

/// Prepares and runs `statement`, collecting all rows.
///
/// With `read_only` set, statements that would modify the database are rejected
/// before execution.
pub(crate) fn run_query(
    conn: &Connection,
    statement: &Statement,
    read_only: bool,
) -> Result<Vec<StoredRow>, ExecError> {
    let mut prepared = conn.prepare(statement.sql())?;
    if read_only && !prepared.readonly() {
        return Err(ExecError::Store(StoreError::new(
            StatusCode::InvalidArgument,
            "single-use reads only accept read-only statements",
        )));
    }

    let columns: Arc<[String]> = prepared
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let params = statement.named_params();
    let mut rows = prepared.query(params.as_slice())?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(StoredRow::from_sqlite(&columns, row)?);
    }
    Ok(out)
}
