//! Store bootstrap for file and in-memory databases.
//!
//! # Responsibility
//! - Open SQLite connections and apply connection pragmas.
//! - Create the actions table when absent and verify its columns.
//!
//! # Invariants
//! - Returned stores have every column of `schema::ACTION_COLUMNS`.
//! - Bootstrap never alters an existing table.

use super::schema::{ACTION_COLUMNS, CREATE_PLUGIN_INSTANCE_ACTIONS_SQL, TABLE_PLUGIN_INSTANCE_ACTIONS};
use super::{DbError, DbResult};
use crate::config::StoreConfig;
use crate::store::Store;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the store described by `config`.
///
/// A missing `database_path` selects an in-memory database.
pub fn open_store(config: &StoreConfig) -> DbResult<Store> {
    let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
    match config.database_path.as_deref() {
        Some(path) => open_with("file", busy_timeout, || Connection::open(path)),
        None => open_with("memory", busy_timeout, Connection::open_in_memory),
    }
}

/// Opens a file-backed store at `path`, creating the file when needed.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_store_at(path: impl AsRef<Path>) -> DbResult<Store> {
    let path = path.as_ref();
    open_with("file", DEFAULT_BUSY_TIMEOUT, || Connection::open(path))
}

/// Opens a private in-memory store.
pub fn open_store_in_memory() -> DbResult<Store> {
    open_with("memory", DEFAULT_BUSY_TIMEOUT, Connection::open_in_memory)
}

fn open_with(
    mode: &str,
    busy_timeout: Duration,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Store> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let conn = match connect() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&conn, busy_timeout) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(Store::from_connection(conn))
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(CREATE_PLUGIN_INSTANCE_ACTIONS_SQL)?;
    ensure_columns(conn, TABLE_PLUGIN_INSTANCE_ACTIONS, ACTION_COLUMNS)
}

fn ensure_columns(conn: &Connection, table: &str, columns: &[&str]) -> DbResult<()> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let present = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    for column in columns {
        if !present.iter().any(|name| name.eq_ignore_ascii_case(column)) {
            return Err(DbError::MissingColumn {
                table: table.to_string(),
                column: (*column).to_string(),
            });
        }
    }
    Ok(())
}
