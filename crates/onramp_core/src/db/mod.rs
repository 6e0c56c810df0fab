//! SQLite store bootstrap and the column registry.
//!
//! # Responsibility
//! - Open and configure the SQLite connection behind `Store`.
//! - Own table/column identifiers shared by read and write paths.
//!
//! # Invariants
//! - A returned `Store` has its table present with every registered column.
//! - Repository code never names a column outside `schema`.

use thiserror::Error;

mod open;
pub mod schema;

pub use open::{open_store, open_store_at, open_store_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("table {table} is missing column {column}")]
    MissingColumn { table: String, column: String },
}
