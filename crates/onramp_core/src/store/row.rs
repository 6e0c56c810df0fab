//! Materialised result rows.

use rusqlite::types::{FromSql, FromSqlError, Value, ValueRef};
use std::sync::Arc;
use thiserror::Error;

/// Column access failure on a stored row.
#[derive(Debug, Error)]
pub enum ColumnError {
    #[error("column {0} is not part of the row")]
    Missing(String),
    #[error(transparent)]
    Decode(#[from] FromSqlError),
}

/// One result row, detached from the connection that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl StoredRow {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub(crate) fn from_sqlite(
        columns: &Arc<[String]>,
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<Self> {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(row.get::<_, Value>(idx)?);
        }
        Ok(Self::new(Arc::clone(columns), values))
    }

    /// Raw stored value of `column`.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Decodes `column` into `T` using its SQLite `FromSql` conversion.
    pub fn get<T: FromSql>(&self, column: &str) -> Result<T, ColumnError> {
        let value = self
            .value(column)
            .ok_or_else(|| ColumnError::Missing(column.to_string()))?;
        Ok(T::column_result(ValueRef::from(value))?)
    }
}
