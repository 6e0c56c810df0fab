//! Write mutations, parameterised statements and value encoding.

use crate::db::schema::TableSchema;
use crate::store::status::{ExecError, StatusCode, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ToSql};
use std::collections::BTreeMap;

/// Column name to value map for one row.
pub type RowValues = BTreeMap<&'static str, Value>;

/// Text layout shared with rusqlite's chrono `FromSql`/`ToSql` support.
const TIMESTAMP_FORMAT: &str = "%F %T%.f%:z";

/// Encodes a timestamp as stored text.
pub fn timestamp_value(value: DateTime<Utc>) -> Value {
    Value::Text(value.format(TIMESTAMP_FORMAT).to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Insert,
    Update,
}

/// One row-level write, applied by `Store::apply`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    op: MutationOp,
    table: &'static TableSchema,
    row: RowValues,
}

impl Mutation {
    /// Inserts a new row; fails with `AlreadyExists` when the key is taken.
    pub fn insert_map(table: &'static TableSchema, row: RowValues) -> Self {
        Self {
            op: MutationOp::Insert,
            table,
            row,
        }
    }

    /// Updates the non-key columns present in `row`; fails with `NotFound`
    /// when the key does not exist. Columns absent from `row` keep their value.
    pub fn update_map(table: &'static TableSchema, row: RowValues) -> Self {
        Self {
            op: MutationOp::Update,
            table,
            row,
        }
    }

    pub fn op(&self) -> MutationOp {
        self.op
    }

    pub fn table(&self) -> &'static TableSchema {
        self.table
    }

    pub fn row(&self) -> &RowValues {
        &self.row
    }

    fn validate(&self) -> StoreResult<()> {
        for column in self.row.keys() {
            if !self.table.has_column(column) {
                return Err(StoreError::new(
                    StatusCode::InvalidArgument,
                    format!("unknown column {column} for table {}", self.table.name),
                ));
            }
        }
        for key in self.table.key_columns {
            if !self.row.contains_key(key) {
                return Err(StoreError::new(
                    StatusCode::InvalidArgument,
                    format!("mutation on {} is missing key column {key}", self.table.name),
                ));
            }
        }
        Ok(())
    }

    /// Executes this mutation on `conn`, which must be inside a transaction.
    pub(crate) fn execute(&self, conn: &Connection) -> Result<(), ExecError> {
        self.validate().map_err(ExecError::Store)?;
        match self.op {
            MutationOp::Insert => {
                let columns: Vec<&str> = self.row.keys().copied().collect();
                let placeholders: Vec<String> =
                    (1..=columns.len()).map(|idx| format!("?{idx}")).collect();
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({});",
                    quote(self.table.name),
                    columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
                    placeholders.join(", ")
                );
                conn.execute(&sql, params_from_iter(self.row.values()))?;
                Ok(())
            }
            MutationOp::Update => {
                let assignments: Vec<(&str, &Value)> = self
                    .row
                    .iter()
                    .filter(|(column, _)| !self.table.is_key_column(column))
                    .map(|(column, value)| (*column, value))
                    .collect();
                let keys: Vec<&Value> = self
                    .table
                    .key_columns
                    .iter()
                    .filter_map(|key| self.row.get(key))
                    .collect();

                let mut bind: Vec<&dyn ToSql> = Vec::new();
                let changed = if assignments.is_empty() {
                    // Key-only update: nothing to write, but the row must exist.
                    let sql = format!(
                        "SELECT COUNT(*) FROM {} WHERE {};",
                        quote(self.table.name),
                        key_predicate(self.table, 1)
                    );
                    bind.extend(keys.iter().map(|value| *value as &dyn ToSql));
                    conn.query_row(&sql, bind.as_slice(), |row| row.get::<_, i64>(0))? as usize
                } else {
                    let set_clause = assignments
                        .iter()
                        .enumerate()
                        .map(|(idx, (column, _))| format!("{} = ?{}", quote(column), idx + 1))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let sql = format!(
                        "UPDATE {} SET {} WHERE {};",
                        quote(self.table.name),
                        set_clause,
                        key_predicate(self.table, assignments.len() + 1)
                    );
                    bind.extend(assignments.iter().map(|(_, value)| *value as &dyn ToSql));
                    bind.extend(keys.iter().map(|value| *value as &dyn ToSql));
                    conn.execute(&sql, bind.as_slice())?
                };

                if changed == 0 {
                    return Err(ExecError::Store(StoreError::new(
                        StatusCode::NotFound,
                        format!("row not found in table {}", self.table.name),
                    )));
                }
                Ok(())
            }
        }
    }
}

/// SQL text with named `@param` bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<(String, Value)>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Binds `value` to `@name` in the SQL text.
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.push((format!("@{name}"), value.into()));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub(crate) fn named_params(&self) -> Vec<(&str, &dyn ToSql)> {
        self.params
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect()
    }
}

/// `"K1" = ?n AND "K2" = ?n+1 ...` over the table's key columns.
pub(crate) fn key_predicate(table: &TableSchema, first_index: usize) -> String {
    table
        .key_columns
        .iter()
        .enumerate()
        .map(|(offset, column)| format!("{} = ?{}", quote(column), first_index + offset))
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::{key_predicate, timestamp_value, Mutation, RowValues, Statement};
    use crate::db::schema::{COLUMN_ACTION_ID, COLUMN_PLUGIN_ID, PLUGIN_INSTANCE_ACTIONS};
    use crate::store::status::StatusCode;
    use chrono::{DateTime, TimeZone, Utc};
    use rusqlite::types::{FromSql, Value, ValueRef};

    #[test]
    fn timestamp_text_decodes_through_rusqlite_chrono() {
        let original = Utc.with_ymd_and_hms(2025, 3, 9, 8, 30, 15).single().expect("valid timestamp")
            + chrono::Duration::nanoseconds(123_456_789);
        let stored = timestamp_value(original);
        let decoded = match &stored {
            Value::Text(text) => DateTime::<Utc>::column_result(ValueRef::Text(text.as_bytes()))
                .expect("timestamp should decode"),
            other => panic!("unexpected stored value: {other:?}"),
        };
        assert_eq!(decoded, original);
    }

    #[test]
    fn key_predicate_numbers_placeholders_from_offset() {
        assert_eq!(
            key_predicate(&PLUGIN_INSTANCE_ACTIONS, 3),
            "\"PluginID\" = ?3 AND \"PluginInstanceID\" = ?4 AND \"ActionID\" = ?5"
        );
    }

    #[test]
    fn mutation_without_all_key_columns_is_rejected() {
        let mut row = RowValues::new();
        row.insert(COLUMN_PLUGIN_ID, Value::Text("custom-azure".into()));
        row.insert(COLUMN_ACTION_ID, Value::Text("a".into()));
        let err = Mutation::insert_map(&PLUGIN_INSTANCE_ACTIONS, row)
            .validate()
            .expect_err("mutation should be rejected");
        assert_eq!(err.code(), StatusCode::InvalidArgument);
    }

    #[test]
    fn statement_binds_with_at_prefix() {
        let stmt = Statement::new("SELECT 1 WHERE @x = 1").bind("x", 1_i64);
        let params = stmt.named_params();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].0, "@x");
    }
}
