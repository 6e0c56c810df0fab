//! Table and column registry.
//!
//! # Responsibility
//! - Own the canonical table name and column identifiers.
//! - Keep read projections, row construction and DDL in lock-step.
//!
//! # Invariants
//! - `ACTION_COLUMNS` order is the projection order of every action query.
//! - Key columns are a prefix of `ACTION_COLUMNS`.

pub const TABLE_PLUGIN_INSTANCE_ACTIONS: &str = "OnRampPluginInstanceActions";

pub const COLUMN_PLUGIN_ID: &str = "PluginID";
pub const COLUMN_PLUGIN_INSTANCE_ID: &str = "PluginInstanceID";
pub const COLUMN_ACTION_ID: &str = "ActionID";
pub const COLUMN_METADATA: &str = "Metadata";
pub const COLUMN_CREATION_TIME: &str = "CreationTime";
pub const COLUMN_LAST_MODIFIED_TIME: &str = "LastModifiedTime";

/// Columns read for every plugin instance action, in projection order.
pub const ACTION_COLUMNS: &[&str] = &[
    COLUMN_PLUGIN_ID,
    COLUMN_PLUGIN_INSTANCE_ID,
    COLUMN_ACTION_ID,
    COLUMN_METADATA,
    COLUMN_CREATION_TIME,
    COLUMN_LAST_MODIFIED_TIME,
];

/// Static description of one table, used by the store to build statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    /// Primary key columns in key order.
    pub key_columns: &'static [&'static str],
    pub columns: &'static [&'static str],
}

impl TableSchema {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }

    pub fn is_key_column(&self, column: &str) -> bool {
        self.key_columns.contains(&column)
    }
}

pub static PLUGIN_INSTANCE_ACTIONS: TableSchema = TableSchema {
    name: TABLE_PLUGIN_INSTANCE_ACTIONS,
    key_columns: &[COLUMN_PLUGIN_ID, COLUMN_PLUGIN_INSTANCE_ID, COLUMN_ACTION_ID],
    columns: ACTION_COLUMNS,
};

/// DDL applied on open. Timestamps are text in the rusqlite chrono layout,
/// metadata is JSON text or NULL.
pub(crate) const CREATE_PLUGIN_INSTANCE_ACTIONS_SQL: &str = "
CREATE TABLE IF NOT EXISTS OnRampPluginInstanceActions (
    PluginID TEXT NOT NULL,
    PluginInstanceID TEXT NOT NULL,
    ActionID TEXT NOT NULL,
    Metadata TEXT,
    CreationTime TEXT NOT NULL,
    LastModifiedTime TEXT NOT NULL,
    PRIMARY KEY (PluginID, PluginInstanceID, ActionID)
) WITHOUT ROWID;";

#[cfg(test)]
mod tests {
    use super::{ACTION_COLUMNS, CREATE_PLUGIN_INSTANCE_ACTIONS_SQL, PLUGIN_INSTANCE_ACTIONS};

    #[test]
    fn key_columns_prefix_projection() {
        let keys = PLUGIN_INSTANCE_ACTIONS.key_columns;
        assert_eq!(&ACTION_COLUMNS[..keys.len()], keys);
    }

    #[test]
    fn ddl_declares_every_registered_column() {
        for column in ACTION_COLUMNS {
            assert!(
                CREATE_PLUGIN_INSTANCE_ACTIONS_SQL.contains(column),
                "column {column} missing from DDL"
            );
        }
        assert!(CREATE_PLUGIN_INSTANCE_ACTIONS_SQL.contains(PLUGIN_INSTANCE_ACTIONS.name));
    }
}
