//! Create, update and delete paths for plugin instance actions.
//!
//! # Invariants
//! - Inserts apply as one atomic batch; a single duplicate key rejects all rows.
//! - Metadata is written only when non-empty, on insert and on update.
//! - `CreationTime` is never part of an update.
//! - Audit timestamps equal the commit timestamp, so they follow commit order.
//! - Deleting an instance without actions succeeds.

use super::error_map::{map_store_error, Operation};
use super::{ActionWriter, RepoError, RepoResult};
use crate::db::schema::{
    COLUMN_ACTION_ID, COLUMN_CREATION_TIME, COLUMN_LAST_MODIFIED_TIME, COLUMN_METADATA,
    COLUMN_PLUGIN_ID, COLUMN_PLUGIN_INSTANCE_ID, PLUGIN_INSTANCE_ACTIONS,
    TABLE_PLUGIN_INSTANCE_ACTIONS,
};
use crate::model::plugin_action::{PluginId, PluginInstanceAction};
use crate::store::{timestamp_value, CallContext, Mutation, RowValues, Statement, Store};
use chrono::{DateTime, Utc};
use log::debug;
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use std::sync::Arc;

static SCAN_INSTANCE_KEYS_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {COLUMN_ACTION_ID} FROM {TABLE_PLUGIN_INSTANCE_ACTIONS} \
         WHERE {COLUMN_PLUGIN_ID} = @pluginID AND {COLUMN_PLUGIN_INSTANCE_ID} = @pluginInstanceID"
    )
});

static DELETE_INSTANCE_ACTIONS_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "DELETE FROM {TABLE_PLUGIN_INSTANCE_ACTIONS} \
         WHERE {COLUMN_PLUGIN_ID} = @pluginID AND {COLUMN_PLUGIN_INSTANCE_ID} = @pluginInstanceID"
    )
});

/// Which audit columns a row receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditMode {
    /// Stamps `CreationTime` and `LastModifiedTime`.
    Insert,
    /// Stamps `LastModifiedTime` only.
    Update,
}

/// Returns `row` with its audit timestamps set to `now`.
pub fn audit(mut row: RowValues, mode: AuditMode, now: DateTime<Utc>) -> RowValues {
    if mode == AuditMode::Insert {
        row.insert(COLUMN_CREATION_TIME, timestamp_value(now));
    }
    row.insert(COLUMN_LAST_MODIFIED_TIME, timestamp_value(now));
    row
}

/// Key columns plus metadata when it is non-empty.
fn action_row(action: &PluginInstanceAction) -> RepoResult<RowValues> {
    let mut row = RowValues::new();
    row.insert(
        COLUMN_PLUGIN_ID,
        Value::Text(action.plugin_id.as_str().to_string()),
    );
    row.insert(
        COLUMN_PLUGIN_INSTANCE_ID,
        Value::Text(action.plugin_instance_id.clone()),
    );
    row.insert(COLUMN_ACTION_ID, Value::Text(action.action_id.clone()));
    if !action.metadata.is_empty() {
        let json = serde_json::to_string(&action.metadata).map_err(|source| {
            RepoError::ColumnEncode {
                column: COLUMN_METADATA,
                source,
            }
        })?;
        row.insert(COLUMN_METADATA, Value::Text(json));
    }
    Ok(row)
}

/// Writes plugin instance actions through the shared store handle.
#[derive(Clone)]
pub struct Writer {
    store: Arc<Store>,
}

impl Writer {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl ActionWriter for Writer {
    /// Callers validate that the batch forms one instance with unique action ids.
    ///
    /// Audit columns carry the commit timestamp that is returned.
    ///
    /// # Errors
    /// - `RepoError::Duplicate` when any key already exists; no row is written.
    /// - `RepoError::ColumnEncode` when metadata cannot be serialised.
    fn insert_actions(
        &self,
        ctx: &CallContext,
        actions: &[PluginInstanceAction],
    ) -> RepoResult<DateTime<Utc>> {
        let rows = actions
            .iter()
            .map(action_row)
            .collect::<RepoResult<Vec<_>>>()?;

        let result = self.store.read_write_transaction(ctx, |txn| {
            let now = txn.commit_timestamp();
            for row in rows {
                txn.apply_mutation(&Mutation::insert_map(
                    &PLUGIN_INSTANCE_ACTIONS,
                    audit(row, AuditMode::Insert, now),
                ))?;
            }
            Ok(())
        });
        result.map(|((), commit_time)| commit_time).map_err(|err| {
            let target = actions
                .iter()
                .map(|action| action.key().to_string())
                .collect::<Vec<_>>()
                .join(",");
            map_store_error(Operation::Insert, &target, err)
        })
    }

    /// `LastModifiedTime` is set to the returned commit timestamp.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when the action does not exist.
    fn update_action(
        &self,
        ctx: &CallContext,
        action: &PluginInstanceAction,
    ) -> RepoResult<DateTime<Utc>> {
        let row = action_row(action)?;
        self.store
            .read_write_transaction(ctx, |txn| {
                let row = audit(row, AuditMode::Update, txn.commit_timestamp());
                txn.apply_mutation(&Mutation::update_map(&PLUGIN_INSTANCE_ACTIONS, row))
            })
            .map(|((), commit_time)| commit_time)
            .map_err(|err| map_store_error(Operation::Update, &action.key().to_string(), err))
    }

    fn delete_actions(
        &self,
        ctx: &CallContext,
        plugin_id: PluginId,
        plugin_instance_id: &str,
    ) -> RepoResult<()> {
        let bind = |sql: &str| {
            Statement::new(sql)
                .bind("pluginID", plugin_id.as_str().to_string())
                .bind("pluginInstanceID", plugin_instance_id.to_string())
        };

        let (deleted, _) = self
            .store
            .read_write_transaction(ctx, |txn| {
                let existing = txn.query(&bind(SCAN_INSTANCE_KEYS_SQL.as_str()))?;
                if existing.is_empty() {
                    return Ok(0);
                }
                txn.execute_update(&bind(DELETE_INSTANCE_ACTIONS_SQL.as_str()))
            })
            .map_err(|err| {
                map_store_error(
                    Operation::Delete,
                    &format!("{plugin_id}/{plugin_instance_id}"),
                    err,
                )
            })?;

        debug!(
            "event=actions_deleted module=repo target={plugin_id}/{plugin_instance_id} rows={deleted}"
        );
        Ok(())
    }
}
