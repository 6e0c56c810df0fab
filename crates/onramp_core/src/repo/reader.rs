//! Read-only queries over plugin instance actions.
//!
//! # Invariants
//! - An instance scan with zero rows is `NotFound`: every registered instance
//!   owns at least one action.
//! - A column that fails to decode fails the whole row with a column-scoped error.

use super::error_map::{map_store_error, Operation};
use super::{ActionReader, RepoError, RepoResult};
use crate::db::schema::{
    ACTION_COLUMNS, COLUMN_ACTION_ID, COLUMN_CREATION_TIME, COLUMN_LAST_MODIFIED_TIME,
    COLUMN_METADATA, COLUMN_PLUGIN_ID, COLUMN_PLUGIN_INSTANCE_ID, PLUGIN_INSTANCE_ACTIONS,
    TABLE_PLUGIN_INSTANCE_ACTIONS,
};
use crate::model::plugin_action::{Metadata, PluginId, PluginInstanceAction};
use crate::store::{CallContext, Statement, Store, StoredRow};
use chrono::{DateTime, Utc};
use log::warn;
use once_cell::sync::Lazy;
use rusqlite::types::{FromSql, Value};
use serde::de::DeserializeOwned;
use std::sync::Arc;

static LIST_INSTANCE_ACTIONS_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {} FROM {TABLE_PLUGIN_INSTANCE_ACTIONS} \
         WHERE {COLUMN_PLUGIN_ID} = @pluginID AND {COLUMN_PLUGIN_INSTANCE_ID} = @pluginInstanceID \
         ORDER BY {COLUMN_ACTION_ID}",
        ACTION_COLUMNS.join(", ")
    )
});

/// Reads plugin instance actions through the shared store handle.
#[derive(Clone)]
pub struct Reader {
    store: Arc<Store>,
}

impl Reader {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl ActionReader for Reader {
    fn list_actions(
        &self,
        ctx: &CallContext,
        plugin_id: PluginId,
        plugin_instance_id: &str,
    ) -> RepoResult<Vec<PluginInstanceAction>> {
        let target = format!("{plugin_id}/{plugin_instance_id}");
        let statement = Statement::new(LIST_INSTANCE_ACTIONS_SQL.as_str())
            .bind("pluginID", plugin_id.as_str().to_string())
            .bind("pluginInstanceID", plugin_instance_id.to_string());

        let rows = self
            .store
            .query(ctx, &statement)
            .map_err(|err| map_store_error(Operation::Scan, &target, err))?;
        if rows.is_empty() {
            warn!("event=resource_not_found module=repo op=scan target={target} rows=0");
            return Err(RepoError::NotFound(target));
        }

        rows.iter().map(parse_plugin_instance_action).collect()
    }

    fn get_action(
        &self,
        ctx: &CallContext,
        plugin_id: PluginId,
        plugin_instance_id: &str,
        action_id: &str,
    ) -> RepoResult<PluginInstanceAction> {
        let key = [
            Value::Text(plugin_id.as_str().to_string()),
            Value::Text(plugin_instance_id.to_string()),
            Value::Text(action_id.to_string()),
        ];
        let row = self
            .store
            .read_row(ctx, &PLUGIN_INSTANCE_ACTIONS, &key, ACTION_COLUMNS)
            .map_err(|err| {
                let target = format!("{plugin_id}/{plugin_instance_id}/{action_id}");
                map_store_error(Operation::PointRead, &target, err)
            })?;
        parse_plugin_instance_action(&row)
    }
}

fn parse_plugin_instance_action(row: &StoredRow) -> RepoResult<PluginInstanceAction> {
    let plugin_id_text: String = column(row, COLUMN_PLUGIN_ID)?;
    let plugin_id = plugin_id_text
        .parse::<PluginId>()
        .map_err(|err| RepoError::column_decode(COLUMN_PLUGIN_ID, err))?;

    Ok(PluginInstanceAction {
        plugin_id,
        plugin_instance_id: column(row, COLUMN_PLUGIN_INSTANCE_ID)?,
        action_id: column(row, COLUMN_ACTION_ID)?,
        metadata: json_column::<Metadata>(row, COLUMN_METADATA)?.unwrap_or_default(),
        creation_time: column::<DateTime<Utc>>(row, COLUMN_CREATION_TIME)?,
        last_modified_time: column::<DateTime<Utc>>(row, COLUMN_LAST_MODIFIED_TIME)?,
    })
}

fn column<T: FromSql>(row: &StoredRow, name: &'static str) -> RepoResult<T> {
    row.get::<T>(name)
        .map_err(|err| RepoError::column_decode(name, err))
}

/// Decodes a JSON column into `T`.
///
/// A NULL column yields `None` without a decode attempt; malformed JSON is a
/// column decode error.
fn json_column<T: DeserializeOwned>(row: &StoredRow, name: &'static str) -> RepoResult<Option<T>> {
    match column::<Option<String>>(row, name)? {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| RepoError::column_decode(name, err)),
        None => Ok(None),
    }
}
