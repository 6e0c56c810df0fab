//! Plugin instance use-case service.
//!
//! # Responsibility
//! - Validate registration batches before they reach the writer.
//! - Provide stable entry points for callers of the repository layer.
//!
//! # Invariants
//! - A registered instance has at least one action.
//! - Action ids are unique within a registration batch.
//! - Service APIs never bypass repository error mapping.

use crate::model::plugin_action::{ActionKey, PluginId, PluginInstanceAction, ValidationError};
use crate::repo::{ActionReader, ActionWriter, RepoResult};
use crate::store::CallContext;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Use-case service over an action reader and writer.
pub struct ActionService<R: ActionReader, W: ActionWriter> {
    reader: R,
    writer: W,
}

impl<R: ActionReader, W: ActionWriter> ActionService<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Registers a new plugin instance with all of its actions.
    ///
    /// # Contract
    /// - Rejects an empty batch, mixed instances, blank ids and repeated
    ///   action ids with `RepoError::Validation`.
    /// - Returns `RepoError::Duplicate` when any action already exists; in
    ///   that case nothing is written.
    pub fn register_instance(
        &self,
        ctx: &CallContext,
        actions: &[PluginInstanceAction],
    ) -> RepoResult<DateTime<Utc>> {
        validate_instance_actions(actions)?;
        self.writer.insert_actions(ctx, actions)
    }

    pub fn instance_actions(
        &self,
        ctx: &CallContext,
        plugin_id: PluginId,
        plugin_instance_id: &str,
    ) -> RepoResult<Vec<PluginInstanceAction>> {
        self.reader.list_actions(ctx, plugin_id, plugin_instance_id)
    }

    pub fn action(&self, ctx: &CallContext, key: &ActionKey) -> RepoResult<PluginInstanceAction> {
        self.reader.get_action(
            ctx,
            key.plugin_id,
            &key.plugin_instance_id,
            &key.action_id,
        )
    }

    /// Writes `action.metadata` over the stored action.
    ///
    /// Empty metadata leaves the stored metadata untouched; only the
    /// modification time moves.
    pub fn update_metadata(
        &self,
        ctx: &CallContext,
        action: &PluginInstanceAction,
    ) -> RepoResult<DateTime<Utc>> {
        action.validate()?;
        self.writer.update_action(ctx, action)
    }

    /// Records the outcome of a sync run in the action's metadata.
    pub fn record_sync(
        &self,
        ctx: &CallContext,
        key: &ActionKey,
        status: &str,
        synced_at: DateTime<Utc>,
    ) -> RepoResult<DateTime<Utc>> {
        let mut action = self.action(ctx, key)?;
        action.metadata.sync_status = status.to_string();
        action.metadata.last_sync_time = Some(synced_at);
        self.writer.update_action(ctx, &action)
    }

    /// Removes every action of the instance. Succeeds when nothing is stored.
    pub fn unregister_instance(
        &self,
        ctx: &CallContext,
        plugin_id: PluginId,
        plugin_instance_id: &str,
    ) -> RepoResult<()> {
        self.writer
            .delete_actions(ctx, plugin_id, plugin_instance_id)
    }
}

/// Checks a registration batch: non-empty, one instance, valid ids, unique action ids.
pub fn validate_instance_actions(actions: &[PluginInstanceAction]) -> Result<(), ValidationError> {
    let first = actions.first().ok_or(ValidationError::NoActions)?;
    let mut seen = HashSet::with_capacity(actions.len());

    for action in actions {
        action.validate()?;
        if action.plugin_id != first.plugin_id
            || action.plugin_instance_id != first.plugin_instance_id
        {
            return Err(ValidationError::MixedInstances {
                expected: format!("{}/{}", first.plugin_id, first.plugin_instance_id),
                found: action.key().to_string(),
            });
        }
        if !seen.insert(action.action_id.as_str()) {
            return Err(ValidationError::DuplicateActionId(action.action_id.clone()));
        }
    }
    Ok(())
}
