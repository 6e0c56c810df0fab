//! Repository layer over the plugin instance actions table.
//!
//! # Responsibility
//! - Define read and write contracts for plugin instance actions.
//! - Translate store status codes into the domain error taxonomy.
//!
//! # Invariants
//! - `NotFound` and `Duplicate` are produced only where the store's signal is
//!   unambiguous; every other store failure passes through as `Store`.
//! - Reader and Writer hold no mutable state beyond the shared store handle.

pub mod error_map;
pub mod reader;
pub mod writer;

use crate::model::plugin_action::{PluginId, PluginInstanceAction, ValidationError};
use crate::store::{CallContext, StatusCode, StoreError};
use chrono::{DateTime, Utc};
use std::error::Error as StdError;
use thiserror::Error;

pub use reader::Reader;
pub use writer::{audit, AuditMode, Writer};

pub type RepoResult<T> = Result<T, RepoError>;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum RepoError {
    /// Target row absent: point read miss, update miss, or empty instance scan.
    #[error("resource not found: {0}")]
    NotFound(String),
    /// Insert collided with an existing key.
    #[error("resource already exists: {0}")]
    Duplicate(String),
    /// A stored column could not be decoded into its attribute.
    #[error("failed to parse column {column:?}: {source}")]
    ColumnDecode {
        column: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("failed to encode column {column:?}: {source}")]
    ColumnEncode {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Infrastructure failure reported by the store, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RepoError {
    pub(crate) fn column_decode(
        column: &'static str,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::ColumnDecode {
            column,
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    /// Status code of a passed-through store failure.
    pub fn store_code(&self) -> Option<StatusCode> {
        match self {
            Self::Store(err) => Some(err.code()),
            _ => None,
        }
    }
}

/// Read contract for plugin instance actions.
pub trait ActionReader {
    /// Returns every action of one plugin instance, ordered by action id.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when the instance has no actions.
    /// - `RepoError::ColumnDecode` when a stored row cannot be decoded.
    /// - `RepoError::Store` for every other store failure, including
    ///   cancellation and deadline expiry.
    fn list_actions(
        &self,
        ctx: &CallContext,
        plugin_id: PluginId,
        plugin_instance_id: &str,
    ) -> RepoResult<Vec<PluginInstanceAction>>;

    /// # Errors
    /// - `RepoError::NotFound` when no action has the full key.
    /// - `RepoError::ColumnDecode` / `RepoError::Store` as for `list_actions`.
    fn get_action(
        &self,
        ctx: &CallContext,
        plugin_id: PluginId,
        plugin_instance_id: &str,
        action_id: &str,
    ) -> RepoResult<PluginInstanceAction>;
}

/// Write contract for plugin instance actions.
pub trait ActionWriter {
    /// Inserts all actions atomically and returns the commit timestamp.
    fn insert_actions(
        &self,
        ctx: &CallContext,
        actions: &[PluginInstanceAction],
    ) -> RepoResult<DateTime<Utc>>;

    /// Updates one action's metadata and returns the commit timestamp.
    fn update_action(
        &self,
        ctx: &CallContext,
        action: &PluginInstanceAction,
    ) -> RepoResult<DateTime<Utc>>;

    /// Deletes every action of one plugin instance. Deleting nothing succeeds.
    fn delete_actions(
        &self,
        ctx: &CallContext,
        plugin_id: PluginId,
        plugin_instance_id: &str,
    ) -> RepoResult<()>;
}
