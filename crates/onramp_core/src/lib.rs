//! Data-access layer for connector plugin instance actions.
//! Persists per-action configuration and sync state keyed by plugin,
//! plugin instance and action identifiers.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use crate::config::{CoreConfig, LoggingConfig, StoreConfig};
pub use db::{open_store, open_store_at, open_store_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::plugin_action::{
    ActionKey, Metadata, PluginId, PluginInstanceAction, UnknownPluginId, ValidationError,
};
pub use repo::{ActionReader, ActionWriter, Reader, RepoError, RepoResult, Writer};
pub use service::action_service::ActionService;
pub use store::{CallContext, StatusCode, Store, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
