//! Domain model for plugin instance action records.
//!
//! # Responsibility
//! - Define the persisted record and the metadata payload it carries.
//! - Provide the composite key shared by read, write and delete paths.
//!
//! # Invariants
//! - `(plugin_id, plugin_instance_id, action_id)` identifies one record and is
//!   immutable after creation.
//! - Audit timestamps are assigned by the persistence layer, never by callers.

pub mod plugin_action;
