//! Plugin instance action model.
//!
//! # Responsibility
//! - Define `PluginInstanceAction`, the unit persisted by the repository layer.
//! - Define the semi-opaque `Metadata` payload and its persisted JSON layout.
//!
//! # Invariants
//! - `Metadata` JSON field names are part of the stored format and must not change.
//! - A zero-value `Metadata` means "absent" and is never written to storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Identifier of the connector plugin that owns an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PluginId {
    /// Plugin was not specified by the caller.
    #[serde(rename = "unspecified")]
    Unspecified,
    /// Azure API Management connector.
    #[serde(rename = "custom-azure")]
    CustomAzure,
}

impl PluginId {
    /// Stored string form of this plugin id.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::CustomAzure => "custom-azure",
        }
    }
}

impl Display for PluginId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known plugin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown plugin id `{0}`")]
pub struct UnknownPluginId(pub String);

impl FromStr for PluginId {
    type Err = UnknownPluginId;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "unspecified" => Ok(Self::Unspecified),
            "custom-azure" => Ok(Self::CustomAzure),
            other => Err(UnknownPluginId(other.to_string())),
        }
    }
}

/// Connector configuration and sync state attached to an action.
///
/// Missing JSON fields decode to their zero value, so rows written by older
/// producers stay readable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(rename = "azureTenantId")]
    pub tenant_id: String,
    #[serde(rename = "azureSubscriptionId")]
    pub subscription_id: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
    /// Reference to the secret holding the client credential, not the secret itself.
    #[serde(rename = "clientSecret")]
    pub client_secret_key: String,
    #[serde(rename = "googleServiceAccount")]
    pub google_service_account: String,
    #[serde(rename = "lastSyncTime")]
    pub last_sync_time: Option<DateTime<Utc>>,
    #[serde(rename = "syncStatus")]
    pub sync_status: String,
    #[serde(rename = "integrationLocation")]
    pub integration_location: String,
    #[serde(rename = "triggerId")]
    pub trigger_id: String,
    #[serde(rename = "integrationVersionId")]
    pub integration_version_id: String,
    #[serde(rename = "integrationName")]
    pub integration_name: String,
}

impl Metadata {
    /// Returns whether every field holds its zero value.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Full composite key of one action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionKey {
    pub plugin_id: PluginId,
    pub plugin_instance_id: String,
    pub action_id: String,
}

impl ActionKey {
    pub fn new(
        plugin_id: PluginId,
        plugin_instance_id: impl Into<String>,
        action_id: impl Into<String>,
    ) -> Self {
        Self {
            plugin_id,
            plugin_instance_id: plugin_instance_id.into(),
            action_id: action_id.into(),
        }
    }
}

impl Display for ActionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.plugin_id, self.plugin_instance_id, self.action_id
        )
    }
}

/// Identifier-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("plugin instance id must not be blank")]
    BlankPluginInstanceId,
    #[error("action id must not be blank")]
    BlankActionId,
    #[error("a plugin instance must be registered with at least one action")]
    NoActions,
    #[error("action {found} does not belong to plugin instance {expected}")]
    MixedInstances { expected: String, found: String },
    #[error("action id `{0}` appears more than once in the plugin instance")]
    DuplicateActionId(String),
}

/// One persisted action of a plugin instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInstanceAction {
    pub plugin_id: PluginId,
    pub plugin_instance_id: String,
    pub action_id: String,
    /// Zero value means no metadata is stored for this action.
    pub metadata: Metadata,
    /// Set once when the row is inserted.
    pub creation_time: DateTime<Utc>,
    /// Refreshed on every insert and update.
    pub last_modified_time: DateTime<Utc>,
}

impl PluginInstanceAction {
    /// Creates an action without metadata.
    ///
    /// Audit timestamps stay at the Unix epoch until the writer stamps them.
    pub fn new(
        plugin_id: PluginId,
        plugin_instance_id: impl Into<String>,
        action_id: impl Into<String>,
    ) -> Self {
        Self {
            plugin_id,
            plugin_instance_id: plugin_instance_id.into(),
            action_id: action_id.into(),
            metadata: Metadata::default(),
            creation_time: DateTime::<Utc>::default(),
            last_modified_time: DateTime::<Utc>::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn key(&self) -> ActionKey {
        ActionKey::new(
            self.plugin_id,
            self.plugin_instance_id.clone(),
            self.action_id.clone(),
        )
    }

    /// Checks that both opaque identifiers are non-blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.plugin_instance_id.trim().is_empty() {
            return Err(ValidationError::BlankPluginInstanceId);
        }
        if self.action_id.trim().is_empty() {
            return Err(ValidationError::BlankActionId);
        }
        Ok(())
    }
}
