//! Hook definition records and their resolved runtime view.
//!
//! Definitions arrive as JSON records dropped into the hooks directory
//! (one record per file). A record that fails validation never becomes
//! visible to request handling.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;
use thiserror::Error;

/// Default per-request body ceiling (256KB) when a definition carries no
/// `maxBytes` meta.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 262_144;

/// Provider protocol a hook speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Github,
    Slack,
    Generic,
}

impl ProviderType {
    /// Stable lowercase name, used as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Github => "github",
            ProviderType::Slack => "slack",
            ProviderType::Generic => "generic",
        }
    }
}

/// Validation failures for a definition record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
}

/// A hook definition record as authored in the config store.
///
/// `last_modified` is attached from the source file's mtime and acts as the
/// version marker; it is never part of the serialized record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub provider_type: Option<ProviderType>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub index_fields: bool,
    #[serde(default)]
    pub url_context: String,
    #[serde(default)]
    pub metas: HashMap<String, String>,
    #[serde(skip)]
    pub last_modified: Option<SystemTime>,
}

impl HookDefinition {
    /// Validate the record. `id`, `type`, and `urlContext` are mandatory.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.id.is_empty() {
            return Err(DefinitionError::MissingField("id"));
        }
        if self.provider_type.is_none() {
            return Err(DefinitionError::MissingField("type"));
        }
        if self.url_context.is_empty() {
            return Err(DefinitionError::MissingField("urlContext"));
        }
        Ok(())
    }

    /// Synthesize a tombstone for an identifier that vanished from the store.
    pub fn tombstone(id: impl Into<String>) -> Self {
        HookDefinition {
            id: id.into(),
            deleted: true,
            ..HookDefinition::default()
        }
    }
}

/// Per-hook reader options, derived from the definition's `metas` map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOptions {
    pub username: String,
    pub token: String,
    pub secret: String,
    pub max_bytes: u64,
}

impl Default for HookOptions {
    fn default() -> Self {
        HookOptions {
            username: String::new(),
            token: String::new(),
            secret: String::new(),
            max_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl HookOptions {
    /// Build options from a definition's metas. Unknown keys are ignored;
    /// an unparseable `maxBytes` falls back to the supplied default.
    pub fn from_metas(metas: &HashMap<String, String>, default_max_bytes: u64) -> Self {
        let get = |key: &str| metas.get(key).cloned().unwrap_or_default();
        let max_bytes = metas
            .get("maxBytes")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default_max_bytes);
        HookOptions {
            username: get("username"),
            token: get("token"),
            secret: get("secret"),
            max_bytes,
        }
    }
}

/// A resolved, immutable-per-version hook bound to a provider protocol.
#[derive(Debug, Clone)]
pub struct Hook {
    id: String,
    name: String,
    provider: ProviderType,
    active: bool,
    index_fields: bool,
    options: HookOptions,
}

impl Hook {
    /// Build a resolved hook from a validated definition.
    ///
    /// Returns `None` for records with no provider type (tombstones never
    /// resolve).
    pub fn from_definition(def: &HookDefinition, default_max_bytes: u64) -> Option<Hook> {
        let provider = def.provider_type?;
        Some(Hook {
            id: def.id.clone(),
            name: def.name.clone(),
            provider,
            active: def.active,
            index_fields: def.index_fields,
            options: HookOptions::from_metas(&def.metas, default_max_bytes),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> ProviderType {
        self.provider
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn index_fields(&self) -> bool {
        self.index_fields
    }

    pub fn options(&self) -> &HookOptions {
        &self.options
    }
}
