//! Edge configuration document types
//!
//! Field names follow the JSON the edge sidecar broadcasts (`installedMCPs`,
//! `mcp_json.mcpServers`, `workspacepaths`, ...). Keys this layer does not
//! understand are kept in `extra` maps so they survive a round-trip.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Reserved server id of the always-present built-in instance
pub const BUILTIN_SERVER_ID: &str = "todoforai";
/// Display id used for the synthesized built-in instance
pub const BUILTIN_DISPLAY_ID: &str = "todoforai-builtin";
/// Sentinel command of the built-in instance
pub const BUILTIN_COMMAND: &str = "builtin";
/// Command used when neither the launch config nor the record provides one
pub const DEFAULT_COMMAND: &str = "node";
/// Name of a freshly constructed document
pub const DEFAULT_EDGE_NAME: &str = "Name uninitialized";

/// Edge connection status (written by the backend only)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EdgeStatus {
    Online,
    #[default]
    Offline,
    Connecting,
}

/// How to start one MCP server process
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LaunchDefinition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub command: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub args: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_env")]
    pub env: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LaunchDefinition {
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>, env: BTreeMap<String, String>) -> Self {
        Self {
            command: command.into(),
            args,
            env,
            extra: Map::new(),
        }
    }
}

/// `mcp_json` blob: launch definitions plus whatever else the backend keeps there
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LaunchConfig {
    #[serde(rename = "mcpServers", default, deserialize_with = "null_as_default")]
    pub servers: IndexMap<String, LaunchDefinition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Capability reported by a running server (read-only here)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Installed server metadata (`installedMCPs` entry)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstalledServer {
    #[serde(default, deserialize_with = "null_as_default")]
    pub server_id: String,
    /// Locally assigned id, falls back to `server_id`
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    /// Free-form backend status (INSTALLING, STARTING, READY, ERROR, ...)
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_env",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub env: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InstalledServer {
    /// Effective display id
    #[must_use]
    pub fn display_id(&self) -> &str {
        self.display_id.as_deref().unwrap_or(&self.server_id)
    }
}

/// The edge configuration document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default = "default_edge_name", deserialize_with = "name_or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "status_or_offline")]
    pub status: EdgeStatus,
    #[serde(rename = "workspacepaths", default, deserialize_with = "null_as_default")]
    pub workspace_paths: Vec<String>,
    #[serde(
        rename = "installedMCPs",
        default,
        deserialize_with = "deserialize_installed"
    )]
    pub installed_servers: IndexMap<String, InstalledServer>,
    #[serde(rename = "mcp_json", default, deserialize_with = "null_as_default")]
    pub launch_config: LaunchConfig,
    #[serde(rename = "ownerId", default, deserialize_with = "null_as_default")]
    pub owner_id: String,
    #[serde(rename = "isShellEnabled", default, deserialize_with = "null_as_default")]
    pub is_shell_enabled: bool,
    #[serde(
        rename = "isFileSystemEnabled",
        default,
        deserialize_with = "null_as_default"
    )]
    pub is_filesystem_enabled: bool,
    #[serde(rename = "createdAt", default, with = "crate::utils::datetime")]
    pub created_at: Option<DateTime<Utc>>,
    /// Monotonic snapshot revision, when the backend provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_edge_name() -> String {
    DEFAULT_EDGE_NAME.to_string()
}

fn name_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_edge_name))
}

/// Null or an unrecognized status reads as offline.
fn status_or_offline<'de, D>(deserializer: D) -> Result<EdgeStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default())
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: default_edge_name(),
            status: EdgeStatus::Offline,
            workspace_paths: Vec::new(),
            installed_servers: IndexMap::new(),
            launch_config: LaunchConfig::default(),
            owner_id: String::new(),
            is_shell_enabled: false,
            is_filesystem_enabled: false,
            created_at: None,
            revision: None,
            extra: Map::new(),
        }
    }
}

impl EdgeConfig {
    /// Launch definition for a server, if `mcp_json` has one
    #[must_use]
    pub fn launch_definition(&self, server_id: &str) -> Option<&LaunchDefinition> {
        self.launch_config.servers.get(server_id)
    }

    /// Whether the server appears in either map
    #[must_use]
    pub fn contains_server(&self, server_id: &str) -> bool {
        self.installed_servers.contains_key(server_id)
            || self.launch_config.servers.contains_key(server_id)
    }
}

/// Partial document update (shallow merge, top-level keys only)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "workspacepaths", skip_serializing_if = "Option::is_none")]
    pub workspace_paths: Option<Vec<String>>,
    #[serde(rename = "installedMCPs", skip_serializing_if = "Option::is_none")]
    pub installed_servers: Option<IndexMap<String, InstalledServer>>,
    #[serde(rename = "mcp_json", skip_serializing_if = "Option::is_none")]
    pub launch_config: Option<LaunchConfig>,
    #[serde(rename = "isShellEnabled", skip_serializing_if = "Option::is_none")]
    pub is_shell_enabled: Option<bool>,
    #[serde(rename = "isFileSystemEnabled", skip_serializing_if = "Option::is_none")]
    pub is_filesystem_enabled: Option<bool>,
}

impl ConfigPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.workspace_paths.is_none()
            && self.installed_servers.is_none()
            && self.launch_config.is_none()
            && self.is_shell_enabled.is_none()
            && self.is_filesystem_enabled.is_none()
    }

    /// Replace each present top-level field of `config`
    pub fn apply_to(&self, config: &mut EdgeConfig) {
        if let Some(ref name) = self.name {
            config.name.clone_from(name);
        }
        if let Some(ref paths) = self.workspace_paths {
            config.workspace_paths.clone_from(paths);
        }
        if let Some(ref installed) = self.installed_servers {
            config.installed_servers.clone_from(installed);
        }
        if let Some(ref launch) = self.launch_config {
            config.launch_config.clone_from(launch);
        }
        if let Some(enabled) = self.is_shell_enabled {
            config.is_shell_enabled = enabled;
        }
        if let Some(enabled) = self.is_filesystem_enabled {
            config.is_filesystem_enabled = enabled;
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Env values are strings on the wire, but older edges wrote booleans and numbers.
fn deserialize_env<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

/// `installedMCPs` is a map keyed by server id; early edges sent a list.
fn deserialize_installed<'de, D>(
    deserializer: D,
) -> Result<IndexMap<String, InstalledServer>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList {
        Map(IndexMap<String, InstalledServer>),
        List(Vec<InstalledServer>),
    }

    let installed = match Option::<MapOrList>::deserialize(deserializer)? {
        Some(MapOrList::Map(map)) => map
            .into_iter()
            .map(|(key, mut record)| {
                if record.server_id.is_empty() {
                    record.server_id.clone_from(&key);
                }
                (key, record)
            })
            .collect(),
        Some(MapOrList::List(list)) => list
            .into_iter()
            .filter(|record| !record.server_id.is_empty())
            .map(|record| (record.server_id.clone(), record))
            .collect(),
        None => IndexMap::new(),
    };
    Ok(installed)
}
