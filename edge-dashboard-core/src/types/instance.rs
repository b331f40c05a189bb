//! Derived instance views

use std::collections::BTreeMap;

use serde::Serialize;

use super::config::{ToolDescriptor, BUILTIN_COMMAND, BUILTIN_DISPLAY_ID, BUILTIN_SERVER_ID};

/// An installed server fused with its launch definition
///
/// Recomputed from the configuration document on every read, never stored.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutableInstance {
    pub server_id: String,
    pub display_id: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub status: String,
    pub tools: Vec<ToolDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    /// Install issued locally, not yet confirmed by a snapshot
    pub installing: bool,
}

impl ExecutableInstance {
    /// The built-in instance (local file and shell primitives)
    #[must_use]
    pub fn builtin(env: BTreeMap<String, String>) -> Self {
        Self {
            server_id: BUILTIN_SERVER_ID.to_string(),
            display_id: BUILTIN_DISPLAY_ID.to_string(),
            command: BUILTIN_COMMAND.to_string(),
            args: Vec::new(),
            env,
            status: String::new(),
            tools: Vec::new(),
            registry_id: None,
            installing: false,
        }
    }

    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.server_id == BUILTIN_SERVER_ID
    }
}

/// Instance annotated with registry display metadata
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInstance {
    #[serde(flatten)]
    pub instance: ExecutableInstance,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub category: String,
}
