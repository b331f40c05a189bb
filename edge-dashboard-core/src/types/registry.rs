//! Registry catalog types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Env declaration of a catalog entry
///
/// The catalog either lists the variable names a server needs or ships a
/// name → default value mapping. Both shapes appear in the wild.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EnvSpec {
    /// Names of variables the user has to fill in
    Required(Vec<String>),
    /// Variables with default values
    Defaults(BTreeMap<String, String>),
}

impl Default for EnvSpec {
    fn default() -> Self {
        Self::Required(Vec::new())
    }
}

impl EnvSpec {
    /// Normalize to the live-config shape; required names map to empty strings
    #[must_use]
    pub fn to_env_map(&self) -> BTreeMap<String, String> {
        match self {
            Self::Required(names) => names
                .iter()
                .map(|name| (name.clone(), String::new()))
                .collect(),
            Self::Defaults(map) => map.clone(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Required(names) => names.is_empty(),
            Self::Defaults(map) => map.is_empty(),
        }
    }
}

/// One installable MCP server in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub registry_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Primary category shown in the category selector
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: EnvSpec,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn env_spec_accepts_both_shapes() {
        let list: EnvSpec = serde_json::from_value(json!(["API_KEY", "REGION"])).unwrap();
        assert_eq!(
            list,
            EnvSpec::Required(vec!["API_KEY".to_string(), "REGION".to_string()])
        );

        let map: EnvSpec = serde_json::from_value(json!({"REGION": "eu"})).unwrap();
        assert_eq!(map.to_env_map()["REGION"], "eu");
    }

    #[test]
    fn required_names_become_empty_values() {
        let spec = EnvSpec::Required(vec!["TOKEN".to_string()]);
        let env = spec.to_env_map();
        assert_eq!(env.len(), 1);
        assert_eq!(env["TOKEN"], "");
    }

    #[test]
    fn missing_env_is_empty_required_list() {
        let entry: RegistryEntry = serde_json::from_value(json!({
            "registryId": "memory",
            "name": "Memory",
            "category": "Productivity",
            "command": "npx"
        }))
        .unwrap();
        assert!(entry.env.is_empty());
        assert!(entry.args.is_empty());
    }
}
