//! Install/edit candidate identity

use super::config::LaunchDefinition;

/// Prefix that legacy callers use for "not yet assigned" server ids
pub const PLACEHOLDER_PREFIX: &str = "temp-";

/// Whether an editor buffer describes a new install or an existing server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Fresh installation, optionally seeded from a catalog entry
    New { registry_id: Option<String> },
    /// Edit of the server currently stored under this id
    Existing(String),
}

impl Candidate {
    /// Classify a raw id using the `temp-` convention
    #[must_use]
    pub fn from_server_id(server_id: &str) -> Self {
        if server_id.starts_with(PLACEHOLDER_PREFIX) {
            Self::New { registry_id: None }
        } else {
            Self::Existing(server_id.to_string())
        }
    }

    /// `temp-{unix millis}`, for callers that still need a placeholder id
    #[must_use]
    pub fn placeholder_id() -> String {
        format!(
            "{PLACEHOLDER_PREFIX}{}",
            chrono::Utc::now().timestamp_millis()
        )
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(self, Self::New { .. })
    }

    /// Id the server is stored under today (`None` for new installs)
    #[must_use]
    pub fn original_id(&self) -> Option<&str> {
        match self {
            Self::New { .. } => None,
            Self::Existing(id) => Some(id),
        }
    }
}

/// A validated editor buffer, ready for the config store
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSubmission {
    pub candidate: Candidate,
    pub server_id: String,
    pub launch: LaunchDefinition,
}
