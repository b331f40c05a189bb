//! Events pushed by the edge

use serde::Deserialize;
use serde_json::Value;

use super::config::EdgeConfig;
use crate::error::CoreResult;

pub const CONFIG_UPDATE_EVENT: &str = "edge:config_update";
pub const AUTH_SUCCESS_EVENT: &str = "auth_success";
pub const AUTH_ERROR_EVENT: &str = "auth_error";
pub const ACTIVE_WORKSPACES_EVENT: &str = "active_workspaces_change";

/// Typed edge event
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeEvent {
    /// Full configuration snapshot
    ConfigUpdate(Box<EdgeConfig>),
    AuthSuccess { api_key: String, email: String },
    AuthError { message: String },
    ActiveWorkspacesChange { active_workspaces: Vec<String> },
    /// Any event type this layer does not interpret (logs, file sync, ...)
    Other { kind: String, payload: Value },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthSuccessPayload {
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct AuthErrorPayload {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveWorkspacesPayload {
    #[serde(default)]
    active_workspaces: Vec<String>,
}

impl EdgeEvent {
    /// Build an event from its `type` and `payload`
    pub fn from_parts(kind: &str, payload: Value) -> CoreResult<Self> {
        let event = match kind {
            CONFIG_UPDATE_EVENT => Self::ConfigUpdate(Box::new(serde_json::from_value(payload)?)),
            AUTH_SUCCESS_EVENT => {
                let p: AuthSuccessPayload = serde_json::from_value(payload)?;
                Self::AuthSuccess {
                    api_key: p.api_key,
                    email: p.email,
                }
            }
            AUTH_ERROR_EVENT => {
                let p: AuthErrorPayload = serde_json::from_value(payload)?;
                Self::AuthError { message: p.message }
            }
            ACTIVE_WORKSPACES_EVENT => {
                let p: ActiveWorkspacesPayload = serde_json::from_value(payload)?;
                Self::ActiveWorkspacesChange {
                    active_workspaces: p.active_workspaces,
                }
            }
            other => Self::Other {
                kind: other.to_string(),
                payload,
            },
        };
        Ok(event)
    }

    /// Wire name of the event type
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::ConfigUpdate(_) => CONFIG_UPDATE_EVENT,
            Self::AuthSuccess { .. } => AUTH_SUCCESS_EVENT,
            Self::AuthError { .. } => AUTH_ERROR_EVENT,
            Self::ActiveWorkspacesChange { .. } => ACTIVE_WORKSPACES_EVENT,
            Self::Other { kind, .. } => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::DEFAULT_EDGE_NAME;
    use serde_json::json;

    #[test]
    fn config_update_carries_full_document() {
        let event = EdgeEvent::from_parts(
            CONFIG_UPDATE_EVENT,
            json!({"id": "edge-1", "name": "Laptop", "status": "CONNECTING"}),
        )
        .unwrap();
        let EdgeEvent::ConfigUpdate(doc) = event else {
            panic!("expected config update");
        };
        assert_eq!(doc.id, "edge-1");
        assert_eq!(doc.name, "Laptop");
    }

    #[test]
    fn config_update_with_null_name_still_parses() {
        let event = EdgeEvent::from_parts(
            CONFIG_UPDATE_EVENT,
            json!({"id": "edge-1", "name": null, "status": null}),
        )
        .unwrap();
        let EdgeEvent::ConfigUpdate(doc) = event else {
            panic!("expected config update");
        };
        assert_eq!(doc.name, DEFAULT_EDGE_NAME);
    }

    #[test]
    fn auth_and_workspace_events_are_typed() {
        let ok = EdgeEvent::from_parts(
            AUTH_SUCCESS_EVENT,
            json!({"apiKey": "k", "email": "a@b.c"}),
        )
        .unwrap();
        assert_eq!(
            ok,
            EdgeEvent::AuthSuccess {
                api_key: "k".to_string(),
                email: "a@b.c".to_string()
            }
        );

        let ws = EdgeEvent::from_parts(
            ACTIVE_WORKSPACES_EVENT,
            json!({"activeWorkspaces": ["/w"]}),
        )
        .unwrap();
        assert_eq!(ws.kind(), ACTIVE_WORKSPACES_EVENT);
    }

    #[test]
    fn unknown_kinds_pass_through() {
        let event = EdgeEvent::from_parts("file:sync", json!({"path": "/a"})).unwrap();
        assert_eq!(event.kind(), "file:sync");
        assert!(matches!(event, EdgeEvent::Other { .. }));
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        let err = EdgeEvent::from_parts(CONFIG_UPDATE_EVENT, json!({"status": 42})).unwrap_err();
        assert!(matches!(err, crate::error::CoreError::SerializationError(_)));
    }
}
