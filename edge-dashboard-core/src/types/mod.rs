//! 类型定义模块

mod candidate;
mod config;
mod event;
mod instance;
mod registry;

pub use candidate::{Candidate, ServerSubmission, PLACEHOLDER_PREFIX};
pub use config::{
    ConfigPatch, EdgeConfig, EdgeStatus, InstalledServer, LaunchConfig, LaunchDefinition,
    ToolDescriptor, BUILTIN_COMMAND, BUILTIN_DISPLAY_ID, BUILTIN_SERVER_ID, DEFAULT_COMMAND,
    DEFAULT_EDGE_NAME,
};
pub use event::{
    EdgeEvent, ACTIVE_WORKSPACES_EVENT, AUTH_ERROR_EVENT, AUTH_SUCCESS_EVENT, CONFIG_UPDATE_EVENT,
};
pub use instance::{DisplayInstance, ExecutableInstance};
pub use registry::{EnvSpec, RegistryEntry};
