//! 业务逻辑服务层

mod config_store;
mod instance_filter;
mod instances;
mod registry_service;
mod server_editor;

pub use config_store::{ConfigStore, StoreOptions, STATUS_INSTALLING, STATUS_STARTING};
pub use instance_filter::{FilterQuery, InstanceFilter};
pub use instances::{executable_instances, without_server};
pub use registry_service::{
    DisplayInfo, RegistryLookup, CATEGORY_ALL, CATEGORY_BUILTIN, CATEGORY_CUSTOM,
};
pub use server_editor::{EditorField, EnvRow, EnvRowId, ServerEditor, ValidationIssue};
