//! TODOforAI Edge Dashboard Core Library
//!
//! Provides the configuration sync logic behind the edge dashboard, including:
//! - Registry lookup (static MCP server catalog)
//! - Config store (optimistic writes, snapshot reconciliation, pending installs)
//! - Instance filter (search and category view over installed servers)
//! - Server editor (install/edit buffer with validation)
//!
//! The remote edge agent is abstracted through the [`ConfigChannel`] trait so the
//! same logic runs against the desktop sidecar or an in-memory channel.

pub mod error;
pub mod services;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use error::{CoreError, CoreResult};
pub use services::{ConfigStore, InstanceFilter, RegistryLookup, ServerEditor, StoreOptions};
pub use traits::{ConfigChannel, InMemoryConfigChannel};
