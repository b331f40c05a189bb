//! Config channel adapters for the desktop shell.

#[cfg(feature = "sidecar-ws")]
mod sidecar;

#[cfg(feature = "sidecar-ws")]
pub use sidecar::SidecarConfigChannel;
