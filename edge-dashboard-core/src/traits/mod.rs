//! Remote channel abstraction trait definition

mod config_channel;

pub use config_channel::{ConfigChannel, InMemoryConfigChannel, EVENT_BUFFER};
