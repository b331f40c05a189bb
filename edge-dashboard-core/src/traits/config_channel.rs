//! Remote config channel abstract Trait

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::error::CoreResult;
use crate::types::{ConfigPatch, EdgeConfig, EdgeEvent};

/// Events buffered per subscriber before lagging ones start dropping
pub const EVENT_BUFFER: usize = 64;

/// Channel to the edge agent
///
/// Platform implementation:
/// - Desktop: `SidecarConfigChannel` (JSON-RPC over WebSocket)
/// - Tests / headless: `InMemoryConfigChannel`
#[async_trait]
pub trait ConfigChannel: Send + Sync {
    /// Push a partial configuration update (`update_edge_config`)
    ///
    /// # Arguments
    /// * `patch` - Top-level fields to replace
    async fn update_edge_config(&self, patch: &ConfigPatch) -> CoreResult<()>;

    /// Subscribe to events pushed by the edge, in delivery order
    fn subscribe(&self) -> broadcast::Receiver<EdgeEvent>;
}

/// In-memory edge
///
/// Applies each update to its own document and echoes the result back as an
/// `edge:config_update` snapshot, the way the sidecar does.
#[derive(Clone)]
pub struct InMemoryConfigChannel {
    document: Arc<RwLock<EdgeConfig>>,
    events: broadcast::Sender<EdgeEvent>,
}

impl InMemoryConfigChannel {
    /// Create a channel holding `initial`
    #[must_use]
    pub fn new(initial: EdgeConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            document: Arc::new(RwLock::new(initial)),
            events,
        }
    }

    /// Current backend-side document
    pub async fn document(&self) -> EdgeConfig {
        self.document.read().await.clone()
    }

    /// Replace the backend-side document and broadcast it
    pub async fn replace_document(&self, document: EdgeConfig) {
        *self.document.write().await = document.clone();
        self.publish(EdgeEvent::ConfigUpdate(Box::new(document)));
    }

    /// Broadcast an arbitrary event
    pub fn publish(&self, event: EdgeEvent) {
        if self.events.send(event).is_err() {
            log::debug!("No subscribers for edge event");
        }
    }
}

impl Default for InMemoryConfigChannel {
    fn default() -> Self {
        Self::new(EdgeConfig::default())
    }
}

#[async_trait]
impl ConfigChannel for InMemoryConfigChannel {
    async fn update_edge_config(&self, patch: &ConfigPatch) -> CoreResult<()> {
        let snapshot = {
            let mut document = self.document.write().await;
            patch.apply_to(&mut document);
            document.clone()
        };
        self.publish(EdgeEvent::ConfigUpdate(Box::new(snapshot)));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<EdgeEvent> {
        self.events.subscribe()
    }
}
