//! 测试辅助模块
//!
//! 提供 mock 实现和便捷的测试工厂方法。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, Notify};

use crate::error::{CoreError, CoreResult};
use crate::services::{ConfigStore, StoreOptions};
use crate::traits::{ConfigChannel, EVENT_BUFFER};
use crate::types::{ConfigPatch, EdgeConfig, EdgeEvent, InstalledServer, LaunchDefinition};

// ===== MockConfigChannel =====

pub struct MockConfigChannel {
    events: broadcast::Sender<EdgeEvent>,
    patches: Mutex<Vec<ConfigPatch>>,
    /// 如果 Some，update 时返回此错误（用于测试回滚路径）
    update_error: Mutex<Option<String>>,
    /// 如果 Some，update 在收到 notify 前挂起
    gate: Mutex<Option<Arc<Notify>>>,
    received: Notify,
}

impl MockConfigChannel {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            events,
            patches: Mutex::new(Vec::new()),
            update_error: Mutex::new(None),
            gate: Mutex::new(None),
            received: Notify::new(),
        }
    }

    pub async fn set_update_error(&self, err: Option<String>) {
        *self.update_error.lock().await = err;
    }

    /// Hold every update until the returned `Notify` is signalled
    pub async fn hold_updates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().await = Some(Arc::clone(&gate));
        gate
    }

    /// Resolves once an update has been received
    pub async fn wait_for_update(&self) {
        self.received.notified().await;
    }

    pub async fn patches(&self) -> Vec<ConfigPatch> {
        self.patches.lock().await.clone()
    }

    pub fn emit(&self, event: EdgeEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for MockConfigChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigChannel for MockConfigChannel {
    async fn update_edge_config(&self, patch: &ConfigPatch) -> CoreResult<()> {
        self.patches.lock().await.push(patch.clone());
        self.received.notify_one();

        let gate = self.gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(ref msg) = *self.update_error.lock().await {
            return Err(CoreError::RemoteRejected(msg.clone()));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<EdgeEvent> {
        self.events.subscribe()
    }
}

// ===== 工厂方法 =====

pub fn create_test_store() -> (Arc<ConfigStore>, Arc<MockConfigChannel>) {
    create_test_store_with(StoreOptions::default())
}

pub fn create_test_store_with(options: StoreOptions) -> (Arc<ConfigStore>, Arc<MockConfigChannel>) {
    let channel = Arc::new(MockConfigChannel::new());
    let store = Arc::new(ConfigStore::new(channel.clone(), options));
    (store, channel)
}

pub fn launch(command: &str, args: &[&str]) -> LaunchDefinition {
    LaunchDefinition::new(
        command,
        args.iter().map(ToString::to_string).collect(),
        BTreeMap::new(),
    )
}

/// Document with one installed + launchable server per id
pub fn document_with_servers(ids: &[&str]) -> EdgeConfig {
    let mut doc = EdgeConfig {
        id: "edge-1".to_string(),
        name: "Test Edge".to_string(),
        ..EdgeConfig::default()
    };
    for id in ids {
        doc.installed_servers.insert(
            (*id).to_string(),
            InstalledServer {
                server_id: (*id).to_string(),
                status: "READY".to_string(),
                ..InstalledServer::default()
            },
        );
        doc.launch_config
            .servers
            .insert((*id).to_string(), launch("npx", &["-y", id]));
    }
    doc
}
