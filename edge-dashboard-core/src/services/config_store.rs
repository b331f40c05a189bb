//! Edge configuration store
//!
//! Holds the one in-memory copy of the edge configuration document, the set of
//! installs waiting for backend confirmation, and mediates every write to the
//! [`ConfigChannel`].
//!
//! Writes are optimistic: the patch is merged locally first, then pushed. When
//! the push fails the store restores the document it held right before the
//! merge, unless something else (a snapshot or another write) has replaced the
//! document in the meantime. Inbound snapshots always replace the document
//! wholesale.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{CoreError, CoreResult};
use crate::services::instances::{executable_instances, without_server};
use crate::traits::ConfigChannel;
use crate::types::{
    Candidate, ConfigPatch, EdgeConfig, EdgeEvent, ExecutableInstance, InstalledServer,
    LaunchDefinition, ServerSubmission, BUILTIN_SERVER_ID,
};

/// Record status written for a new installation
pub const STATUS_INSTALLING: &str = "INSTALLING";
/// Record status written when an existing server is reconfigured
pub const STATUS_STARTING: &str = "STARTING";

/// Store tuning
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Drop pending installs older than this in `sweep_expired_installs`
    pub install_timeout: Option<Duration>,
}

struct StoreState {
    document: EdgeConfig,
    /// server id → time the install was issued
    pending: HashMap<String, Instant>,
    revision: u64,
}

/// Edge configuration store
pub struct ConfigStore {
    channel: Arc<dyn ConfigChannel>,
    options: StoreOptions,
    state: RwLock<StoreState>,
    changes: watch::Sender<u64>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ConfigStore {
    /// Create a store holding the default document
    #[must_use]
    pub fn new(channel: Arc<dyn ConfigChannel>, options: StoreOptions) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            channel,
            options,
            state: RwLock::new(StoreState {
                document: EdgeConfig::default(),
                pending: HashMap::new(),
                revision: 0,
            }),
            changes,
            listener: Mutex::new(None),
        }
    }

    // ===== Life cycle =====

    /// Subscribe to the channel and start applying pushed snapshots
    pub async fn initialize(self: &Arc<Self>) -> CoreResult<()> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Err(CoreError::AlreadyInitialized);
        }

        let events = self.channel.subscribe();
        let store = Arc::downgrade(self);
        *listener = Some(tokio::spawn(listen(store, events)));
        log::info!("Config store initialized");
        Ok(())
    }

    /// Stop applying pushed snapshots; the held document stays readable
    pub async fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
            log::info!("Config store shut down");
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.listener.lock().await.is_some()
    }

    // ===== Reads =====

    /// Copy of the current document
    pub async fn document(&self) -> EdgeConfig {
        self.state.read().await.document.clone()
    }

    /// Instances derived from the current document, recomputed on every call
    pub async fn executable_instances(&self) -> Vec<ExecutableInstance> {
        let state = self.state.read().await;
        executable_instances(&state.document, |id| state.pending.contains_key(id))
    }

    pub async fn is_installing(&self, server_id: &str) -> bool {
        self.state.read().await.pending.contains_key(server_id)
    }

    /// Pending install ids, sorted
    pub async fn pending_installs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.read().await.pending.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Revision counter, bumped on every local change or applied snapshot
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    // ===== Snapshots =====

    /// Dispatch one pushed event
    pub async fn handle_event(&self, event: EdgeEvent) {
        match event {
            EdgeEvent::ConfigUpdate(document) => {
                self.apply_snapshot(*document).await;
            }
            other => log::debug!("Config store ignoring edge event: {}", other.kind()),
        }
    }

    /// Replace the document with a backend snapshot.
    ///
    /// Returns `false` when the snapshot is older than the held document
    /// (both carry a `revision` and the incoming one is lower).
    pub async fn apply_snapshot(&self, document: EdgeConfig) -> bool {
        let mut state = self.state.write().await;

        if let (Some(incoming), Some(held)) = (document.revision, state.document.revision) {
            if incoming < held {
                log::warn!("Dropping stale edge config snapshot (revision {incoming} < {held})");
                return false;
            }
        }

        state.pending.retain(|server_id, _| {
            let confirmed = document.launch_config.servers.contains_key(server_id);
            if confirmed {
                log::info!("Install confirmed by edge: {server_id}");
            }
            !confirmed
        });
        state.document = document;
        self.bump(&mut state);
        true
    }

    // ===== Writes =====

    /// Merge `patch` locally, then push it to the edge.
    ///
    /// On push failure the pre-merge document is restored (see module docs)
    /// and the error is returned to the caller. No retry.
    pub async fn save_config(&self, patch: ConfigPatch) -> CoreResult<()> {
        self.write_with(|_| Ok(patch), None).await
    }

    /// Mark a server as awaiting install confirmation
    pub async fn begin_install(&self, server_id: &str) {
        let mut state = self.state.write().await;
        state.pending.insert(server_id.to_string(), Instant::now());
        self.bump(&mut state);
    }

    /// Install a new server or reconfigure an existing one
    pub async fn install_or_update(&self, submission: ServerSubmission) -> CoreResult<()> {
        let ServerSubmission {
            candidate,
            server_id,
            launch,
        } = submission;

        if server_id == BUILTIN_SERVER_ID {
            return Err(CoreError::ReservedServer(server_id));
        }

        let pending = candidate.is_new().then(|| server_id.clone());
        log::info!(
            "{} MCP server '{server_id}' ({} {})",
            if candidate.is_new() { "Installing" } else { "Updating" },
            launch.command,
            launch.args.join(" ")
        );

        self.write_with(
            |document| install_patch(document, &candidate, &server_id, launch),
            pending.as_deref(),
        )
        .await
    }

    /// Remove a server from both maps
    pub async fn remove_server(&self, server_id: &str) -> CoreResult<()> {
        if server_id == BUILTIN_SERVER_ID {
            return Err(CoreError::ReservedServer(server_id.to_string()));
        }

        self.write_with(
            |document| {
                if !document.contains_server(server_id) {
                    return Err(CoreError::ServerNotFound(server_id.to_string()));
                }
                let (installed, launch_config) = without_server(document, server_id);
                Ok(ConfigPatch {
                    installed_servers: Some(installed),
                    launch_config: Some(launch_config),
                    ..ConfigPatch::default()
                })
            },
            None,
        )
        .await?;

        let mut state = self.state.write().await;
        if state.pending.remove(server_id).is_some() {
            self.bump(&mut state);
        }
        log::info!("Removed MCP server '{server_id}'");
        Ok(())
    }

    /// Add a workspace path (no-op when already present)
    pub async fn add_workspace_path(&self, path: &str) -> CoreResult<()> {
        let path = path.trim();
        if path.is_empty() {
            return Err(CoreError::ValidationError(
                "Workspace path cannot be empty".to_string(),
            ));
        }

        self.write_with(
            |document| {
                if document.workspace_paths.iter().any(|p| p == path) {
                    return Ok(ConfigPatch::default());
                }
                let mut paths = document.workspace_paths.clone();
                paths.push(path.to_string());
                Ok(ConfigPatch {
                    workspace_paths: Some(paths),
                    ..ConfigPatch::default()
                })
            },
            None,
        )
        .await
    }

    /// Remove a workspace path (no-op when absent)
    pub async fn remove_workspace_path(&self, path: &str) -> CoreResult<()> {
        self.write_with(
            |document| {
                if !document.workspace_paths.iter().any(|p| p == path) {
                    return Ok(ConfigPatch::default());
                }
                let paths = document
                    .workspace_paths
                    .iter()
                    .filter(|p| *p != path)
                    .cloned()
                    .collect();
                Ok(ConfigPatch {
                    workspace_paths: Some(paths),
                    ..ConfigPatch::default()
                })
            },
            None,
        )
        .await
    }

    /// Change the edge display name
    pub async fn rename_edge(&self, name: &str) -> CoreResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::ValidationError(
                "Edge name cannot be empty".to_string(),
            ));
        }
        self.save_config(ConfigPatch {
            name: Some(name.to_string()),
            ..ConfigPatch::default()
        })
        .await
    }

    /// Forget pending installs older than `install_timeout`; returns their ids
    pub async fn sweep_expired_installs(&self) -> Vec<String> {
        let Some(timeout) = self.options.install_timeout else {
            return Vec::new();
        };

        let mut state = self.state.write().await;
        let now = Instant::now();
        let mut expired: Vec<String> = state
            .pending
            .iter()
            .filter(|(_, started)| now.duration_since(**started) >= timeout)
            .map(|(id, _)| id.clone())
            .collect();
        if expired.is_empty() {
            return expired;
        }

        expired.sort();
        for id in &expired {
            state.pending.remove(id);
            log::warn!("Install of '{id}' not confirmed within {timeout:?}, giving up");
        }
        self.bump(&mut state);
        expired
    }

    // ===== Internal =====

    /// Build a patch from the current document, apply it optimistically and push it.
    async fn write_with<F>(&self, build: F, begin_install: Option<&str>) -> CoreResult<()>
    where
        F: FnOnce(&EdgeConfig) -> CoreResult<ConfigPatch>,
    {
        let (patch, previous, written_at) = {
            let mut state = self.state.write().await;
            let patch = build(&state.document)?;
            if patch.is_empty() {
                return Ok(());
            }

            let previous = state.document.clone();
            patch.apply_to(&mut state.document);
            if let Some(server_id) = begin_install {
                state.pending.insert(server_id.to_string(), Instant::now());
            }
            self.bump(&mut state);
            (patch, previous, state.revision)
        };

        if let Err(e) = self.channel.update_edge_config(&patch).await {
            if e.is_expected() {
                log::warn!("Edge rejected config update: {e}");
            } else {
                log::error!("Failed to push config update to edge: {e}");
            }
            self.rollback(previous, written_at, begin_install).await;
            return Err(e);
        }
        Ok(())
    }

    async fn rollback(&self, previous: EdgeConfig, written_at: u64, begin_install: Option<&str>) {
        let mut state = self.state.write().await;
        if let Some(server_id) = begin_install {
            state.pending.remove(server_id);
        }

        if state.revision == written_at {
            state.document = previous;
            log::info!("Rolled back optimistic config update");
        } else {
            log::warn!("Document changed since the failed update, keeping the newer state");
        }
        self.bump(&mut state);
    }

    fn bump(&self, state: &mut StoreState) {
        state.revision += 1;
        self.changes.send_replace(state.revision);
    }
}

async fn listen(store: Weak<ConfigStore>, mut events: tokio::sync::broadcast::Receiver<EdgeEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.handle_event(event).await;
            }
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Config store skipped {skipped} edge events");
            }
            Err(RecvError::Closed) => {
                log::info!("Edge event stream closed");
                break;
            }
        }
    }
}

/// Patch that installs or reconfigures `server_id`.
///
/// A new install never lands on an id that is already taken. Editing an
/// existing server under a new id moves it in place: the old key leaves both
/// maps, the new key takes its position, and the record (tools, registry link,
/// display id) carries over.
fn install_patch(
    document: &EdgeConfig,
    candidate: &Candidate,
    server_id: &str,
    launch: LaunchDefinition,
) -> CoreResult<ConfigPatch> {
    let mut installed = document.installed_servers.clone();
    let mut launch_config = document.launch_config.clone();
    let mut installed_at = None;
    let mut launch_at = None;

    let prior = match candidate.original_id() {
        Some(original) if original == server_id => {
            if !document.contains_server(original) {
                return Err(CoreError::ServerNotFound(original.to_string()));
            }
            installed.get(server_id).cloned()
        }
        Some(original) => {
            if !document.contains_server(original) {
                return Err(CoreError::ServerNotFound(original.to_string()));
            }
            ensure_id_free(document, server_id)?;
            launch_at = launch_config.servers.get_index_of(original);
            launch_config.servers.shift_remove(original);
            installed_at = installed.get_index_of(original);
            installed.shift_remove(original).map(|mut record| {
                if record.display_id.as_deref() == Some(original) {
                    record.display_id = None;
                }
                record
            })
        }
        None => {
            ensure_id_free(document, server_id)?;
            None
        }
    };

    let mut record: InstalledServer = prior.unwrap_or_default();
    record.server_id = server_id.to_string();
    if record.display_id.is_none() {
        record.display_id = Some(server_id.to_string());
    }
    if let Candidate::New {
        registry_id: Some(registry_id),
    } = candidate
    {
        record.registry_id.get_or_insert_with(|| registry_id.clone());
    }
    record.status = if candidate.is_new() {
        STATUS_INSTALLING
    } else {
        STATUS_STARTING
    }
    .to_string();
    record.command = Some(launch.command.clone());
    record.args = Some(launch.args.clone());
    record.env = launch.env.clone();

    put_at(&mut installed, installed_at, server_id, record);
    put_at(&mut launch_config.servers, launch_at, server_id, launch);

    Ok(ConfigPatch {
        installed_servers: Some(installed),
        launch_config: Some(launch_config),
        ..ConfigPatch::default()
    })
}

fn ensure_id_free(document: &EdgeConfig, server_id: &str) -> CoreResult<()> {
    if document.contains_server(server_id) {
        return Err(CoreError::ValidationError(format!(
            "Server id '{server_id}' is already in use"
        )));
    }
    Ok(())
}

/// Insert at `index` when given (the slot a renamed key used to hold), else in place or at the end
fn put_at<V>(map: &mut IndexMap<String, V>, index: Option<usize>, key: &str, value: V) {
    match index {
        Some(index) => {
            map.shift_insert(index, key.to_string(), value);
        }
        None => {
            map.insert(key.to_string(), value);
        }
    }
}
