//! Application bootstrap for the TODOforAI Edge dashboard.
//!
//! Provides `AppState` (service container), `AppStateBuilder` (channel injection),
//! and `StartupHooks` (shell-specific startup callbacks).

pub mod adapters;
pub mod config;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use edge_dashboard_core::error::{CoreError, CoreResult};
use edge_dashboard_core::services::{
    ConfigStore, FilterQuery, InstanceFilter, RegistryLookup, ServerEditor,
};
use edge_dashboard_core::traits::ConfigChannel;
use edge_dashboard_core::types::{DisplayInstance, EdgeConfig, EdgeEvent};

pub use config::AppConfig;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Shell-specific hooks for the startup sequence.
///
/// Use `NoopStartupHooks` when the shell has nothing to do.
#[async_trait::async_trait]
pub trait StartupHooks: Send + Sync {
    /// Called after the store is listening, with the document held at that point
    async fn on_ready(&self, _document: &EdgeConfig) {}

    /// Called when initialization fails
    async fn on_failed(&self, _error: &CoreError) {}
}

/// No-op startup hooks.
pub struct NoopStartupHooks;

#[async_trait::async_trait]
impl StartupHooks for NoopStartupHooks {}

/// Application state.
///
/// Every shell constructs this once at startup via `AppStateBuilder`.
pub struct AppState {
    /// Loaded application configuration
    pub config: AppConfig,
    /// Channel to the edge
    pub channel: Arc<dyn ConfigChannel>,
    /// MCP server catalog
    pub registry: Arc<RegistryLookup>,
    /// Edge configuration store
    pub config_store: Arc<ConfigStore>,
    /// List view over the store's instances
    pub instance_filter: InstanceFilter,
    /// Whether `initialize()` has completed
    pub initialized: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    /// Start listening for snapshots and, when configured, sweeping stale installs.
    pub async fn initialize(&self, hooks: &dyn StartupHooks) -> CoreResult<()> {
        if let Err(e) = self.config_store.initialize().await {
            if e.is_expected() {
                log::warn!("Initialization skipped: {e}");
            } else {
                log::error!("Initialization failed: {e}");
            }
            hooks.on_failed(&e).await;
            return Err(e);
        }

        if let Some(timeout) = self.config.install_timeout() {
            let interval = (timeout / 2).max(MIN_SWEEP_INTERVAL);
            let store = Arc::downgrade(&self.config_store);
            *self.sweeper.lock().await = Some(tokio::spawn(sweep_loop(store, interval)));
        }

        self.initialized.store(true, Ordering::SeqCst);
        log::info!("Edge dashboard initialized");
        hooks.on_ready(&self.config_store.document().await).await;
        Ok(())
    }

    /// Stop background tasks. The last document stays readable.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().await.take() {
            handle.abort();
        }
        self.config_store.shutdown().await;
        self.initialized.store(false, Ordering::SeqCst);
        log::info!("Edge dashboard shut down");
    }

    /// Filtered, annotated instance list for the dashboard
    pub async fn visible_instances(&self, query: &FilterQuery) -> CoreResult<Vec<DisplayInstance>> {
        self.ensure_initialized()?;
        let instances = self.config_store.executable_instances().await;
        Ok(self.instance_filter.apply(&instances, query))
    }

    /// Categories for the selector, computed from the current instances
    pub async fn categories(&self) -> CoreResult<Vec<String>> {
        self.ensure_initialized()?;
        let instances = self.config_store.executable_instances().await;
        Ok(self.instance_filter.categories(&instances))
    }

    /// Editor for installing a catalog entry
    pub fn install_editor(&self, registry_id: &str) -> CoreResult<ServerEditor> {
        self.registry
            .installable()
            .into_iter()
            .find(|entry| entry.registry_id == registry_id)
            .map(ServerEditor::from_registry)
            .ok_or_else(|| CoreError::ServerNotFound(registry_id.to_string()))
    }

    /// Editor for an installed server
    pub async fn edit_editor(&self, server_id: &str) -> CoreResult<ServerEditor> {
        self.config_store
            .executable_instances()
            .await
            .iter()
            .find(|instance| instance.server_id == server_id && !instance.is_builtin())
            .map(ServerEditor::from_instance)
            .ok_or_else(|| CoreError::ServerNotFound(server_id.to_string()))
    }

    /// Raw edge events (auth, workspace activity, ...) for the shell
    pub fn subscribe_events(&self) -> broadcast::Receiver<EdgeEvent> {
        self.channel.subscribe()
    }

    fn ensure_initialized(&self) -> CoreResult<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::NotInitialized)
        }
    }
}

async fn sweep_loop(store: Weak<ConfigStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let Some(store) = store.upgrade() else {
            break;
        };
        let expired = store.sweep_expired_installs().await;
        if !expired.is_empty() {
            log::warn!("Dropped {} unconfirmed installs: {expired:?}", expired.len());
        }
    }
}

/// Builder for constructing `AppState` with a shell-specific channel.
///
/// # Required
/// - `channel`: how to reach the edge
///
/// # Optional
/// - `config`: defaults to `AppConfig::default()`
/// - `registry`: defaults to the built-in catalog
pub struct AppStateBuilder {
    channel: Option<Arc<dyn ConfigChannel>>,
    config: Option<AppConfig>,
    registry: Option<RegistryLookup>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            channel: None,
            config: None,
            registry: None,
        }
    }

    #[must_use]
    pub fn channel(mut self, channel: Arc<dyn ConfigChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    #[must_use]
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: RegistryLookup) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Connect to the sidecar named in the config and use it as the channel.
    #[cfg(feature = "sidecar-ws")]
    pub async fn connect_sidecar(self) -> CoreResult<Self> {
        let config = self.config.clone().unwrap_or_default();
        let channel =
            adapters::SidecarConfigChannel::connect(&config.sidecar_url, config.request_timeout())
                .await?;
        Ok(self.channel(Arc::new(channel)))
    }

    /// Build the `AppState`.
    ///
    /// # Errors
    /// Returns `CoreError::ValidationError` if the channel is missing.
    pub fn build(self) -> CoreResult<AppState> {
        let channel = self
            .channel
            .ok_or_else(|| CoreError::ValidationError("channel is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        let registry = Arc::new(self.registry.unwrap_or_default());

        let config_store = Arc::new(ConfigStore::new(
            Arc::clone(&channel),
            config.store_options(),
        ));
        let instance_filter = InstanceFilter::new(Arc::clone(&registry));

        Ok(AppState {
            config,
            channel,
            registry,
            config_store,
            instance_filter,
            initialized: AtomicBool::new(false),
            sweeper: Mutex::new(None),
        })
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
