//! Application context
//!
//! Owns the process-wide pieces (event bus, collection store, plugin
//! registry) and wires them together once at start-up. Components get the
//! context, or clones of its handles, explicitly.

use myrkat_config::MyrkatConfig;
use std::sync::Arc;
use tracing::info;

use crate::events::EventBus;
use crate::notes::NotesController;
use crate::plugins::{builtin_plugins, load_plugins, LoadReport, PluginRegistry};
use crate::service::{StorageClient, StorageService};
use crate::storage::{CollectionBackend, CollectionStore, FileBackend, StorageResult};

/// Everything a running shell shares.
#[derive(Debug)]
pub struct AppContext {
    config: MyrkatConfig,
    bus: EventBus,
    store: Arc<CollectionStore>,
    plugins: PluginRegistry,
    plugin_report: LoadReport,
}

impl AppContext {
    /// File-backed context at `config.storage.data_dir`.
    pub async fn bootstrap(config: &MyrkatConfig) -> StorageResult<Self> {
        let backend = FileBackend::new(&config.storage.data_dir).with_pretty(config.storage.pretty);
        Self::with_backend(config, Arc::new(backend)).await
    }

    /// Context over any backend.
    ///
    /// Initializes the store, registers the storage service on a fresh bus and
    /// loads the built-in plugins that `plugins.disabled` does not name.
    pub async fn with_backend(
        config: &MyrkatConfig,
        backend: Arc<dyn CollectionBackend>,
    ) -> StorageResult<Self> {
        let store = Arc::new(CollectionStore::new(backend));
        store.initialize().await?;

        let bus = EventBus::new();
        Arc::new(StorageService::new(Arc::clone(&store))).register(&bus);

        let mut plugins = PluginRegistry::new();
        let plugin_report = load_plugins(&mut plugins, &builtin_plugins(), |id| {
            config.is_plugin_disabled(id)
        });

        info!(
            "Myrkat context ready ({} plugins registered)",
            plugin_report.registered.len()
        );

        Ok(Self {
            config: config.clone(),
            bus,
            store,
            plugins,
            plugin_report,
        })
    }

    pub fn config(&self) -> &MyrkatConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &Arc<CollectionStore> {
        &self.store
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn plugin_report(&self) -> &LoadReport {
        &self.plugin_report
    }

    /// Storage client bound to this context's bus
    pub fn client(&self) -> StorageClient {
        StorageClient::new(self.bus.clone())
    }

    /// Notes controller already tracking selection
    pub fn notes(&self) -> NotesController {
        let mut controller = NotesController::new(self.client());
        controller.attach();
        controller
    }

    /// Stop answering storage requests.
    pub fn shutdown(&self) -> bool {
        let removed = StorageService::unregister(&self.bus);
        info!("Myrkat context shut down");
        removed
    }
}
