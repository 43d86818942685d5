//! Shared application state.

use whisperprint_core::WhisperPrintConfig;
use whisperprint_runtime::Orchestrator;
use whisperprint_store::RegistryStore;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: WhisperPrintConfig,
    pub store: RegistryStore,
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(config: WhisperPrintConfig, store: RegistryStore) -> Self {
        let orchestrator = Orchestrator::new(&config);
        Self {
            config,
            store,
            orchestrator,
        }
    }

    /// Open the registry at the configured path and build the state.
    pub fn open(config: WhisperPrintConfig) -> whisperprint_core::Result<Self> {
        let store = RegistryStore::open(&config.data_paths.registry_db)?;
        Ok(Self::new(config, store))
    }
}
