//! Shared application state.

use ariv_core::{AppConfig, HardwareProbe, Registry, ResidentManager, StreamingRunner};

/// Process-singleton state injected into every handler via `State<Arc<AppState>>`.
///
/// The registry is read-only after startup; the manager is shared, mutable
/// bookkeeping behind its own internal mutex; the probe is stateless and
/// invoked fresh per request.
pub struct AppState {
    pub config: AppConfig,
    pub registry: Registry,
    pub manager: ResidentManager,
    pub probe: HardwareProbe,
    pub runner: StreamingRunner,
}

impl AppState {
    pub fn new(config: AppConfig, registry: Registry) -> Self {
        let manager = ResidentManager::new(config.resident.max_loaded);
        let runner = StreamingRunner::from_config(&config.runner);
        let probe = HardwareProbe::new();
        Self {
            config,
            registry,
            manager,
            probe,
            runner,
        }
    }
}
