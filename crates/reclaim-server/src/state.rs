//! Shared application state

use std::sync::Arc;

use reclaim_core::{BackgroundSweep, MatchingCoordinator, ServiceContext};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Instant-match coordinator
    pub coordinator: Arc<MatchingCoordinator>,
    /// Background batch matcher
    pub sweep: Arc<BackgroundSweep>,
    /// Raw service handles, for health probes
    pub services: Arc<ServiceContext>,
}

impl AppState {
    /// Bundle the engine pieces into one state value
    pub fn new(
        coordinator: Arc<MatchingCoordinator>,
        sweep: Arc<BackgroundSweep>,
        services: Arc<ServiceContext>,
    ) -> Self {
        Self {
            coordinator,
            sweep,
            services,
        }
    }
}
