//! Application state shared across handlers

use crate::config::Settings;
use crate::limiter::RateGovernor;
use crate::suggest::SuggestService;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Global settings
    pub settings: Arc<Settings>,
    /// Dispatch engine
    pub service: Arc<SuggestService>,
    /// Present when rate limiting is enabled
    pub governor: Option<Arc<RateGovernor>>,
}

impl AppState {
    /// Create new application state
    pub fn new(settings: Settings, service: SuggestService) -> Self {
        let governor = settings.ratelimit.enabled.then(|| {
            let rl = &settings.ratelimit;
            Arc::new(RateGovernor::new(
                rl.capacity,
                rl.window(),
                rl.max_clients,
                rl.idle(),
            ))
        });

        Self {
            settings: Arc::new(settings),
            service: Arc::new(service),
            governor,
        }
    }

    /// Get instance name
    pub fn instance_name(&self) -> &str {
        &self.settings.general.instance_name
    }
}
