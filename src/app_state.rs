//! Application state shared across all handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::services::PayloadDispatcher;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Runs verified webhook payloads in the background
    pub dispatcher: PayloadDispatcher,
}

impl AppState {
    pub fn new(config: Config, dispatcher: PayloadDispatcher) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher,
        }
    }
}
