//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::document::{PageRasterizer, SessionManager};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    sessions: SessionManager,
}

impl AppState {
    /// Create a new application state around the given page rasterizer
    pub fn new(config: Config, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        let sessions = SessionManager::with_rasterizer(config.engine_settings(), rasterizer);
        Self {
            inner: Arc::new(AppStateInner { config, sessions }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the document session manager
    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }
}
