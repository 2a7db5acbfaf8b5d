use crate::config::Config;
use crate::providers::Connector;
use crate::session::SessionRegistry;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active client sessions (session id → coordinator)
    pub registry: SessionRegistry,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, connector: Arc<dyn Connector>) -> Self {
        Self {
            registry: SessionRegistry::new(connector, config.providers.clone()),
            config: Arc::new(config),
        }
    }
}
