use config::Config;
use log::info;
use sse::StreamRegistry;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub mod config;
pub mod logging;

/// Builds the stream registry described by `config`.
pub fn init_registry(config: &Config) -> Arc<StreamRegistry> {
    let registry = Arc::new(StreamRegistry::new(config.sse_buffer_size));
    info!(
        "Stream registry config: buffer_size={}, idle_ttl={}s, cleanup_interval={}s",
        registry.buffer_size(),
        config.sse_idle_ttl_secs,
        config.sse_cleanup_interval_secs,
    );
    registry
}

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub sse_registry: Arc<StreamRegistry>,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config, registry: &Arc<StreamRegistry>) -> Self {
        Self {
            sse_registry: Arc::clone(registry),
            config: app_config,
        }
    }

    pub fn registry(&self) -> &StreamRegistry {
        self.sse_registry.as_ref()
    }

    /// Starts the idle-thread reaper with the configured interval and TTL.
    pub fn start_cleanup(&self) -> JoinHandle<()> {
        self.sse_registry
            .start_cleanup(self.config.sse_cleanup_interval(), self.config.sse_idle_ttl())
    }
}
