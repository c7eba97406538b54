use std::sync::Arc;

use colloquy_memory::ContextStore;
use colloquy_relay::RelaySession;

use crate::config::Config;

/// Shared application state passed to all handlers
///
/// Everything is behind an Arc so sessions can run concurrently while the
/// store stays the single source of truth for per-thread memory.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: Arc<RelaySession>,
}

impl AppState {
    pub fn new(config: Config, relay: Arc<RelaySession>) -> Self {
        Self {
            config: Arc::new(config),
            relay,
        }
    }

    pub fn store(&self) -> &Arc<ContextStore> {
        self.relay.store()
    }
}
