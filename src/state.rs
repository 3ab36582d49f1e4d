//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::realtime::{OpenAIRealtimeFactory, UpstreamFactory};
use crate::core::session::SessionRegistry;
use crate::core::usage::UsageMeter;

/// State shared by every request handler.
pub struct AppState {
    pub config: ServerConfig,
    pub usage: Arc<UsageMeter>,
    pub sessions: SessionRegistry,
}

impl AppState {
    /// Build state that connects sessions to the configured OpenAI endpoint.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let factory = Arc::new(OpenAIRealtimeFactory::new(config.realtime_config()));
        Self::with_upstream_factory(config, factory)
    }

    /// Build state around a caller-supplied upstream factory.
    pub fn with_upstream_factory(
        config: ServerConfig,
        factory: Arc<dyn UpstreamFactory>,
    ) -> Arc<Self> {
        let usage = Arc::new(UsageMeter::new(config.quota_ms()));
        let sessions = SessionRegistry::new(factory, Arc::clone(&usage));
        Arc::new(Self {
            config,
            usage,
            sessions,
        })
    }
}
