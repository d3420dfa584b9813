use std::sync::Arc;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::EngineConfig;
use crate::error::{WebhookError, WebhookResult};
use crate::signature::SignaturePolicy;
use crate::store::DocumentStore;

/// Shared application state
#[derive(Clone)]
pub struct EngineState {
    /// Engine configuration
    pub config: Arc<EngineConfig>,

    /// Signature policy resolved once at startup
    pub policy: SignaturePolicy,

    /// Document store (shared across requests)
    pub store: Arc<dyn DocumentStore>,

    /// Prometheus recorder handle, when metrics are enabled
    pub prometheus: Option<PrometheusHandle>,
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineState")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .field("store", &"<dyn DocumentStore>")
            .field("prometheus", &self.prometheus.is_some())
            .finish()
    }
}

impl EngineState {
    /// Create new engine state from configuration.
    ///
    /// A configured verification key that fails to decode is a startup
    /// error, never a silently permissive endpoint.
    pub fn new(config: EngineConfig) -> WebhookResult<Self> {
        let store = config
            .store_config()
            .map_err(|e| WebhookError::Config(e.to_string()))?
            .build()?;
        Self::with_store(config, Arc::from(store))
    }

    /// Create engine state around an already-built store. Used by tests
    /// and by embedders that manage their own backend.
    pub fn with_store(config: EngineConfig, store: Arc<dyn DocumentStore>) -> WebhookResult<Self> {
        let policy = SignaturePolicy::resolve(config.webhook_verification_key.as_deref())
            .map_err(|e| WebhookError::Config(e.to_string()))?;

        if matches!(policy, SignaturePolicy::WarnAndAllow) {
            tracing::warn!(
                "No webhook verification key configured; deliveries will be accepted unverified"
            );
        }

        let prometheus = if config.metrics_enabled {
            // install_recorder fails if a global recorder already exists
            // (tests build multiple states in one process); the endpoint
            // then falls back to its uptime body.
            PrometheusBuilder::new().install_recorder().ok()
        } else {
            None
        };

        Ok(Self {
            config: Arc::new(config),
            policy,
            store,
            prometheus,
        })
    }
}
