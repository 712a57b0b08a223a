//! Application state for the gateway.
//!
//! Shared, read-only state handed to every request handler: the rule store,
//! the configuration and the HTTP client used for all outbound calls.

use std::sync::Arc;

use searchgate_persistence::core::FieldLimitStore;

use crate::config::GatewayConfig;

/// Shared application state.
///
/// # Type Parameters
///
/// * `S` - The rule store type (must implement [`FieldLimitStore`])
///
/// # Example
///
/// ```rust,ignore
/// use searchgate_rest::{AppState, GatewayConfig};
/// use searchgate_persistence::backends::sqlite::SqliteLimitStore;
/// use std::sync::Arc;
///
/// let store = SqliteLimitStore::in_memory()?;
/// let state = AppState::new(Arc::new(store), GatewayConfig::default());
/// ```
pub struct AppState<S> {
    /// The rule store.
    store: Arc<S>,

    /// Gateway configuration.
    config: Arc<GatewayConfig>,

    /// Client for the backend and supporting services.
    client: reqwest::Client,
}

// Manually implement Clone since S is wrapped in Arc and doesn't need to be Clone
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            client: self.client.clone(),
        }
    }
}

impl<S: FieldLimitStore> AppState<S> {
    /// Creates a new AppState with a default HTTP client.
    pub fn new(store: Arc<S>, config: GatewayConfig) -> Self {
        Self::with_client(store, config, reqwest::Client::new())
    }

    /// Creates a new AppState with the given HTTP client.
    pub fn with_client(store: Arc<S>, config: GatewayConfig, client: reqwest::Client) -> Self {
        Self {
            store,
            config: Arc::new(config),
            client,
        }
    }

    /// Returns a reference to the rule store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns a reference to the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the shared HTTP client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use searchgate_persistence::FieldLimit;
    use searchgate_persistence::error::StorageResult;

    // Mock store for testing
    struct MockStore;

    #[async_trait]
    impl FieldLimitStore for MockStore {
        fn backend_name(&self) -> &'static str {
            "mock"
        }

        async fn limits_for(&self, _user_id: &str, _fields: &[String]) -> StorageResult<Vec<FieldLimit>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_app_state_creation() {
        let state = AppState::new(Arc::new(MockStore), GatewayConfig::default());

        assert_eq!(state.store().backend_name(), "mock");
        assert_eq!(state.config().max_rows, 2000);
    }

    #[test]
    fn test_app_state_clone_shares_store() {
        let state = AppState::new(Arc::new(MockStore), GatewayConfig::default());
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.store, &cloned.store));
        assert!(Arc::ptr_eq(&state.config, &cloned.config));
    }
}
