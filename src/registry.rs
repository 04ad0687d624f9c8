//! Explicit registry of the active connector.
//!
//! Model layers look up the connector they should talk to here instead of
//! through process-wide state; the application owns the registry and passes
//! it to whoever needs it.

use std::sync::Arc;

use crate::config::ConnectorConfig;
use crate::connector::{DataConnector, HttpConnector};
use crate::transport::Transport;

/// Holds the connector model operations are routed to.
#[derive(Default)]
pub struct ConnectorRegistry {
    active: Option<Arc<dyn DataConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `connector` the active instance, replacing any previous one.
    pub fn start_instance(&mut self, connector: Arc<dyn DataConnector>) {
        self.active = Some(connector);
    }

    /// The active connector, if one has been started.
    pub fn active(&self) -> Option<Arc<dyn DataConnector>> {
        self.active.clone()
    }

    /// Drop the active connector.
    pub fn clear(&mut self) {
        self.active = None;
    }
}

/// Build an [`HttpConnector`] from `config`, registering it as the active
/// instance when `config.global` is set.
///
/// The returned handle shares the connector with the registry; auth headers
/// set through either are seen by both.
pub fn connect(config: ConnectorConfig, registry: &mut ConnectorRegistry) -> Arc<HttpConnector> {
    let global = config.global;
    register(HttpConnector::new(config), global, registry)
}

/// Like [`connect`], over a custom transport.
pub fn connect_with_transport(
    config: ConnectorConfig,
    transport: Arc<dyn Transport>,
    registry: &mut ConnectorRegistry,
) -> Arc<HttpConnector> {
    let global = config.global;
    register(HttpConnector::with_transport(config, transport), global, registry)
}

fn register(
    connector: HttpConnector,
    global: bool,
    registry: &mut ConnectorRegistry,
) -> Arc<HttpConnector> {
    let connector = Arc::new(connector);
    if global {
        registry.start_instance(connector.clone());
    }
    connector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthProvider, StaticAuth};
    use crate::types::ModelConfig;

    #[test]
    fn test_connect_registers_global() {
        let mut registry = ConnectorRegistry::new();
        let connector = connect(ConnectorConfig::new("http://api.test/"), &mut registry);
        let active = registry.active().expect("connector registered");
        let raw = active.raw(Some(&ModelConfig::new("user"))).unwrap();
        assert_eq!(raw.url, "http://api.test/user/");
        assert_eq!(Arc::strong_count(&connector), 2);
    }

    #[test]
    fn test_override_through_shared_handle() {
        let mut registry = ConnectorRegistry::new();
        let connector = connect(ConnectorConfig::new("http://api.test/"), &mut registry);
        connector.set_auth_headers(StaticAuth::bearer("abc").headers());
        assert_eq!(connector.auth_headers()["authentication"], "Bearer abc");
    }

    #[test]
    fn test_connect_without_global() {
        let mut registry = ConnectorRegistry::new();
        let _connector = connect(
            ConnectorConfig::new("http://api.test/").with_global(false),
            &mut registry,
        );
        assert!(registry.active().is_none());
    }

    #[test]
    fn test_clear() {
        let mut registry = ConnectorRegistry::new();
        connect(ConnectorConfig::new("http://api.test/"), &mut registry);
        registry.clear();
        assert!(registry.active().is_none());
    }
}
