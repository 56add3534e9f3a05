//! BackendRegistry - resolves backend selectors to implementations

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{BackendConfig, StorageBackend};
use tracing::{debug, instrument};

use crate::backends::{redis_backend, FileBackend, LogBackend};
use crate::error::DispatcherError;

/// Builds an unopened backend from its configuration
pub type BackendFactory =
    Arc<dyn Fn(&BackendConfig) -> Result<Arc<dyn StorageBackend>, DispatcherError> + Send + Sync>;

/// Selector -> factory table
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `redis`, `log` and `file` selectors
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();

        registry.register(
            "redis",
            Arc::new(|config: &BackendConfig| -> Result<Arc<dyn StorageBackend>, DispatcherError> {
                let backend = redis_backend(config)
                    .map_err(|e| DispatcherError::backend_creation(&config.id, e.to_string()))?;
                Ok(Arc::new(backend))
            }),
        );
        registry.register(
            "log",
            Arc::new(|config: &BackendConfig| -> Result<Arc<dyn StorageBackend>, DispatcherError> {
                Ok(Arc::new(LogBackend::new(config.id.clone())))
            }),
        );
        registry.register(
            "file",
            Arc::new(|config: &BackendConfig| -> Result<Arc<dyn StorageBackend>, DispatcherError> {
                let backend = FileBackend::from_config(config)
                    .map_err(|e| DispatcherError::backend_creation(&config.id, e.to_string()))?;
                Ok(Arc::new(backend))
            }),
        );

        registry
    }

    /// Register (or replace) the factory for `selector`
    pub fn register(&mut self, selector: impl Into<String>, factory: BackendFactory) {
        self.factories.insert(selector.into(), factory);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, selector: impl Into<String>, factory: BackendFactory) -> Self {
        self.register(selector, factory);
        self
    }

    pub fn contains(&self, selector: &str) -> bool {
        self.factories.contains_key(selector)
    }

    /// Registered selectors, sorted
    pub fn selectors(&self) -> Vec<&str> {
        let mut selectors: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        selectors.sort_unstable();
        selectors
    }

    /// Instantiate the backend for `config`
    #[instrument(
        name = "backend_registry_create",
        skip(self, config),
        fields(backend = %config.id, selector = %config.selector)
    )]
    pub fn create(&self, config: &BackendConfig) -> Result<Arc<dyn StorageBackend>, DispatcherError> {
        let factory =
            self.factories
                .get(&config.selector)
                .ok_or_else(|| DispatcherError::UnknownSelector {
                    id: config.id.clone(),
                    selector: config.selector.clone(),
                })?;

        let backend = factory(config)?;
        debug!("Backend created");
        Ok(backend)
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("selectors", &self.selectors())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBroker;

    #[test]
    fn test_builtin_selectors() {
        let registry = BackendRegistry::with_builtin();
        assert_eq!(registry.selectors(), vec!["file", "log", "redis"]);
    }

    #[test]
    fn test_unknown_selector() {
        let registry = BackendRegistry::with_builtin();
        let config = BackendConfig::new("x", "cassandra");
        let err = match registry.create(&config) {
            Err(e) => e,
            Ok(_) => panic!("expected unknown selector"),
        };
        assert!(matches!(err, DispatcherError::UnknownSelector { .. }));
    }

    #[test]
    fn test_redis_requires_host() {
        let registry = BackendRegistry::with_builtin();
        let config = BackendConfig::new("r", "redis");
        assert!(matches!(
            registry.create(&config),
            Err(DispatcherError::BackendCreation { .. })
        ));
    }

    #[test]
    fn test_registered_factory_is_used() {
        let broker = MemoryBroker::new();
        let registry = BackendRegistry::new().with("memory", broker.factory());
        let backend = registry
            .create(&BackendConfig::new("mem", "memory"))
            .unwrap();
        assert_eq!(backend.name(), "mem");
    }
}
