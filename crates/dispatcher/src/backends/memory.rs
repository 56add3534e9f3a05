//! MemoryBroker - in-process pub/sub transport
//!
//! Records every publication per channel. Connections can be severed and the
//! broker made unreachable, which makes the reconnect path observable without
//! an external server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use contracts::{BackendConfig, ContractError, StorageBackend};

use super::pubsub::{ChannelConfig, PubSubBackend, PubSubConnection, PubSubConnector};
use crate::error::DispatcherError;
use crate::registry::BackendFactory;

#[derive(Debug)]
struct BrokerState {
    published: HashMap<String, Vec<String>>,
    available: bool,
    /// Bumped by `sever`; connections from older generations are dead
    generation: u64,
    connect_attempts: u64,
    connections: u64,
}

/// Shared handle to an in-process broker
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                published: HashMap::new(),
                available: true,
                generation: 0,
                connect_attempts: 0,
                connections: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connector for a backend named `backend`
    pub fn connector(&self, backend: impl Into<String>) -> MemoryConnector {
        MemoryConnector {
            backend: backend.into(),
            broker: self.clone(),
        }
    }

    /// Factory for the registry (`memory` selector)
    ///
    /// Channels are read from the same params as the redis backend.
    pub fn factory(&self) -> BackendFactory {
        let broker = self.clone();
        Arc::new(
            move |config: &BackendConfig| -> Result<Arc<dyn StorageBackend>, DispatcherError> {
                Ok(Arc::new(PubSubBackend::new(
                    config.id.clone(),
                    ChannelConfig::from_params(config),
                    broker.connector(config.id.clone()),
                )))
            },
        )
    }

    /// Payloads published on `channel`, in order
    pub fn published(&self, channel: &str) -> Vec<String> {
        self.lock()
            .published
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Publications across all channels
    pub fn total_published(&self) -> usize {
        self.lock().published.values().map(Vec::len).sum()
    }

    /// Kill every open connection
    pub fn sever(&self) {
        self.lock().generation += 1;
    }

    /// Make new connections succeed or fail
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Successful connects so far
    pub fn connections(&self) -> u64 {
        self.lock().connections
    }

    /// Connect attempts so far, including refused ones
    pub fn connect_attempts(&self) -> u64 {
        self.lock().connect_attempts
    }
}

/// Connector bound to one backend name
pub struct MemoryConnector {
    backend: String,
    broker: MemoryBroker,
}

#[async_trait]
impl PubSubConnector for MemoryConnector {
    type Connection = MemoryConnection;

    fn endpoint(&self) -> String {
        "memory".to_string()
    }

    async fn connect(&self) -> Result<MemoryConnection, ContractError> {
        let mut state = self.broker.lock();
        state.connect_attempts += 1;
        if !state.available {
            return Err(ContractError::backend_connection(
                &self.backend,
                "broker unavailable",
            ));
        }
        state.connections += 1;

        Ok(MemoryConnection {
            backend: self.backend.clone(),
            broker: self.broker.clone(),
            generation: state.generation,
        })
    }
}

/// Connection valid until the broker is severed
pub struct MemoryConnection {
    backend: String,
    broker: MemoryBroker,
    generation: u64,
}

impl MemoryConnection {
    fn live_state(&self) -> Result<MutexGuard<'_, BrokerState>, ContractError> {
        let state = self.broker.lock();
        if !state.available || state.generation != self.generation {
            return Err(ContractError::backend_connection(
                &self.backend,
                "connection severed",
            ));
        }
        Ok(state)
    }
}

#[async_trait]
impl PubSubConnection for MemoryConnection {
    async fn publish(&mut self, channel: &str, payload: &str) -> Result<(), ContractError> {
        self.live_state()?
            .published
            .entry(channel.to_string())
            .or_default()
            .push(payload.to_string());
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), ContractError> {
        self.live_state().map(|_| ())
    }
}
