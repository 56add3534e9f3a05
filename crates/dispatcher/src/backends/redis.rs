//! RedisBackend - publishes records over Redis PUBLISH

use std::time::Duration;

use async_trait::async_trait;
use contracts::{BackendConfig, ContractError};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::debug;

use super::pubsub::{ChannelConfig, PubSubBackend, PubSubConnection, PubSubConnector};

/// Pub/sub backend on a Redis server
pub type RedisBackend = PubSubBackend<RedisConnector>;

const DEFAULT_PORT: u16 = 6379;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2000;

/// Configuration for RedisConnector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl RedisConfig {
    /// Create config from backend params
    pub fn from_params(config: &BackendConfig) -> Result<Self, ContractError> {
        Ok(Self {
            host: config.required_param("host")?.to_string(),
            port: config.parsed_param("port", DEFAULT_PORT)?,
            connect_timeout: Duration::from_millis(
                config.parsed_param("connect_timeout_ms", DEFAULT_CONNECT_TIMEOUT_MS)?,
            ),
        })
    }

    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

/// Opens multiplexed tokio connections to one Redis server
pub struct RedisConnector {
    backend: String,
    config: RedisConfig,
}

impl RedisConnector {
    pub fn new(backend: impl Into<String>, config: RedisConfig) -> Self {
        Self {
            backend: backend.into(),
            config,
        }
    }

    fn connection_error(&self, message: impl std::fmt::Display) -> ContractError {
        ContractError::backend_connection(&self.backend, message.to_string())
    }
}

#[async_trait]
impl PubSubConnector for RedisConnector {
    type Connection = RedisConnection;

    fn endpoint(&self) -> String {
        self.config.url()
    }

    async fn connect(&self) -> Result<RedisConnection, ContractError> {
        let client =
            redis::Client::open(self.config.url()).map_err(|e| self.connection_error(e))?;

        let inner = tokio::time::timeout(
            self.config.connect_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            self.connection_error(format!(
                "connect timed out after {}ms",
                self.config.connect_timeout.as_millis()
            ))
        })?
        .map_err(|e| self.connection_error(e))?;

        debug!(backend = %self.backend, url = %self.config.url(), "Redis connection established");

        Ok(RedisConnection {
            backend: self.backend.clone(),
            inner,
        })
    }
}

/// One multiplexed Redis connection
pub struct RedisConnection {
    backend: String,
    inner: MultiplexedConnection,
}

#[async_trait]
impl PubSubConnection for RedisConnection {
    async fn publish(&mut self, channel: &str, payload: &str) -> Result<(), ContractError> {
        let _receivers: i64 = self
            .inner
            .publish(channel, payload)
            .await
            .map_err(|e| ContractError::backend_write(&self.backend, e.to_string()))?;
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), ContractError> {
        let _pong: String = redis::cmd("PING")
            .query_async(&mut self.inner)
            .await
            .map_err(|e| ContractError::backend_connection(&self.backend, e.to_string()))?;
        Ok(())
    }
}

/// Build an unopened redis backend from its configuration
pub fn redis_backend(config: &BackendConfig) -> Result<RedisBackend, ContractError> {
    let connector = RedisConnector::new(config.id.clone(), RedisConfig::from_params(config)?);
    Ok(PubSubBackend::new(
        config.id.clone(),
        ChannelConfig::from_params(config),
        connector,
    ))
}
