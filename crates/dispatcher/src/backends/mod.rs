//! Backend implementations

mod file;
mod log;
mod memory;
mod pubsub;
mod redis;

pub use file::{FileBackend, FileBackendConfig};
pub use log::LogBackend;
pub use memory::{MemoryBroker, MemoryConnection, MemoryConnector};
pub use pubsub::{ChannelConfig, PubSubBackend, PubSubConnection, PubSubConnector};
pub use self::redis::{redis_backend, RedisBackend, RedisConfig, RedisConnection, RedisConnector};
