use std::{
    ops::Deref,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use redis::{Client, aio::ConnectionManager};

use crate::UplimitError;

/// Connections to the shared Redis server, handed out in turn.
///
/// A [`ConnectionManager`] pipelines every request over one socket and reconnects by
/// itself. Opening a few of them lets a busy replica keep several scripts in flight
/// without queueing them all behind each other. Clones share the connections and the
/// rotation.
#[derive(Clone)]
pub struct RedisStoreClient {
    connections: Arc<[ConnectionManager]>,
    cursor: Arc<AtomicUsize>,
}

impl std::fmt::Debug for RedisStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStoreClient")
            .field("connections", &self.connections.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl RedisStoreClient {
    /// Open a single connection.
    pub async fn default_from_client(client: Client) -> Result<Self, UplimitError> {
        Self::from_client(client, 1).await
    }

    /// Open `connection_count` connections from `client`.
    ///
    /// Fails before connecting if `connection_count` is zero, and with the first
    /// connection error otherwise.
    pub async fn from_client(
        client: Client,
        connection_count: usize,
    ) -> Result<Self, UplimitError> {
        if connection_count == 0 {
            return Err(UplimitError::InvalidRedisClientConnectionCount(
                "connection count must be > 0".to_string(),
            ));
        }

        let mut connections = Vec::with_capacity(connection_count);
        while connections.len() < connection_count {
            connections.push(client.get_connection_manager().await?);
        }

        Self::from_connection_managers(connections)
    }

    /// Use connection managers opened by the caller.
    pub fn from_connection_managers(
        connections: Vec<ConnectionManager>,
    ) -> Result<Self, UplimitError> {
        if connections.is_empty() {
            return Err(UplimitError::InvalidRedisClientConnectionCount(
                "at least one connection manager is required".to_string(),
            ));
        }

        Ok(Self {
            connections: connections.into(),
            cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of connections in rotation.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub(crate) fn next_connection(&self) -> ConnectionManager {
        let turn = self.cursor.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        self.connections[turn].clone()
    }
}

/// Namespace prepended to every bucket key in Redis.
///
/// One to 255 bytes, without `:`. The colon separates the prefix from bucket keys,
/// which may themselves contain colons.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RedisPrefix(Arc<str>);

impl RedisPrefix {
    /// Prefix used when none is configured: `uplimit`.
    pub fn default_prefix() -> Self {
        Self(Arc::from("uplimit"))
    }

    fn check(value: &str) -> Result<(), &'static str> {
        match value {
            "" => Err("Redis prefix must not be empty"),
            v if v.len() > 255 => Err("Redis prefix must not be longer than 255 bytes"),
            v if v.contains(':') => Err("Redis prefix must not contain colons"),
            _ => Ok(()),
        }
    }
}

impl Deref for RedisPrefix {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<String> for RedisPrefix {
    type Error = UplimitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::check(&value)
            .map_err(|reason| UplimitError::InvalidRedisPrefix(reason.to_string()))?;

        Ok(Self(Arc::from(value)))
    }
}

impl TryFrom<&str> for RedisPrefix {
    type Error = UplimitError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

/// Redis key of a bucket: `<prefix>:<key>:tb`.
///
/// The `tb` suffix keeps bucket hashes apart from anything else stored under the
/// same prefix.
#[derive(Clone, Debug)]
pub(crate) struct BucketKeyFormat {
    prefix: RedisPrefix,
}

impl BucketKeyFormat {
    const SUFFIX: &'static str = "tb";

    pub(crate) fn new(prefix: RedisPrefix) -> Self {
        Self { prefix }
    }

    pub(crate) fn bucket_key(&self, key: &str) -> String {
        format!("{}:{key}:{}", &*self.prefix, Self::SUFFIX)
    }
}
