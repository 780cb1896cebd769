//! Redis-backed key-value backend.
//!
//! Commands go over one multiplexed async connection that is cloned per call,
//! so every partition worker shares the same transport.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::RedisError;
use std::fmt;

use super::KeyValueBackend;
use crate::errors::BackendError;

/// Key-value backend issuing `SETEX` and `GET` against Redis.
#[derive(Clone)]
pub struct RedisBackend {
    connection: MultiplexedConnection,
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend").finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Connects to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub async fn connect(redis_url: impl AsRef<str>) -> Result<Self, BackendError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        Ok(Self { connection })
    }

    /// Wraps an already established connection.
    #[must_use]
    pub fn from_connection(connection: MultiplexedConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl KeyValueBackend for RedisBackend {
    async fn setex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), BackendError> {
        let mut conn = self.connection.clone();
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_seconds)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| map_redis_error("SETEX", &e))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut conn = self.connection.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(|e| map_redis_error("GET", &e))
    }
}

fn map_redis_error(command: &str, error: &RedisError) -> BackendError {
    if error.is_connection_dropped() || error.is_connection_refusal() || error.is_io_error() {
        BackendError::Connection(format!("{command} failed: {error}"))
    } else if error.is_timeout() {
        BackendError::Unavailable(format!("{command} timed out: {error}"))
    } else {
        BackendError::Command(format!("{command} failed: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_errors_map_to_command() {
        let error = RedisError::from((redis::ErrorKind::TypeError, "wrong type"));
        assert!(matches!(
            map_redis_error("GET", &error),
            BackendError::Command(message) if message.starts_with("GET failed")
        ));
    }

    #[test]
    fn test_io_errors_map_to_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let error = RedisError::from(io);
        assert!(matches!(
            map_redis_error("SETEX", &error),
            BackendError::Connection(_)
        ));
    }
}
