// SPDX-License-Identifier: Apache-2.0

use crate::pattern::escape_glob;
use crate::{KeyPattern, KvBackend, StoreError, StoreErrorCode};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

#[derive(Clone, Debug)]
pub struct RedisPolicy {
    pub timeout: Duration,
    pub key_prefix: String,
    pub save_on_write: bool,
}

impl Default for RedisPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            key_prefix: String::new(),
            save_on_write: true,
        }
    }
}

#[must_use]
pub fn redis_url(host: &str, port: u16, db: i64) -> String {
    format!("redis://{host}:{port}/{db}")
}

fn map_redis_error(op: &str, e: &redis::RedisError) -> StoreError {
    let code = if e.is_io_error()
        || e.is_timeout()
        || e.is_connection_dropped()
        || e.is_connection_refusal()
    {
        StoreErrorCode::Unavailable
    } else {
        StoreErrorCode::Internal
    };
    StoreError::new(code, format!("redis {op} failed: {e}"))
}

pub struct RedisBackend {
    client: redis::Client,
    policy: RedisPolicy,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisBackend {
    pub fn new(url: &str, policy: RedisPolicy) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::new(StoreErrorCode::Internal, format!("invalid redis url: {e}")))?;
        Ok(Self {
            client,
            policy,
            conn: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn policy(&self) -> &RedisPolicy {
        &self.policy
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{key}", self.policy.key_prefix)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = timeout(
            self.policy.timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| StoreError::unavailable("redis connect timeout"))?
        .map_err(|e| map_redis_error("connect", &e))?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset_connection(&self) {
        *self.conn.lock().await = None;
    }

    /// Runs one command under the configured timeout. A failed connection is
    /// dropped so the next call reconnects; the failed call is not retried.
    async fn run<T, F, Fut>(&self, op: &str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.connection().await?;
        let result = match timeout(self.policy.timeout, f(conn)).await {
            Ok(Ok(v)) => return Ok(v),
            Ok(Err(e)) => map_redis_error(op, &e),
            Err(_) => StoreError::unavailable(format!("redis {op} timeout")),
        };
        if result.code == StoreErrorCode::Unavailable {
            self.reset_connection().await;
        }
        warn!(op, error = %result, "redis command failed");
        Err(result)
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    fn backend_tag(&self) -> &'static str {
        "redis"
    }

    #[instrument(level = "debug", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let key = self.namespaced(key);
        self.run("GET", |mut conn| async move { conn.get(key).await })
            .await
    }

    #[instrument(level = "debug", skip(self, value), fields(bytes = value.len()))]
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let key = self.namespaced(key);
        let payload = value.to_vec();
        self.run("SET", |mut conn| async move { conn.set(key, payload).await })
            .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let key = self.namespaced(key);
        let removed: i64 = self
            .run("DEL", |mut conn| async move { conn.del(key).await })
            .await?;
        Ok(removed > 0)
    }

    #[instrument(level = "debug", skip(self), fields(pattern = %pattern))]
    async fn keys(&self, pattern: &KeyPattern) -> Result<Vec<String>, StoreError> {
        let prefix = self.policy.key_prefix.clone();
        let glob = format!("{}{}", escape_glob(&prefix), pattern.as_str());
        let raw: Vec<String> = self
            .run("KEYS", |mut conn| async move { conn.keys(glob).await })
            .await?;
        Ok(raw
            .into_iter()
            .filter_map(|k| k.strip_prefix(prefix.as_str()).map(ToString::to_string))
            .collect())
    }

    async fn persist(&self) -> Result<(), StoreError> {
        if !self.policy.save_on_write {
            return Ok(());
        }
        debug!("redis SAVE");
        self.run("SAVE", |mut conn| async move {
            redis::cmd("SAVE").query_async::<_, ()>(&mut conn).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_from_host_port_db() {
        assert_eq!(redis_url("cache", 6380, 2), "redis://cache:6380/2");
    }

    #[test]
    fn invalid_url_is_rejected_without_connecting() {
        let err = RedisBackend::new("not a url", RedisPolicy::default())
            .err()
            .expect("invalid url");
        assert_eq!(err.code, StoreErrorCode::Internal);
    }

    #[tokio::test]
    async fn unreachable_server_maps_to_unavailable() {
        let policy = RedisPolicy {
            timeout: Duration::from_millis(200),
            ..RedisPolicy::default()
        };
        let backend = RedisBackend::new("redis://127.0.0.1:1/0", policy).expect("client");
        let err = backend.get("a/x").await.expect_err("no server on port 1");
        assert_eq!(err.code, StoreErrorCode::Unavailable);
    }

    #[test]
    fn keys_are_namespaced_by_prefix() {
        let policy = RedisPolicy {
            key_prefix: "scores:".to_string(),
            ..RedisPolicy::default()
        };
        let backend = RedisBackend::new("redis://127.0.0.1/0", policy).expect("client");
        assert_eq!(backend.namespaced("a/x"), "scores:a/x");
    }
}
