//! Redis-backed [`KvStore`].

use std::time::Duration;

use aivis_core::{KvStore, StoreError};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{Client, RedisError, Script};
use tokio::sync::Mutex;
use tracing::debug;

/// Delete the key only while it still holds the caller's token.
const COMPARE_AND_DELETE: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
";

/// Reset the expiry only while the key still holds the caller's token.
const COMPARE_AND_EXTEND: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
else
    return 0
end
";

const SCAN_BATCH: usize = 200;

/// Store backed by a Redis server.
///
/// Regular commands share one managed connection that reconnects by itself
/// after the server restarts. Blocking pops take a connection from a small
/// idle pool instead, so a pop parked on the server never delays a lease
/// renewal queued behind it.
pub struct RedisStore {
    url: String,
    client: Client,
    conn: ConnectionManager,
    blocking_pool: Mutex<Vec<MultiplexedConnection>>,
    compare_and_delete: Script,
    compare_and_extend: Script,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("url", &self.url).finish_non_exhaustive()
    }
}

fn transport(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() || e.is_connection_refusal()
    {
        StoreError::Transport(e.to_string())
    } else {
        StoreError::Protocol(e.to_string())
    }
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Escape glob metacharacters for `SCAN MATCH`.
fn glob_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl RedisStore {
    /// Connect and verify the server answers.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let unavailable = |e: RedisError| StoreError::Unavailable {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let client = Client::open(url).map_err(unavailable)?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(unavailable)?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        debug!(url, "Connected to coordination store");
        Ok(Self {
            url: url.to_string(),
            client,
            conn,
            blocking_pool: Mutex::new(Vec::new()),
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
            compare_and_extend: Script::new(COMPARE_AND_EXTEND),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    async fn checkout_blocking(&self) -> Result<MultiplexedConnection, StoreError> {
        if let Some(conn) = self.blocking_pool.lock().await.pop() {
            return Ok(conn);
        }
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(transport)
    }

    async fn checkin_blocking(&self, conn: MultiplexedConnection) {
        self.blocking_pool.lock().await.push(conn);
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let _: String = redis::cmd("PING")
            .query_async(&mut self.conn())
            .await
            .map_err(transport)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(transport)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let count: u64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(transport)?;
        Ok(count > 0)
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut self.conn())
            .await
            .map_err(transport)?;
        Ok(reply.is_some())
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let _: String = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut self.conn())
            .await
            .map_err(transport)?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut self.conn())
            .await
            .map_err(transport)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let deleted: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut self.conn())
            .await
            .map_err(transport)?;
        Ok(deleted == 1)
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let extended: i64 = self
            .compare_and_extend
            .key(key)
            .arg(expected)
            .arg(millis(ttl))
            .invoke_async(&mut self.conn())
            .await
            .map_err(transport)?;
        Ok(extended == 1)
    }

    async fn push_back(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut self.conn())
            .await
            .map_err(transport)
    }

    async fn push_back_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let (): () = redis::pipe()
            .atomic()
            .cmd("RPUSH")
            .arg(key)
            .arg(value)
            .ignore()
            .cmd("PEXPIRE")
            .arg(key)
            .arg(millis(ttl))
            .ignore()
            .query_async(&mut self.conn())
            .await
            .map_err(transport)?;
        Ok(())
    }

    async fn pop_front_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        // BLPOP with 0 blocks forever; a zero timeout means "don't wait".
        if timeout.is_zero() {
            return redis::cmd("LPOP")
                .arg(key)
                .query_async(&mut self.conn())
                .await
                .map_err(transport);
        }

        let mut conn = self.checkout_blocking().await?;
        let reply: Result<Option<(String, String)>, RedisError> = redis::cmd("BLPOP")
            .arg(key)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await;

        match reply {
            Ok(popped) => {
                self.checkin_blocking(conn).await;
                Ok(popped.map(|(_, value)| value))
            }
            // A failed connection is dropped rather than returned to the pool.
            Err(e) => Err(transport(e)),
        }
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        redis::cmd("LLEN")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(transport)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let pattern = format!("{}*", glob_escape(prefix));
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(transport)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may report a key more than once.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
