use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use cx_types::ClientError;
use cx_types::IoOrigin;
use cx_types::Result;
use redis::RedisError;
use redis::aio::ConnectionManager;
use tracing::debug;
use tracing::info;

use crate::store::SharedCounterStore;

const SCAN_BATCH: usize = 200;

/// Redis-backed counter store
///
/// Holds a multiplexed `ConnectionManager`; clones share the connection. The store never
/// closes or reconfigures the connection it was handed.
#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
}

impl RedisCounterStore {
    /// Wrap an existing connection
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Open a connection to `url`; failure surfaces as `StoreUnavailable`
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| ClientError::StoreUnavailable { message: format!("invalid redis url: {e}") })?;

        let connection = match tokio::time::timeout(connect_timeout, ConnectionManager::new(client)).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => return Err(ClientError::StoreUnavailable { message: e.to_string() }),
            Err(_) => return Err(ClientError::StoreUnavailable { message: format!("no connection within {connect_timeout:?}") }),
        };

        info!(url = %redacted_url(url), "Connected to redis counter store");
        Ok(Self { connection })
    }

    /// All keys matching a glob, via cursor SCAN (never KEYS)
    pub async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut connection = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) =
                redis::cmd("SCAN").arg(cursor).arg("MATCH").arg(pattern).arg("COUNT").arg(SCAN_BATCH).query_async(&mut connection).await.map_err(store_error)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        debug!(pattern, found = keys.len(), "Scanned counter keys");
        Ok(keys)
    }

    /// Delete `keys`, returning how many existed
    pub async fn delete_keys(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut connection = self.connection.clone();
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key);
        }
        let removed: u64 = cmd.query_async(&mut connection).await.map_err(store_error)?;
        Ok(removed)
    }

    /// Remaining TTL in seconds; `None` for missing keys or keys without expiry
    pub async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let mut connection = self.connection.clone();
        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut connection).await.map_err(store_error)?;
        Ok(u64::try_from(ttl).ok())
    }
}

impl SharedCounterStore for RedisCounterStore {
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let value: Option<u64> = redis::cmd("GET").arg(key).query_async(&mut connection).await.map_err(store_error)?;
            Ok(value.unwrap_or(0))
        })
    }

    fn increment_and_expire<'a>(&'a self, key: &'a str, ttl_seconds: u64) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            // MULTI/EXEC: both commands apply or neither does
            let (count, _): (u64, i64) = redis::pipe()
                .atomic()
                .cmd("INCR")
                .arg(key)
                .cmd("EXPIRE")
                .arg(key)
                .arg(ttl_seconds)
                .query_async(&mut connection)
                .await
                .map_err(store_error)?;
            Ok(count)
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let _: String = redis::cmd("PING").query_async(&mut connection).await.map_err(store_error)?;
            Ok(())
        })
    }
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore").finish_non_exhaustive()
    }
}

/// Timeouts and connection failures are transient; everything else is a plain store error
fn store_error(err: RedisError) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout { origin: IoOrigin::Store, message: err.to_string() }
    } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        ClientError::Connect { origin: IoOrigin::Store, message: err.to_string() }
    } else {
        ClientError::Store(err.to_string())
    }
}

/// Strip any password from a redis URL before logging it
fn redacted_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparseable>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_url() {
        assert_eq!(redacted_url("redis://:hunter2@localhost:6379/0"), "redis://:****@localhost:6379/0");
        assert_eq!(redacted_url("redis://localhost:6379"), "redis://localhost:6379");
        assert_eq!(redacted_url("not a url"), "<unparseable>");
    }

    #[test]
    fn test_error_classification() {
        let io = RedisError::from(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(store_error(io).kind(), cx_types::ErrorKind::Connect);

        let timeout = RedisError::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert_eq!(store_error(timeout).kind(), cx_types::ErrorKind::Timeout);

        let typed = RedisError::from((redis::ErrorKind::TypeError, "not an integer"));
        assert_eq!(store_error(typed).kind(), cx_types::ErrorKind::Store);
    }

    #[tokio::test]
    async fn test_invalid_url_is_store_unavailable() {
        let err = RedisCounterStore::connect("definitely not redis", Duration::from_millis(100)).await.unwrap_err();
        assert_eq!(err.kind(), cx_types::ErrorKind::StoreUnavailable);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_store_unavailable() {
        // Port 1 on loopback refuses connections
        let err = RedisCounterStore::connect("redis://127.0.0.1:1/", Duration::from_secs(2)).await.unwrap_err();
        assert_eq!(err.kind(), cx_types::ErrorKind::StoreUnavailable);
    }
}
