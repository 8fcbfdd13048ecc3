use std::collections::BTreeSet;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::RedisError;
use tokio::sync::RwLock;

use wstudio_api::{
    Event, EventClock, EventStore, KeyScheme, PendingWrite, StoreError, StoreFuture, StoredRecord,
    WriteReceipt,
};

/// Keys requested per `SCAN` round trip.
const SCAN_COUNT: usize = 500;

// ═══════════════════════════════════════════════════════════════
//  RedisTarget
// ═══════════════════════════════════════════════════════════════

/// Where the store lives. Renders the connection URL
/// `redis://[default:<password>@]<host>:<port>/<db>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisTarget {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
}

impl Default for RedisTarget {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6379,
            db: 0,
            password: None,
        }
    }
}

impl RedisTarget {
    pub fn url(&self) -> String {
        self.render(|pw| urlencoding::encode(pw).into_owned())
    }

    /// URL safe to log: the password is replaced by `***`.
    pub fn masked_url(&self) -> String {
        self.render(|_| "***".to_string())
    }

    fn render(&self, password: impl Fn(&str) -> String) -> String {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        match self.password.as_deref().filter(|pw| !pw.is_empty()) {
            Some(pw) => format!(
                "redis://default:{}@{host}:{}/{}",
                password(pw),
                self.port,
                self.db
            ),
            None => format!("redis://{host}:{}/{}", self.port, self.db),
        }
    }
}

fn store_error(e: RedisError) -> StoreError {
    if e.is_io_error()
        || e.is_connection_refusal()
        || e.is_timeout()
        || e.is_connection_dropped()
    {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Command(e.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════
//  RedisEventStore
// ═══════════════════════════════════════════════════════════════

/// Event store over a single multiplexed Redis connection.
///
/// Clones of the connection share one socket; commands from concurrent
/// requests are pipelined over it.
pub struct RedisEventStore {
    conn: RwLock<Option<MultiplexedConnection>>,
    scheme: KeyScheme,
    clock: EventClock,
    endpoint: String,
}

impl std::fmt::Debug for RedisEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventStore")
            .field("endpoint", &self.endpoint)
            .field("scheme", &self.scheme)
            .finish()
    }
}

impl RedisEventStore {
    pub async fn connect(
        target: &RedisTarget,
        scheme: KeyScheme,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        Self::connect_url(&target.url(), &target.masked_url(), scheme, timeout).await
    }

    /// Open the connection and `PING` it. `endpoint` is only used for logs.
    pub async fn connect_url(
        url: &str,
        endpoint: &str,
        scheme: KeyScheme,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Connection(format!("{endpoint}: {e}")))?;

        let mut conn = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| {
                StoreError::Connection(format!("{endpoint}: connect timed out after {timeout:?}"))
            })?
            .map_err(store_error)?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        tracing::info!(endpoint, reply = %pong, "store connected");

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            scheme,
            clock: EventClock::new(),
            endpoint: endpoint.to_string(),
        })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, StoreError> {
        self.conn
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::Connection(format!("{}: store closed", self.endpoint)))
    }
}

/// `HSET <key> studio_id .. user_id .. event .. timestamp ..` in one command.
fn hset_cmd(pending: &PendingWrite) -> redis::Cmd {
    let mut cmd = redis::cmd("HSET");
    cmd.arg(&pending.key);
    for (field, value) in &pending.fields {
        cmd.arg(*field).arg(value);
    }
    cmd
}

impl EventStore for RedisEventStore {
    fn read(&self, key: &str) -> StoreFuture<'_, StoredRecord> {
        let key = key.to_string();
        Box::pin(async move {
            let mut conn = self.conn().await?;
            let fields: Vec<(String, String)> = redis::cmd("HGETALL")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .map_err(store_error)?;
            tracing::debug!(key = %key, fields = fields.len(), "HGETALL");
            Ok(StoredRecord::from(fields))
        })
    }

    fn list_keys(&self, id: &str) -> StoreFuture<'_, Vec<String>> {
        let id = id.to_string();
        let pattern = self.scheme.studio_pattern(&id);
        Box::pin(async move {
            let mut conn = self.conn().await?;
            let mut keys = BTreeSet::new();
            let mut cursor: u64 = 0;
            loop {
                let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_COUNT)
                    .query_async(&mut conn)
                    .await
                    .map_err(store_error)?;
                keys.extend(
                    batch
                        .into_iter()
                        .filter(|k| self.scheme.is_record_key_of(&id, k)),
                );
                if next == 0 {
                    break;
                }
                cursor = next;
            }
            tracing::debug!(pattern = %pattern, keys = keys.len(), "SCAN");
            Ok(keys.into_iter().collect())
        })
    }

    fn delete(&self, key: &str) -> StoreFuture<'_, u64> {
        let key = key.to_string();
        Box::pin(async move {
            let mut conn = self.conn().await?;
            let removed: u64 = redis::cmd("DEL")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .map_err(store_error)?;
            tracing::debug!(key = %key, removed, "DEL");
            Ok(removed)
        })
    }

    fn write(&self, event: Event) -> StoreFuture<'_, WriteReceipt> {
        Box::pin(async move {
            let mut conn = self.conn().await?;
            let pending = PendingWrite::prepare(&self.scheme, &self.clock, event);

            let _: i64 = hset_cmd(&pending)
                .query_async(&mut conn)
                .await
                .map_err(store_error)?;

            tracing::debug!(key = %pending.key, "HSET");
            Ok(pending.into_receipt())
        })
    }

    fn close(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if self.conn.write().await.take().is_some() {
                tracing::info!(endpoint = %self.endpoint, "store connection closed");
            }
            Ok(())
        })
    }
}
