//! Connections to the key-value store behind the cache socket.
//!
//! Thin wrappers over `redis` Unix-socket connections: an async client for
//! the registry and a blocking one for callers that own their thread.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use redis::aio::MultiplexedConnection;
use redis::{
    AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError,
    RedisResult,
};

pub fn connection_info(socket_path: &Path, db: i64) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Unix(socket_path.to_path_buf()),
        redis: RedisConnectionInfo {
            db,
            ..Default::default()
        },
    }
}

/// True when the store could not be reached or the exchange broke off.
pub fn is_connection_error(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped()
}

/// One connection to the store, bound to a logical database.
pub struct StoreClient {
    socket_path: PathBuf,
    conn: MultiplexedConnection,
}

impl StoreClient {
    pub async fn connect(socket_path: impl AsRef<Path>, db: i64) -> RedisResult<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();
        let conn = Client::open(connection_info(&socket_path, db))?
            .get_multiplexed_async_connection()
            .await?;
        log::debug!("Connected to store {} (db {})", socket_path.display(), db);
        Ok(Self { socket_path, conn })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// True only when the reply is `PONG`.
    pub async fn ping(&mut self) -> RedisResult<bool> {
        let reply: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        Ok(reply == "PONG")
    }

    pub async fn hset(&mut self, key: &str, field: &str, value: &str) -> RedisResult<i64> {
        let added: i64 = self.conn.hset(key, field, value).await?;
        Ok(added)
    }

    pub async fn hdel(&mut self, key: &str, field: &str) -> RedisResult<i64> {
        let removed: i64 = self.conn.hdel(key, field).await?;
        Ok(removed)
    }

    pub async fn hgetall(&mut self, key: &str) -> RedisResult<HashMap<String, String>> {
        let fields: HashMap<String, String> = self.conn.hgetall(key).await?;
        Ok(fields)
    }

    pub async fn exists(&mut self, key: &str) -> RedisResult<bool> {
        let found: bool = self.conn.exists(key).await?;
        Ok(found)
    }

    pub async fn set(&mut self, key: &str, value: &str) -> RedisResult<()> {
        let _: () = self.conn.set(key, value).await?;
        Ok(())
    }

    pub async fn del(&mut self, key: &str) -> RedisResult<i64> {
        let removed: i64 = self.conn.del(key).await?;
        Ok(removed)
    }
}

/// Synchronous connection, for code that blocks its own thread.
pub struct BlockingStoreClient {
    conn: redis::Connection,
}

impl BlockingStoreClient {
    pub fn connect(socket_path: impl AsRef<Path>, db: i64) -> RedisResult<Self> {
        let conn = Client::open(connection_info(socket_path.as_ref(), db))?.get_connection()?;
        Ok(Self { conn })
    }

    pub fn exists(&mut self, key: &str) -> RedisResult<bool> {
        redis::cmd("EXISTS").arg(key).query(&mut self.conn)
    }
}
