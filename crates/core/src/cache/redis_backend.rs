//! Redis cache backend.
//!
//! Uses a multiplexed `ConnectionManager`, which reconnects on its own
//! after the server drops the connection. Each backend operation is one
//! round trip (GET, MGET, SET with EX, INCR or an INCR+EXPIRE script, DEL),
//! so every write is atomic on the server.

use std::time::Duration;

use async_trait::async_trait;
use log::info;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};

use super::backend::{CacheBackend, CacheResult};
use crate::errors::CacheError;

/// Redis-backed cache backend.
#[derive(Clone)]
pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    /// Connect to the Redis server at `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = Client::open(url).map_err(map_redis_error)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        info!("Connected to Redis price cache");
        Ok(Self { manager })
    }
}

fn map_redis_error(e: RedisError) -> CacheError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        CacheError::Unavailable(e.to_string())
    } else {
        CacheError::Backend(e.to_string())
    }
}

/// Redis expiries are whole seconds; round sub-second TTLs up so they still expire.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)
}

/// INCR and the first-write EXPIRE run as one script, so a counter is never
/// left without its expiry.
const INCR_WITH_TTL: &str = r#"
local value = redis.call('INCR', KEYS[1])
if value == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return value
"#;

fn incr_with_ttl_script() -> Script {
    Script::new(INCR_WITH_TTL)
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.manager.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(map_redis_error)
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.manager.clone();
        redis::cmd("MGET")
            .arg(keys)
            .query_async::<_, Vec<Option<String>>>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl_secs(ttl).max(1));
        }
        cmd.query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn incr(&self, key: &str, ttl_on_create: Option<Duration>) -> CacheResult<i64> {
        let mut conn = self.manager.clone();
        match ttl_on_create {
            Some(ttl) => incr_with_ttl_script()
                .key(key)
                .arg(ttl_secs(ttl).max(1))
                .invoke_async::<_, i64>(&mut conn)
                .await
                .map_err(map_redis_error),
            None => conn
                .incr::<_, _, i64>(key, 1i64)
                .await
                .map_err(map_redis_error),
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await.map_err(map_redis_error)
    }
}
