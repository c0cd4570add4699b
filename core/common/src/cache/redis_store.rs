// core/common/src/cache/redis_store.rs
// Redis-backed KeyValueStore (feature "redis-cache")

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::store::KeyValueStore;
use super::CacheError;

/// Store client over a multiplexed, auto-reconnecting Redis connection.
///
/// Timeouts are whatever the connection manager enforces; this layer adds none.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_seconds)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let keys = redis::cmd("KEYS")
            .arg(pattern)
            .query_async::<_, Vec<String>>(&mut conn)
            .await?;
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed = redis::cmd("DEL")
            .arg(keys)
            .query_async::<_, u64>(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn index_add(
        &self,
        index_key: &str,
        member: &str,
        ttl_seconds: u64,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(index_key)
            .arg(member)
            .ignore()
            .cmd("EXPIRE")
            .arg(index_key)
            .arg(ttl_seconds)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn index_members(&self, index_key: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let members = redis::cmd("SMEMBERS")
            .arg(index_key)
            .query_async::<_, Vec<String>>(&mut conn)
            .await?;
        Ok(members)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
